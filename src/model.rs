use std::fmt;

use serde::{Serialize, Serializer};

/// One posting as a source scraped it. Every member is optional; sources fill
/// in what their page exposes and leave the rest to the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJobRecord {
    pub title: Option<String>,
    pub department: Option<String>,
    pub deadline_text: Option<String>,
    pub reference: Option<String>,
    pub position_type: Option<String>,
    pub description: Option<String>,
    pub apply_url: Option<String>,
    /// Identity key used only when `reference` is absent. Never written out.
    pub id_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    Professor,
    AssociateProfessor,
    AssistantProfessor,
    Postdoc,
    Lecturer,
    Other,
}

impl Rank {
    pub fn label(self) -> &'static str {
        match self {
            Rank::Professor => "Professor",
            Rank::AssociateProfessor => "Associate Professor",
            Rank::AssistantProfessor => "Assistant Professor",
            Rank::Postdoc => "Postdoc",
            Rank::Lecturer => "Lecturer",
            Rank::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionType {
    FullTime,
    PartTime,
    FixedTerm,
}

impl PositionType {
    pub fn label(self) -> &'static str {
        match self {
            PositionType::FullTime => "Full-time",
            PositionType::PartTime => "Part-time",
            PositionType::FixedTerm => "Fixed-term",
        }
    }

    /// Case-insensitive match against the three output labels.
    pub fn from_label(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        [Self::FullTime, Self::PartTime, Self::FixedTerm]
            .into_iter()
            .find(|t| t.label().to_lowercase() == lower)
    }
}

macro_rules! serialize_as_label {
    ($($ty:ty),*) => {$(
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.label())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    )*};
}

serialize_as_label!(Rank, PositionType);

#[derive(Debug, PartialEq, Eq)]
pub struct University {
    /// Lower-case name used on the command line and in settings.
    pub key: &'static str,
    /// Upper-case id prefix.
    pub code: &'static str,
    pub short_name: &'static str,
    pub full_name: &'static str,
}

pub static POLYU: University = University {
    key: "polyu",
    code: "POLYU",
    short_name: "PolyU",
    full_name: "Hong Kong Polytechnic University",
};
pub static EDUHK: University = University {
    key: "eduhk",
    code: "EDUHK",
    short_name: "EdUHK",
    full_name: "Education University of Hong Kong",
};
pub static LINGNAN: University = University {
    key: "lingnan",
    code: "LU",
    short_name: "LU",
    full_name: "Lingnan University",
};
pub static HKU: University = University {
    key: "hku",
    code: "HKU",
    short_name: "HKU",
    full_name: "University of Hong Kong",
};
pub static HKUST: University = University {
    key: "hkust",
    code: "HKUST",
    short_name: "HKUST",
    full_name: "HK University of Science & Technology",
};
pub static CITYU: University = University {
    key: "cityu",
    code: "CITYU",
    short_name: "CityU",
    full_name: "City University of Hong Kong",
};
pub static HKBU: University = University {
    key: "hkbu",
    code: "HKBU",
    short_name: "HKBU",
    full_name: "Hong Kong Baptist University",
};
pub static CUHK: University = University {
    key: "cuhk",
    code: "CUHK",
    short_name: "CUHK",
    full_name: "Chinese University of Hong Kong",
};

/// All institutions in the original scrape order.
pub static UNIVERSITIES: [&University; 8] =
    [&POLYU, &EDUHK, &LINGNAN, &HKU, &HKUST, &CITYU, &HKBU, &CUHK];

/// Look up by key or id prefix, ignoring case.
pub fn university(name: &str) -> Option<&'static University> {
    let name = name.trim();
    UNIVERSITIES
        .iter()
        .copied()
        .find(|u| u.key.eq_ignore_ascii_case(name) || u.code.eq_ignore_ascii_case(name))
}

/// A row of the published dataset. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalJobRecord {
    pub id: String,
    pub title: String,
    pub rank: Rank,
    pub university: &'static str,
    pub university_full: &'static str,
    pub department: String,
    pub deadline: String,
    #[serde(serialize_with = "upper_bool")]
    pub is_new: bool,
    pub date_added: String,
    pub reference: String,
    pub position_type: PositionType,
    pub salary: String,
    pub start_date: String,
    pub apply_url: String,
    pub description: String,
}

fn upper_bool<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *v { "TRUE" } else { "FALSE" })
}

pub const COLUMNS: [&str; 15] = [
    "id",
    "title",
    "rank",
    "university",
    "university_full",
    "department",
    "deadline",
    "is_new",
    "date_added",
    "reference",
    "position_type",
    "salary",
    "start_date",
    "apply_url",
    "description",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(university("polyu").map(|u| u.short_name), Some("PolyU"));
        assert_eq!(university(" HkUst ").map(|u| u.code), Some("HKUST"));
        assert_eq!(university("lingnan").map(|u| u.code), Some("LU"));
        assert_eq!(university("LU").map(|u| u.key), Some("lingnan"));
        assert!(university("mit").is_none());
    }

    #[test]
    fn eight_institutions() {
        assert_eq!(UNIVERSITIES.len(), 8);
    }

    #[test]
    fn position_type_labels() {
        assert_eq!(PositionType::from_label("full-TIME"), Some(PositionType::FullTime));
        assert_eq!(PositionType::from_label("Fixed-term"), Some(PositionType::FixedTerm));
        assert_eq!(PositionType::from_label("Academic"), None);
        assert_eq!(Rank::AssociateProfessor.to_string(), "Associate Professor");
    }
}
