use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::identity::make_id;
use crate::model::{CanonicalJobRecord, PositionType, RawJobRecord, Rank, University};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ISO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Checked top to bottom; more specific phrases must stay above the generic ones.
const RANK_RULES: &[(&str, Rank)] = &[
    ("chair professor", Rank::Professor),
    ("associate professor", Rank::AssociateProfessor),
    ("assistant professor", Rank::AssistantProfessor),
    ("professor", Rank::Professor),
    ("postdoc", Rank::Postdoc),
    ("research fellow", Rank::Postdoc),
    ("lecturer", Rank::Lecturer),
    ("teaching fellow", Rank::Lecturer),
    ("instructor", Rank::Lecturer),
    ("clinical", Rank::Lecturer),
];

const TYPE_RULES: &[(&str, PositionType)] = &[
    ("temporary", PositionType::FixedTerm),
    ("fixed-term", PositionType::FixedTerm),
    ("part-time", PositionType::PartTime),
];

const DATE_FORMATS: &[&str] = &[
    "%d %B %Y",
    "%d %b %Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Collapse whitespace runs to a single space and trim.
pub fn clean(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

pub fn detect_rank(title: &str) -> Rank {
    let t = title.to_lowercase();
    RANK_RULES
        .iter()
        .find(|(needle, _)| t.contains(needle))
        .map(|(_, rank)| *rank)
        .unwrap_or(Rank::Other)
}

pub fn detect_type(title: &str) -> PositionType {
    let t = title.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(needle, _)| t.contains(needle))
        .map(|(_, ty)| *ty)
        .unwrap_or(PositionType::FullTime)
}

/// Convert a free-text date to `YYYY-MM-DD`.
///
/// Text matching none of the known formats comes back cleaned but otherwise
/// unchanged; callers treat such a value as an unparsed deadline.
pub fn parse_date_text(text: &str) -> String {
    let text = clean(text);
    if text.is_empty() {
        return text;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or(text)
}

/// `Some(date)` only for a well-formed `YYYY-MM-DD` value.
pub fn iso_date(s: &str) -> Option<NaiveDate> {
    if !ISO_RE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Open-ended and unparsed deadlines count as active.
pub fn is_active(deadline: &str, today: NaiveDate) -> bool {
    iso_date(deadline).map_or(true, |d| d >= today)
}

/// Build the canonical record for one raw record. Returns `None` when the
/// record has no usable title.
pub fn canonicalize(
    uni: &'static University,
    raw: &RawJobRecord,
    today: NaiveDate,
) -> Option<CanonicalJobRecord> {
    let title = raw.title.as_deref().map(clean).unwrap_or_default();
    if title.is_empty() {
        debug!(university = uni.code, ?raw, "dropping record without title");
        return None;
    }

    let department = raw.department.as_deref().map(clean).unwrap_or_default();
    let reference = raw.reference.as_deref().map(clean).unwrap_or_default();
    let deadline = raw
        .deadline_text
        .as_deref()
        .map(parse_date_text)
        .unwrap_or_default();
    let position_type = raw
        .position_type
        .as_deref()
        .and_then(PositionType::from_label)
        .unwrap_or_else(|| detect_type(&title));

    let key = if reference.is_empty() {
        raw.id_key.as_deref()
    } else {
        Some(reference.as_str())
    };
    let id = make_id(uni.code, key);

    let description = match raw.description.as_deref().map(clean) {
        Some(d) if !d.is_empty() => d,
        _ if department.is_empty() => {
            format!("{title}. Please visit the application link for full details.")
        }
        _ => format!("{title} — {department}. Please visit the application link for full details."),
    };

    Some(CanonicalJobRecord {
        id,
        rank: detect_rank(&title),
        university: uni.short_name,
        university_full: uni.full_name,
        department,
        deadline,
        is_new: true,
        date_added: today.format("%Y-%m-%d").to_string(),
        reference,
        position_type,
        salary: String::new(),
        start_date: String::new(),
        apply_url: raw.apply_url.as_deref().map(clean).unwrap_or_default(),
        description,
        title,
    })
}
