use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{absolute, prefix, split_last_comma, FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, HKBU, LINGNAN};
use crate::parser::links;

static LINGNAN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)requisition").unwrap());
static LINGNAN_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"requisition/(\d+)").unwrap());
static HKBU_JOB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/job/(\d+)").unwrap());

const MIN_LINK_TEXT: usize = 5;

/// A careers site that lists each opening as one link whose text reads
/// `"Title, Department"`.
pub struct LinkListSource {
    university: &'static University,
    listings: Vec<Listing>,
    /// Links whose URL matches are postings.
    link: &'static Regex,
    /// First capture group is the reference.
    reference: &'static Regex,
    /// Relative URLs resolve against this.
    base: &'static str,
    /// Used when the link text has no department part.
    default_department: Option<&'static str>,
}

/// Lingnan's Cornerstone careersite.
pub fn lingnan() -> LinkListSource {
    LinkListSource {
        university: &LINGNAN,
        listings: vec![Listing::new(
            "https://lingnan.csod.com/ux/ats/careersite/4/home?c=lingnan",
            "All roles",
        )],
        link: &LINGNAN_LINK_RE,
        reference: &LINGNAN_REF_RE,
        base: "https://lingnan.csod.com",
        default_department: Some("Lingnan University"),
    }
}

/// HKBU's Oracle candidate experience site.
pub fn hkbu() -> LinkListSource {
    LinkListSource {
        university: &HKBU,
        listings: vec![Listing::new(
            "https://fa-ewqq-saasfaprod1.fa.ocs.oraclecloud.com/hcmUI/CandidateExperience/en/sites/hkbu/jobs",
            "All roles",
        )],
        link: &HKBU_JOB_RE,
        reference: &HKBU_JOB_RE,
        base: "https://fa-ewqq-saasfaprod1.fa.ocs.oraclecloud.com",
        default_department: None,
    }
}

impl RawRecordSource for LinkListSource {
    fn university(&self) -> &'static University {
        self.university
    }

    fn listings(&self) -> Vec<Listing> {
        self.listings.clone()
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for page in pages {
            for link in links::scan(&page.markdown) {
                if !self.link.is_match(&link.url)
                    || link.text.chars().count() < MIN_LINK_TEXT
                    || !seen.insert(link.text.clone())
                {
                    continue;
                }

                let reference = self
                    .reference
                    .captures(&link.url)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                let (title, department) = split_last_comma(&link.text);
                let department = department.or(self.default_department.map(str::to_string));
                let id_key = reference.is_none().then(|| prefix(&title, 25).to_string());

                records.push(RawJobRecord {
                    apply_url: Some(absolute(self.base, &link.url)),
                    title: Some(title),
                    department,
                    reference,
                    id_key,
                    ..Default::default()
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(source: &LinkListSource, name: &str) -> FetchedPage {
        FetchedPage {
            listing: source.listings()[0].clone(),
            markdown: std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap(),
        }
    }

    #[test]
    fn lingnan_links() {
        let source = lingnan();
        let records = source.parse(&[fixture(&source, "lingnan_careersite.md")]);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title.as_deref(), Some("Senior HR Officer"));
        assert_eq!(records[0].department.as_deref(), Some("Human Resources Office"));
        assert_eq!(records[0].reference.as_deref(), Some("1187"));
        assert_eq!(
            records[0].apply_url.as_deref(),
            Some("https://lingnan.csod.com/ux/ats/careersite/4/home/requisition/1187?c=lingnan")
        );

        // no comma: the institution stands in for the department
        assert_eq!(records[1].title.as_deref(), Some("Assistant Professor in Philosophy"));
        assert_eq!(records[1].department.as_deref(), Some("Lingnan University"));

        assert_eq!(records[2].title.as_deref(), Some("Lecturer, Part-time"));
        assert_eq!(records[2].department.as_deref(), Some("Department of History"));
    }

    #[test]
    fn hkbu_links() {
        let source = hkbu();
        let records = source.parse(&[fixture(&source, "hkbu_jobs.md")]);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title.as_deref(), Some("Research Assistant Professor"));
        assert_eq!(records[0].department.as_deref(), Some("School of Business"));
        assert_eq!(records[0].reference.as_deref(), Some("4521"));
        assert_eq!(records[0].id_key, None);

        assert_eq!(records[1].department, None);
        assert_eq!(records[1].reference.as_deref(), Some("4530"));
    }

    #[test]
    fn unreferenced_link_keyed_by_title() {
        let source = lingnan();
        let page = FetchedPage {
            listing: source.listings()[0].clone(),
            markdown: "[Visiting Research Fellow in Cultural Studies](/requisition/view?c=lingnan)".into(),
        };
        let records = source.parse(&[page]);
        assert_eq!(records[0].reference, None);
        assert_eq!(records[0].id_key.as_deref(), Some("Visiting Research Fellow "));
    }
}
