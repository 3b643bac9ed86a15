use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{absolute, prefix, FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, HKU};
use crate::normalize::parse_date_text;
use crate::parser::table::{self, Cell};

const BASE: &str = "https://jobs.hku.hk";
const MIN_TITLE: usize = 5;

static REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,8}$").unwrap());
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Faculty|Department|School|Institute|Centre|Office|Library").unwrap()
});

/// Support-staff titles left out of an academic listing.
const ADMIN_TITLES: &[&str] = &[
    "administrative assistant",
    "clerical assistant",
    "finance officer",
    "it officer",
    "facilities manager",
    "procurement officer",
    "human resources officer",
    "security officer",
    "safety officer",
    "receptionist",
    "estate manager",
    "accounting officer",
    "payroll officer",
];

/// HKU's PageUp listing: one table row per posting, the title linked, the
/// other cells in no fixed order.
pub struct Hku;

impl RawRecordSource for Hku {
    fn university(&self) -> &'static University {
        &HKU
    }

    fn listings(&self) -> Vec<Listing> {
        vec![Listing::new(format!("{BASE}/en/listing/"), "All roles")]
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for page in pages {
            for cells in table::linked_rows(&page.markdown) {
                let Some(record) = parse_row(&cells, page.listing.label) else {
                    continue;
                };
                let title = record.title.as_deref().unwrap_or_default();
                let key = record.reference.clone().unwrap_or_else(|| {
                    format!("{}|{}", title, record.department.as_deref().unwrap_or_default())
                });
                if !seen.insert(key) {
                    continue;
                }
                let lower = title.to_lowercase();
                if ADMIN_TITLES.iter().any(|t| lower.contains(t)) {
                    continue;
                }
                records.push(record);
            }
        }
        records
    }
}

fn parse_row(cells: &[Cell], label: &str) -> Option<RawJobRecord> {
    let link = cells.iter().find_map(|c| c.link.as_ref())?;
    let title = link.text.clone();
    if title.chars().count() < MIN_TITLE {
        return None;
    }

    let mut reference = None;
    let mut department = None;
    let mut deadline = None;
    for cell in cells {
        let text = &cell.text;
        if REF_RE.is_match(text) {
            reference = Some(text.clone());
        } else if UNIT_RE.is_match(text) && *text != title {
            department = Some(text.clone());
        } else {
            let parsed = parse_date_text(text);
            if !parsed.is_empty() && parsed != *text {
                deadline = Some(text.clone());
            }
        }
    }

    let id_key = reference.is_none().then(|| prefix(&title, 25).to_string());
    Some(RawJobRecord {
        apply_url: Some(absolute(BASE, &link.url)),
        department: Some(department.unwrap_or_else(|| HKU.full_name.to_string())),
        deadline_text: deadline,
        reference,
        position_type: Some(label.to_string()),
        id_key,
        title: Some(title),
        description: None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::normalize::canonicalize;

    fn listing_page() -> FetchedPage {
        FetchedPage {
            listing: Hku.listings()[0].clone(),
            markdown: std::fs::read_to_string("tests/fixtures/hku_listing.md").unwrap(),
        }
    }

    #[test]
    fn rows_to_records() {
        let records = Hku.parse(&[listing_page()]);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title.as_deref(), Some("Assistant Professor in Chemistry"));
        assert_eq!(records[0].reference.as_deref(), Some("528301"));
        assert_eq!(records[0].department.as_deref(), Some("Department of Chemistry"));
        assert_eq!(records[0].deadline_text.as_deref(), Some("31 March 2025"));
        assert_eq!(
            records[0].apply_url.as_deref(),
            Some("https://jobs.hku.hk/en/job/528301/assistant-professor-in-chemistry")
        );

        assert_eq!(records[1].department.as_deref(), Some("School of Public Health"));
        assert_eq!(records[1].deadline_text.as_deref(), Some("15 Apr 2025"));

        // no reference, no unit, no date
        assert_eq!(records[2].title.as_deref(), Some("Research Assistant"));
        assert_eq!(records[2].department.as_deref(), Some("University of Hong Kong"));
        assert_eq!(records[2].deadline_text, None);
        assert_eq!(records[2].id_key.as_deref(), Some("Research Assistant"));
    }

    #[test]
    fn admin_posts_and_repeats_skipped() {
        let records = Hku.parse(&[listing_page(), listing_page()]);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.title.as_deref() != Some("Administrative Assistant")));
    }

    #[test]
    fn canonical_description() {
        let records = Hku.parse(&[listing_page()]);
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let rec = canonicalize(&HKU, &records[0], today).unwrap();
        assert_eq!(rec.id, "HKU-528301");
        assert_eq!(rec.deadline, "2025-03-31");
        assert_eq!(
            rec.description,
            "Assistant Professor in Chemistry — Department of Chemistry. Please visit the application link for full details."
        );
    }
}
