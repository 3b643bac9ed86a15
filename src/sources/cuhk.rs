use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{absolute, FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, CUHK};
use crate::parser::table::{self, Cell};

const BASE: &str = "https://cuhk.taleo.net";
const MIN_TITLE: usize = 5;
const MIN_UNIT: usize = 6;

static REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,8}$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// CUHK's Taleo career sections. Rows read job number, linked requisition
/// title, department; no closing dates are shown.
pub struct Cuhk;

impl RawRecordSource for Cuhk {
    fn university(&self) -> &'static University {
        &CUHK
    }

    fn listings(&self) -> Vec<Listing> {
        vec![
            Listing::new(
                format!("{BASE}/careersection/cu_career_teach/jobsearch.ftl?lang=en"),
                "Teaching",
            ),
            Listing::new(
                format!("{BASE}/careersection/cu_career_non_teach/jobsearch.ftl?lang=en"),
                "Research/Non-teaching",
            ),
        ]
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for page in pages {
            for cells in table::linked_rows(&page.markdown) {
                let Some(row) = read_row(&cells) else {
                    continue;
                };
                let key = match &row.reference {
                    Some(r) => r.clone(),
                    None => format!("{}|{}", row.title, row.department.as_deref().unwrap_or_default()),
                };
                if seen.insert(key) {
                    records.push(row.into_record(&page.listing));
                }
            }
        }
        records
    }
}

struct Row {
    reference: Option<String>,
    title: String,
    url: Option<String>,
    department: Option<String>,
}

/// Job number is the first all-digit cell, title the first link, and the
/// department the first plain cell after the title.
fn read_row(cells: &[Cell]) -> Option<Row> {
    if cells.len() < 3 {
        return None;
    }
    let mut reference = None;
    let mut title: Option<(String, String)> = None;
    let mut department = None;

    for cell in cells {
        let text = &cell.text;
        if reference.is_none() && REF_RE.is_match(text) {
            reference = Some(text.clone());
        }
        if title.is_none() {
            if let Some(link) = &cell.link {
                title = Some((link.text.clone(), link.url.clone()));
            }
        }
        if title.is_some()
            && department.is_none()
            && cell.link.is_none()
            && text.chars().count() >= MIN_UNIT
            && !NUMBER_RE.is_match(text)
        {
            department = Some(text.clone());
        }
    }

    let (title, url) = title?;
    if title.chars().count() < MIN_TITLE {
        return None;
    }
    Some(Row { reference, title, url: Some(url).filter(|u| !u.is_empty()), department })
}

impl Row {
    fn into_record(self, listing: &Listing) -> RawJobRecord {
        let department = self.department.unwrap_or_else(|| CUHK.full_name.to_string());
        let id_key = self
            .reference
            .is_none()
            .then(|| format!("{}|{}", self.title, department));
        RawJobRecord {
            apply_url: Some(match &self.url {
                Some(url) => absolute(BASE, url),
                None => listing.url.clone(),
            }),
            title: Some(self.title),
            department: Some(department),
            deadline_text: None,
            reference: self.reference,
            position_type: Some(listing.label.to_string()),
            description: None,
            id_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::identity::make_id;
    use crate::normalize::canonicalize;

    fn teaching_page() -> FetchedPage {
        FetchedPage {
            listing: Cuhk.listings()[0].clone(),
            markdown: std::fs::read_to_string("tests/fixtures/cuhk_teach.md").unwrap(),
        }
    }

    #[test]
    fn requisition_rows() {
        let records = Cuhk.parse(&[teaching_page()]);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].reference.as_deref(), Some("2400123"));
        assert_eq!(records[0].title.as_deref(), Some("Assistant Professor (Mathematics)"));
        assert_eq!(records[0].department.as_deref(), Some("Department of Mathematics"));
        assert_eq!(
            records[0].apply_url.as_deref(),
            Some("https://cuhk.taleo.net/careersection/cu_career_teach/jobdetail.ftl?job=2400123&lang=en")
        );
        assert_eq!(records[0].deadline_text, None);
        assert_eq!(records[0].position_type.as_deref(), Some("Teaching"));

        assert_eq!(records[1].department.as_deref(), Some("English Language Teaching Unit"));

        // short and numeric cells are not departments
        assert_eq!(records[2].title.as_deref(), Some("Professor of Surgery"));
        assert_eq!(records[2].reference, None);
        assert_eq!(records[2].department.as_deref(), Some("Chinese University of Hong Kong"));
        assert_eq!(
            records[2].id_key.as_deref(),
            Some("Professor of Surgery|Chinese University of Hong Kong")
        );
    }

    #[test]
    fn unreferenced_rows_hash_title_and_unit() {
        let records = Cuhk.parse(&[teaching_page()]);
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let rec = canonicalize(&CUHK, &records[2], today).unwrap();
        assert_eq!(
            rec.id,
            make_id("CUHK", Some("Professor of Surgery|Chinese University of Hong Kong"))
        );
        assert_eq!(rec.deadline, "");
    }

    #[test]
    fn sections_share_job_numbers() {
        let mut other = teaching_page();
        other.listing = Cuhk.listings()[1].clone();
        assert_eq!(Cuhk.parse(&[teaching_page(), other]).len(), 3);
    }
}
