use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{absolute, prefix, FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, CITYU};
use crate::parser::table::{self, Cell};

const LISTING_BASE: &str = "https://jobs1.cityu.edu.hk/apply/Default.aspx";
const LINK_BASE: &str = "https://www.cityu.edu.hk";
const MIN_TITLE: usize = 3;

static REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ref=([\w-]+)").unwrap());

const JOB_TYPES: &[(&str, &str)] = &[
    ("SENIOR", "Senior Management"),
    ("ACAD", "Academic Faculty"),
    ("RS", "Research"),
];

/// CityU's static vacancy tables: linked post, department, closing date.
pub struct CityU;

impl RawRecordSource for CityU {
    fn university(&self) -> &'static University {
        &CITYU
    }

    fn listings(&self) -> Vec<Listing> {
        JOB_TYPES
            .iter()
            .map(|&(code, label)| Listing::new(format!("{LISTING_BASE}?jobtype={code}"), label))
            .collect()
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let mut seen = HashSet::new();
        pages
            .iter()
            .flat_map(|page| {
                table::linked_rows(&page.markdown)
                    .into_iter()
                    .filter_map(|cells| parse_row(&cells, page.listing.label))
                    .collect::<Vec<_>>()
            })
            .filter(|record| {
                let key = record.reference.clone().or_else(|| record.title.clone());
                seen.insert(key.unwrap_or_default())
            })
            .collect()
    }
}

fn parse_row(cells: &[Cell], label: &str) -> Option<RawJobRecord> {
    if cells.len() < 2 {
        return None;
    }
    let link = cells[0].link.as_ref()?;
    let title = link.text.clone();
    if title.chars().count() < MIN_TITLE {
        return None;
    }

    let reference = REF_RE
        .captures(&link.url)
        .map(|caps| caps[1].to_string());
    let id_key = reference.is_none().then(|| prefix(&title, 25).to_string());

    Some(RawJobRecord {
        apply_url: Some(absolute(LINK_BASE, &link.url)),
        department: Some(cells[1].text.clone()).filter(|d| !d.is_empty()),
        deadline_text: cells.get(2).map(|c| c.text.clone()).filter(|d| !d.is_empty()),
        reference,
        position_type: Some(label.to_string()),
        id_key,
        title: Some(title),
        description: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn academic_page() -> FetchedPage {
        FetchedPage {
            listing: CityU.listings()[1].clone(),
            markdown: std::fs::read_to_string("tests/fixtures/cityu_acad.md").unwrap(),
        }
    }

    #[test]
    fn listing_per_job_type() {
        let listings = CityU.listings();
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[1].url, "https://jobs1.cityu.edu.hk/apply/Default.aspx?jobtype=ACAD");
        assert_eq!(listings[1].label, "Academic Faculty");
    }

    #[test]
    fn vacancy_rows() {
        let records = CityU.parse(&[academic_page()]);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title.as_deref(), Some("Assistant Professor"));
        assert_eq!(records[0].reference.as_deref(), Some("A-240101"));
        assert_eq!(records[0].department.as_deref(), Some("Department of Computer Science"));
        assert_eq!(records[0].deadline_text.as_deref(), Some("28 February 2025"));
        assert_eq!(
            records[0].apply_url.as_deref(),
            Some("https://www.cityu.edu.hk/apply/Vacancy.aspx?ref=A-240101")
        );
        assert_eq!(records[0].position_type.as_deref(), Some("Academic Faculty"));

        // the reference parameter is matched case-insensitively
        assert_eq!(records[1].reference.as_deref(), Some("A-240102"));
        assert_eq!(records[1].deadline_text.as_deref(), Some("Until the position is filled"));

        assert_eq!(records[2].title.as_deref(), Some("Lecturer"));
        assert_eq!(records[2].reference, None);
        assert_eq!(records[2].id_key.as_deref(), Some("Lecturer"));
    }

    #[test]
    fn reference_seen_on_another_page_skipped() {
        let mut research = academic_page();
        research.listing = CityU.listings()[2].clone();
        let records = CityU.parse(&[academic_page(), research]);
        assert_eq!(records.len(), 3);
    }
}
