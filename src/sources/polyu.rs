use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, POLYU};
use crate::normalize::parse_date_text;
use crate::parser::table;

const BASE: &str = "https://jobs.polyu.edu.hk";

static REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{7,10}$").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// PolyU publishes one table per staff category.
///
/// Columns: department, position, [project title,] closing date, ref no.
/// The project title column exists on the research page only.
pub struct PolyU;

impl RawRecordSource for PolyU {
    fn university(&self) -> &'static University {
        &POLYU
    }

    fn listings(&self) -> Vec<Listing> {
        ["central_senior", "deans_heads", "academic", "rap", "research"]
            .iter()
            .map(|page| Listing::new(format!("{BASE}/{page}.php"), "Full-time"))
            .collect()
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let mut seen_refs = HashSet::new();
        let mut records = Vec::new();

        for page in pages {
            for cells in table::rows(&page.markdown) {
                let Some(record) = parse_row(&cells, page.listing.label) else {
                    continue;
                };
                let reference = record.reference.clone().unwrap_or_default();
                if seen_refs.insert(reference) {
                    records.push(record);
                }
            }
        }
        records
    }
}

fn parse_row(cells: &[String], position_type: &str) -> Option<RawJobRecord> {
    if cells.len() < 3 {
        return None;
    }
    let reference = cells
        .iter()
        .map(|c| c.replace(' ', ""))
        .find(|c| REF_RE.is_match(c))?;

    let dept = cells[0].clone();
    let title = cells[1].clone();
    if title.is_empty() {
        return None;
    }

    let project = (cells.len() >= 5)
        .then(|| cells[2].as_str())
        .filter(|c| !c.is_empty() && c.replace(' ', "") != reference && !YEAR_RE.is_match(c));

    let deadline = cells
        .iter()
        .find(|c| {
            let parsed = parse_date_text(c);
            !parsed.is_empty() && parsed != **c
        })
        .cloned();

    let mut description = title.clone();
    if let Some(project) = project {
        description.push_str(&format!(" — Project: {project}"));
    }
    description.push_str(&format!(" ({dept}). See application link for full details."));

    Some(RawJobRecord {
        apply_url: Some(format!("{BASE}/job_detail.php?job={reference}")),
        title: Some(title),
        department: Some(dept),
        deadline_text: deadline,
        reference: Some(reference),
        position_type: Some(position_type.to_string()),
        description: Some(description),
        id_key: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str) -> FetchedPage {
        let markdown = std::fs::read_to_string(format!("tests/fixtures/{}.md", name)).unwrap();
        FetchedPage {
            listing: Listing::new(format!("{BASE}/{name}.php"), "Full-time"),
            markdown,
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn academic_table() {
        let records = PolyU.parse(&[page("polyu_academic")]);
        assert_eq!(records.len(), 3);
        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Assistant Professor"));
        assert_eq!(first.department.as_deref(), Some("Department of Computing"));
        assert_eq!(first.reference.as_deref(), Some("250101001"));
        assert_eq!(first.deadline_text.as_deref(), Some("31 March 2025"));
        assert_eq!(
            first.apply_url.as_deref(),
            Some("https://jobs.polyu.edu.hk/job_detail.php?job=250101001")
        );
        // row without a closing date keeps an open deadline
        assert_eq!(records[2].deadline_text, None);
    }

    #[test]
    fn research_table_has_project() {
        let records = PolyU.parse(&[page("polyu_research")]);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].description.as_deref(),
            Some("Research Assistant — Project: Smart Materials for Buildings (Department of Building Environment and Energy Engineering). See application link for full details.")
        );
        // a year in the third column is not a project title
        assert!(!records[1].description.as_deref().unwrap().contains("Project"));
    }

    #[test]
    fn refs_deduplicated_across_pages() {
        let records = PolyU.parse(&[page("polyu_academic"), page("polyu_academic")]);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn rows_without_reference_skipped() {
        assert!(parse_row(&row(&["Department", "Position", "Closing Date", "Ref No."]), "Full-time").is_none());
        assert!(parse_row(&row(&["a", "b"]), "Full-time").is_none());
        let spaced = parse_row(&row(&["Dept", "Lecturer", "1 May 2025", "2501 0100"]), "Full-time").unwrap();
        assert_eq!(spaced.reference.as_deref(), Some("25010100"));
    }
}
