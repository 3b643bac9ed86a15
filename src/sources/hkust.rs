use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, HKUST};
use crate::parser::anchor::{AnchorWindow, Card, FieldScope};
use crate::parser::markup;

/// Lines after the Job ID that end the unit search.
static DATES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Open Date|Apply by|\d{4}-\d{2})").unwrap());

const MIN_UNIT_LEN: usize = 5;

static CARDS: LazyLock<AnchorWindow> = LazyLock::new(|| {
    AnchorWindow::new("Job ID:")
        .window(300, 300)
        .without_units()
        .noise(Regex::new(r"^(Open Date|Apply by)").unwrap())
        .noise(Regex::new(r"^\d{4}-\d{2}").unwrap())
        .min_line_len(5)
        .min_title_len(5)
        .field("reference", Regex::new(r"^\s*(\d+)").unwrap(), FieldScope::Following)
        .field(
            "deadline",
            Regex::new(r"Apply by:\s*([\d-]+)").unwrap(),
            FieldScope::Following,
        )
        .reference("reference")
});

/// HKUST career site. Each card reads title, `Job ID: n`, unit, then dates.
pub struct Hkust;

impl RawRecordSource for Hkust {
    fn university(&self) -> &'static University {
        &HKUST
    }

    fn listings(&self) -> Vec<Listing> {
        vec![
            Listing::new(
                "https://hkustcareers.hkust.edu.hk/join-us/current-opening/academic-careers",
                "Academic",
            ),
            Listing::new(
                "https://hkustcareers.hkust.edu.hk/join-us/current-opening/teaching-support",
                "Teaching",
            ),
        ]
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let texts: Vec<String> = pages.iter().map(|p| markup::flatten(&p.markdown)).collect();
        let mut seen_ids = HashSet::new();

        CARDS
            .extract_pages(&texts)
            .into_iter()
            .filter_map(|card| {
                let reference = card.field("reference")?.to_string();
                // the same Job ID shows up under several filters
                if !seen_ids.insert(reference.clone()) {
                    return None;
                }
                let department = unit_after(&card);

                Some(RawJobRecord {
                    apply_url: Some(apply_url(&reference)),
                    title: Some(card.title),
                    department,
                    deadline_text: card.fields.get("deadline").cloned(),
                    position_type: Some(pages[card.page].listing.label.to_string()),
                    reference: Some(reference),
                    ..Default::default()
                })
            })
            .collect()
    }
}

/// First substantial line after the Job ID line, unless a date line comes
/// first.
fn unit_after(card: &Card) -> Option<String> {
    card.after
        .lines()
        .skip(1)
        .map(str::trim)
        .take_while(|line| !DATES_RE.is_match(line))
        .find(|line| line.chars().count() >= MIN_UNIT_LEN)
        .map(crate::normalize::clean)
}

fn apply_url(job_id: &str) -> String {
    format!(
        "https://hrmsxprod.psft.ust.hk:8044/psp/hrmsxprod/EMPLOYEE/HRMS/c/HRS_HRAM.HRS_CE.GBL\
         ?Page=HRS_CE_JOB_DTL&Action=A&JobOpeningId={job_id}&SiteId=1000&PostingSeq=1"
    )
}
