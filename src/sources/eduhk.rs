use std::sync::LazyLock;

use regex::Regex;

use super::{prefix, FetchedPage, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, EDUHK};
use crate::parser::anchor::{AnchorWindow, Card, FieldScope};
use crate::parser::markup;

const BASE: &str = "https://www.eduhk.hk";

const CATEGORIES: &[(&str, &str)] = &[
    ("senior-management", "Senior Management"),
    ("deanship-headship-appointments", "Deanship/Headship"),
    ("academic-teaching-posts", "Academic"),
    ("research-support-posts", "Research"),
];

static CARDS: LazyLock<AnchorWindow> = LazyLock::new(|| {
    AnchorWindow::new("Ad Date:")
        .window(600, 200)
        .field(
            "reference",
            Regex::new(r"Ref:\s*(\d{6,})").unwrap(),
            FieldScope::Around { before: 150, after: 50 },
        )
        .field(
            "close_date",
            Regex::new(r"Close Date[:\s]+([A-Za-z0-9 ,/-]+)").unwrap(),
            FieldScope::Following,
        )
        .noise(Regex::new(r"^Ref:").unwrap())
        .reference("reference")
});

/// EdUHK renders its openings as cards with no table structure; every
/// "Ad Date:" marks one posting.
pub struct EdUhk;

impl RawRecordSource for EdUhk {
    fn university(&self) -> &'static University {
        &EDUHK
    }

    fn listings(&self) -> Vec<Listing> {
        CATEGORIES
            .iter()
            .map(|&(category, label)| {
                Listing::new(
                    format!("{BASE}/en/current-openings?category={category}&department=&q="),
                    label,
                )
            })
            .collect()
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        let texts: Vec<String> = pages.iter().map(|p| markup::flatten(&p.markdown)).collect();
        CARDS
            .extract_pages(&texts)
            .into_iter()
            .map(|card| {
                let listing = &pages[card.page].listing;
                to_record(card, listing)
            })
            .collect()
    }
}

fn to_record(card: Card, listing: &Listing) -> RawJobRecord {
    let reference = card.field("reference").map(str::to_string);
    let deadline = card
        .field("close_date")
        .filter(|d| !matches!(d.to_uppercase().as_str(), "N/A" | "NA"))
        .map(str::to_string);
    let dept = card.department.clone().unwrap_or_default();

    let description = if dept.is_empty() {
        format!("{}. See EdUHK website for full details.", card.title)
    } else {
        format!("{} — {}. See EdUHK website for full details.", card.title, dept)
    };
    let id_key = reference
        .is_none()
        .then(|| format!("{}_{}", prefix(&card.title, 40), prefix(&dept, 20)));

    RawJobRecord {
        title: Some(card.title),
        department: card.department,
        deadline_text: deadline,
        reference,
        position_type: Some(listing.label.to_string()),
        description: Some(description),
        apply_url: Some(listing.url.clone()),
        id_key,
    }
}
