use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::linklist::{self, LinkListSource};
use super::{prefix, split_last_comma, FetchedPage, JsonFeed, Listing, RawRecordSource};
use crate::model::{RawJobRecord, University, HKBU};
use crate::normalize::clean;

const BASE: &str = "https://fa-ewqq-saasfaprod1.fa.ocs.oraclecloud.com";
const FINDER: &str = "CandidateExperience;siteNumber=CX_1,\
    facetsList=LOCATIONS%3BWORK_LOCATIONS%3BTITLES%3BCATEGORIES%3BORGANIZATIONS%3BPOSTING_DATES%3BFLEX_FIELDS";
const MAX_DESCRIPTION: usize = 500;

static SITS_UNDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sits under (?:the\s+)?([A-Z][^,.]{3,60}?)(?:\s+at our|\s+campus|,|\.|$)").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// HKBU's Oracle recruiting API, with the rendered job list as the fallback.
pub struct Hkbu {
    pages: LinkListSource,
}

impl Default for Hkbu {
    fn default() -> Self {
        Hkbu { pages: linklist::hkbu() }
    }
}

impl RawRecordSource for Hkbu {
    fn university(&self) -> &'static University {
        &HKBU
    }

    fn listings(&self) -> Vec<Listing> {
        self.pages.listings()
    }

    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord> {
        self.pages.parse(pages)
    }

    fn feed(&self) -> Option<JsonFeed> {
        Some(JsonFeed {
            url: format!(
                "{BASE}/hcmRestApi/resources/latest/recruitingCEJobRequisitions\
                 ?onlyData=true&finder={FINDER}&sortBy=POSTING_DATES_DESC"
            ),
            headers: vec![
                ("Referer", format!("{BASE}/hcmUI/CandidateExperience/en/sites/hkbu/jobs")),
                ("Origin", BASE.to_string()),
            ],
            page_size: 25,
            max_offset: 1000,
        })
    }

    fn parse_feed(&self, items: &[Value]) -> Vec<RawJobRecord> {
        let mut seen = HashSet::new();
        requisitions(items)
            .filter_map(|item| {
                let full_title = first_text(item, &["Title", "title", "JobTitle", "displayTitle"])?;
                if !seen.insert(full_title.clone()) {
                    return None;
                }
                Some(to_record(item, &full_title))
            })
            .collect()
    }
}

/// Search answers either list requisitions directly or wrap them in a
/// `requisitionList` per item.
fn requisitions(items: &[Value]) -> impl Iterator<Item = &Value> {
    items.iter().flat_map(|item| match item.get("requisitionList").and_then(Value::as_array) {
        Some(list) => list.iter().collect::<Vec<_>>(),
        None => vec![item],
    })
}

fn to_record(item: &Value, full_title: &str) -> RawJobRecord {
    let reference = first_text(
        item,
        &["Id", "id", "RequisitionNumber", "requisitionNumber", "ExternalReqNumber"],
    );
    let deadline = first_text(item, &["PostedEndDate", "postedEndDate", "ClosingDate", "closingDate"]);
    let description = first_text(item, &["ExternalDescriptionStr", "ShortDescription", "description"])
        .map(|d| clean(&TAG_RE.replace_all(&d, " ")))
        .unwrap_or_default();

    let (title, department) = split_last_comma(full_title);
    let department = department
        .or_else(|| {
            SITS_UNDER_RE
                .captures(&description)
                .map(|caps| caps[1].trim().to_string())
        })
        .unwrap_or_else(|| HKBU.full_name.to_string());

    let apply_url = match &reference {
        Some(r) => format!("{BASE}/hcmUI/CandidateExperience/en/sites/hkbu/job/{r}"),
        None => format!("{BASE}/hcmUI/CandidateExperience/en/sites/hkbu/jobs"),
    };
    let id_key = reference.is_none().then(|| prefix(&title, 25).to_string());

    RawJobRecord {
        description: (!description.is_empty())
            .then(|| prefix(&description, MAX_DESCRIPTION).to_string()),
        title: Some(title),
        department: Some(department),
        deadline_text: deadline,
        reference,
        apply_url: Some(apply_url),
        id_key,
        position_type: None,
    }
}

/// First non-empty value among `keys`, as cleaned text.
fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| item.get(*k)).find_map(|v| match v {
        Value::String(s) => Some(clean(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
