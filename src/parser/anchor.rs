use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::normalize::clean;

static NAV_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(next|previous|prev|go to page.*|search|filter|home|menu|reset|clear|apply|go|n/?a)$")
        .unwrap()
});
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static COUNTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)$").unwrap());
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Department|Faculty|School|Academy|Division|Office|Centre|Center)\b").unwrap()
});

/// Where a secondary field pattern is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// The window after the anchor.
    Following,
    /// The last `before` characters of the preceding window followed by the
    /// first `after` characters of the following one.
    Around { before: usize, after: usize },
}

#[derive(Debug, Clone)]
pub struct FieldPattern {
    pub name: &'static str,
    pub pattern: Regex,
    pub scope: FieldScope,
}

/// Record-per-anchor text miner for pages that only render as flat text.
///
/// Every occurrence of `anchor` is one record. Title and department are read
/// from the lines just before it; secondary fields come from small patterns
/// run against the text around it.
#[derive(Debug, Clone)]
pub struct AnchorWindow {
    anchor: String,
    before: usize,
    after: usize,
    noise: Vec<Regex>,
    /// Lines before the anchor that name a department. `None` means the
    /// nearest line is always the title.
    unit: Option<Regex>,
    fields: Vec<FieldPattern>,
    reference_field: Option<&'static str>,
    min_line_len: usize,
    min_title_len: usize,
}

/// One record mined around an anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Index of the page within the extraction pass.
    pub page: usize,
    pub title: String,
    pub department: Option<String>,
    pub fields: BTreeMap<&'static str, String>,
    /// Raw text after the anchor, up to the window or the next anchor.
    pub after: String,
}

impl Card {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum CardKey {
    Reference(String, String),
    Department(String, String),
}

impl AnchorWindow {
    /// 600 characters before, 200 after, the stock noise and unit patterns.
    pub fn new(anchor: &str) -> Self {
        AnchorWindow {
            anchor: anchor.to_string(),
            before: 600,
            after: 200,
            noise: vec![NAV_NOISE_RE.clone(), NUMBER_RE.clone(), COUNTER_RE.clone()],
            unit: Some(UNIT_RE.clone()),
            fields: Vec::new(),
            reference_field: None,
            min_line_len: 3,
            min_title_len: 3,
        }
    }

    pub fn window(mut self, before: usize, after: usize) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn noise(mut self, pattern: Regex) -> Self {
        self.noise.push(pattern);
        self
    }

    /// Never read departments before the anchor, for layouts that put the
    /// unit after it.
    pub fn without_units(mut self) -> Self {
        self.unit = None;
        self
    }

    pub fn field(mut self, name: &'static str, pattern: Regex, scope: FieldScope) -> Self {
        self.fields.push(FieldPattern { name, pattern, scope });
        self
    }

    /// Field used as the reference half of the dedup key.
    pub fn reference(mut self, name: &'static str) -> Self {
        self.reference_field = Some(name);
        self
    }

    pub fn min_line_len(mut self, n: usize) -> Self {
        self.min_line_len = n;
        self
    }

    pub fn min_title_len(mut self, n: usize) -> Self {
        self.min_title_len = n;
        self
    }

    /// One extraction pass over a single page.
    pub fn extract(&self, text: &str) -> Vec<Card> {
        self.extract_pages(&[text])
    }

    /// One extraction pass over several pages. Cards are returned in page and
    /// document order; re-rendered duplicates are dropped.
    pub fn extract_pages<S: AsRef<str> + Sync>(&self, pages: &[S]) -> Vec<Card> {
        let scanned: Vec<Vec<Card>> = pages
            .par_iter()
            .enumerate()
            .map(|(page, text)| {
                let mut cards = self.scan(text.as_ref());
                cards.iter_mut().for_each(|c| c.page = page);
                cards
            })
            .collect();

        let mut seen = HashSet::new();
        scanned
            .into_iter()
            .flatten()
            .filter(|card| seen.insert(self.key(card)))
            .collect()
    }

    /// Every anchor occurrence of one page, without deduplication.
    pub fn scan(&self, text: &str) -> Vec<Card> {
        if self.anchor.is_empty() {
            return Vec::new();
        }
        let starts: Vec<usize> = text.match_indices(&self.anchor).map(|(i, _)| i).collect();
        let mut cards = Vec::with_capacity(starts.len());

        for (k, &start) in starts.iter().enumerate() {
            let end = start + self.anchor.len();
            let prev_end = if k == 0 { 0 } else { starts[k - 1] + self.anchor.len() };
            let next_start = starts.get(k + 1).copied().unwrap_or(text.len());

            let before = &text[chars_back(text, start, self.before).max(prev_end)..start];
            let after = &text[end..chars_forward(text, end, self.after).min(next_start)];

            match self.read_card(before, after) {
                Some(card) => cards.push(card),
                None => debug!(anchor = %self.anchor, offset = start, "no usable title before anchor"),
            }
        }
        cards
    }

    fn read_card(&self, before: &str, after: &str) -> Option<Card> {
        let lines: Vec<&str> = before
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.chars().count() >= self.min_line_len)
            .filter(|l| !self.noise.iter().any(|re| re.is_match(l)))
            .collect();

        let mut title = None;
        let mut department = None;
        for line in lines.iter().rev() {
            if self.unit.as_ref().is_some_and(|unit| unit.is_match(line)) {
                // innermost unit line wins
                department.get_or_insert(*line);
            } else {
                title = Some(*line);
                break;
            }
        }
        if title.is_none() {
            title = department.take();
        }

        let title = clean(title?);
        if title.chars().count() < self.min_title_len {
            return None;
        }

        let fields = self
            .fields
            .iter()
            .filter_map(|f| {
                let haystack = match f.scope {
                    FieldScope::Following => after.to_string(),
                    FieldScope::Around { before: b, after: a } => {
                        format!("{}{}", tail(before, b), head(after, a))
                    }
                };
                first_match(&f.pattern, &haystack).map(|v| (f.name, v))
            })
            .collect();

        Some(Card {
            page: 0,
            title,
            department: department.map(clean),
            fields,
            after: after.to_string(),
        })
    }

    fn key(&self, card: &Card) -> CardKey {
        match self.reference_field.and_then(|f| card.field(f)) {
            Some(reference) => CardKey::Reference(card.title.clone(), reference.to_string()),
            None => CardKey::Department(
                card.title.clone(),
                card.department.clone().unwrap_or_default(),
            ),
        }
    }
}

/// First capture group (or the whole match), cleaned; empty values are no match.
fn first_match(re: &Regex, haystack: &str) -> Option<String> {
    let caps = re.captures(haystack)?;
    let m = caps.get(1).or_else(|| caps.get(0))?;
    Some(clean(m.as_str())).filter(|v| !v.is_empty())
}

/// Byte offset `n` characters before `idx`, clamped to 0.
fn chars_back(text: &str, idx: usize, n: usize) -> usize {
    if n == 0 {
        return idx;
    }
    text[..idx].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}

/// Byte offset `n` characters after `idx`, clamped to the end.
fn chars_forward(text: &str, idx: usize, n: usize) -> usize {
    text[idx..].char_indices().nth(n).map_or(text.len(), |(i, _)| idx + i)
}

fn tail(s: &str, n: usize) -> &str {
    &s[chars_back(s, s.len(), n)..]
}

fn head(s: &str, n: usize) -> &str {
    &s[..chars_forward(s, 0, n)]
}
