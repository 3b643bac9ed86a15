use std::sync::LazyLock;

use regex::Regex;

use super::links::{self, Link};
use crate::normalize::clean;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-{3,}:?$").unwrap());
static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// A table cell's text plus the first link inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub link: Option<Link>,
}

/// Cells of every markdown table row, in document order. Separator rows are
/// skipped; header rows are returned like any other row.
pub fn rows(markdown: &str) -> Vec<Vec<String>> {
    linked_rows(markdown)
        .into_iter()
        .map(|cells| cells.into_iter().map(|c| c.text).collect())
        .collect()
}

/// Like [`rows`], keeping each cell's link.
pub fn linked_rows(markdown: &str) -> Vec<Vec<Cell>> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .map(split_row)
        .filter(|cells| !is_separator(cells))
        .collect()
}

fn split_row(line: &str) -> Vec<Cell> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner
        .split('|')
        .map(|raw| Cell {
            text: cell_text(raw),
            link: links::scan(raw).into_iter().next(),
        })
        .collect()
}

fn cell_text(cell: &str) -> String {
    let text = LINK_RE.replace_all(cell, "$1");
    let text = BREAK_RE.replace_all(&text, " ");
    clean(&text.replace("**", ""))
}

fn is_separator(cells: &[Cell]) -> bool {
    !cells.is_empty() && cells.iter().all(|c| SEPARATOR_RE.is_match(&c.text))
}
