use std::sync::LazyLock;

use regex::Regex;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[^\S\n]*#{1,6}[^\S\n]*").unwrap());
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[^\S\n]*[-*+][^\S\n]+").unwrap());
static STRONG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*|__").unwrap());

/// Markdown reduced to the plain text a browser would show, line for line:
/// heading hashes, list bullets and bold markers go, links keep their text and
/// images disappear.
pub fn flatten(markdown: &str) -> String {
    let text = IMAGE_RE.replace_all(markdown, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BULLET_RE.replace_all(&text, "");
    STRONG_RE.replace_all(&text, "").into_owned()
}
