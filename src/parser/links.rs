use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::clean;

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(<?([^)\s>]+)>?(?:\s+[^)]*)?\)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// Every inline `[text](url)` link, in document order. Link text spanning
/// several lines is joined.
pub fn scan(markdown: &str) -> Vec<Link> {
    INLINE_LINK_RE
        .captures_iter(markdown)
        .map(|caps| Link {
            text: clean(&caps[1]),
            url: caps[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_links_in_order() {
        let md = "See [Senior Lecturer, Department of English](https://x/requisition/42) and\n\
                  [Apply](<https://y/apply> \"title\") or [](https://z)";
        let links = scan(md);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].text, "Senior Lecturer, Department of English");
        assert_eq!(links[0].url, "https://x/requisition/42");
        assert_eq!(links[1].url, "https://y/apply");
        assert_eq!(links[2].text, "");
    }

    #[test]
    fn multiline_text_joined() {
        let links = scan("[\nResearch Assistant Professor,\nSchool of Business\n](https://jobs/job/77)");
        assert_eq!(links[0].text, "Research Assistant Professor, School of Business");
        assert_eq!(links[0].url, "https://jobs/job/77");
    }
}
