use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::CanonicalJobRecord;

/// `id -> date_added` from the previously published dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousSnapshot {
    seen: HashMap<String, String>,
}

impl PreviousSnapshot {
    pub fn new(seen: HashMap<String, String>) -> Self {
        PreviousSnapshot { seen }
    }

    pub fn date_added(&self, id: &str) -> Option<&str> {
        self.seen.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PreviousSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PreviousSnapshot::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Mark ids absent from `previous` as new (added today); carry over the first
/// seen date of everything else.
pub fn apply(
    records: Vec<CanonicalJobRecord>,
    previous: &PreviousSnapshot,
    today: NaiveDate,
) -> Vec<CanonicalJobRecord> {
    let today = today.format("%Y-%m-%d").to_string();
    records
        .into_iter()
        .map(|r| match previous.date_added(&r.id) {
            Some(first_seen) => CanonicalJobRecord {
                is_new: false,
                date_added: first_seen.to_string(),
                ..r
            },
            None => CanonicalJobRecord {
                is_new: true,
                date_added: today.clone(),
                ..r
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::record;

    #[test]
    fn seen_and_unseen() {
        let snapshot: PreviousSnapshot = [("POLYU-123", "2025-01-01")].into_iter().collect();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let mut stale = record("POLYU-123", "");
        stale.is_new = true;
        stale.date_added = "2025-03-01".into();

        let out = apply(vec![stale, record("POLYU-999", "")], &snapshot, today);
        assert!(!out[0].is_new);
        assert_eq!(out[0].date_added, "2025-01-01");
        assert!(out[1].is_new);
        assert_eq!(out[1].date_added, "2025-03-01");
    }

    #[test]
    fn upstream_guess_is_overridden() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut rec = record("HKU-1", "");
        rec.is_new = false;
        rec.date_added = "1999-01-01".into();
        let out = apply(vec![rec], &PreviousSnapshot::default(), today);
        assert!(out[0].is_new);
        assert_eq!(out[0].date_added, "2025-03-01");
    }
}
