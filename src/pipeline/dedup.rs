use itertools::Itertools;
use tracing::info;

use crate::model::CanonicalJobRecord;

/// Keep the first record for every id, in input order. Later duplicates are
/// discarded whole; nothing is merged from them.
pub fn dedup(records: Vec<CanonicalJobRecord>) -> Vec<CanonicalJobRecord> {
    let before = records.len();
    let unique: Vec<_> = records.into_iter().unique_by(|r| r.id.clone()).collect();
    if unique.len() < before {
        info!(dropped = before - unique.len(), "removed duplicate ids");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::record;

    #[test]
    fn first_occurrence_wins() {
        let mut first = record("HKU-1", "");
        first.title = "First".into();
        let mut second = record("HKU-1", "2030-01-01");
        second.title = "Second".into();
        second.department = "Other dept".into();

        let out = dedup(vec![first.clone(), record("HKU-2", ""), second]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], first);
        assert_eq!(out[1].id, "HKU-2");
    }

    #[test]
    fn order_preserved() {
        let ids = ["C-3", "A-1", "C-3", "B-2", "A-1"];
        let out = dedup(ids.iter().map(|id| record(id, "")).collect());
        let got: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, ["C-3", "A-1", "B-2"]);
    }
}
