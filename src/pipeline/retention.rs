use chrono::{Days, NaiveDate};
use tracing::info;

use crate::model::CanonicalJobRecord;
use crate::normalize::iso_date;

pub const DEFAULT_RETENTION_DAYS: u64 = 30;

/// True when the posting is open-ended, unparsed, or closed no more than
/// `days` days before `today`.
pub fn within_retention(deadline: &str, today: NaiveDate, days: u64) -> bool {
    let Some(deadline) = iso_date(deadline) else {
        return true;
    };
    let cutoff = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
    deadline >= cutoff
}

pub fn retain(
    records: Vec<CanonicalJobRecord>,
    today: NaiveDate,
    days: u64,
) -> Vec<CanonicalJobRecord> {
    let before = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| within_retention(&r.deadline, today, days))
        .collect();
    if kept.len() < before {
        info!(dropped = before - kept.len(), days, "dropped long-expired postings");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::record;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn ago(days: u64) -> String {
        (today() - Days::new(days)).format("%Y-%m-%d").to_string()
    }

    #[test]
    fn window_edges() {
        assert!(!within_retention(&ago(31), today(), 30));
        assert!(within_retention(&ago(30), today(), 30));
        assert!(within_retention(&ago(29), today(), 30));
        assert!(within_retention("", today(), 30));
        assert!(within_retention("2099-01-01", today(), 30));
    }

    #[test]
    fn unparsed_deadline_is_kept() {
        assert!(within_retention("Until filled", today(), 30));
        assert!(within_retention("2024", today(), 30));
    }

    #[test]
    fn retain_filters_sequence() {
        let recs = vec![
            record("A-1", &ago(31)),
            record("A-2", &ago(29)),
            record("A-3", ""),
            record("A-4", &ago(400)),
        ];
        let out = retain(recs, today(), DEFAULT_RETENTION_DAYS);
        let ids: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["A-2", "A-3"]);
    }

    #[test]
    fn zero_day_window() {
        assert!(within_retention(&ago(0), today(), 0));
        assert!(!within_retention(&ago(1), today(), 0));
    }
}
