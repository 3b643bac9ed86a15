pub mod dedup;
pub mod diff;
pub mod retention;

use chrono::NaiveDate;
use tracing::info;

use crate::model::{CanonicalJobRecord, RawJobRecord, University};
use crate::normalize::{self, is_active};
pub use diff::PreviousSnapshot;

/// Raw output of one source, tagged with the institution it came from.
pub struct SourceBatch {
    pub university: &'static University,
    pub records: Vec<RawJobRecord>,
}

/// normalize → dedup → retention → diff, over batches in configured order.
pub fn run(
    batches: &[SourceBatch],
    previous: &PreviousSnapshot,
    today: NaiveDate,
    retention_days: u64,
) -> Vec<CanonicalJobRecord> {
    let canonical: Vec<_> = batches
        .iter()
        .flat_map(|b| {
            b.records
                .iter()
                .filter_map(move |raw| normalize::canonicalize(b.university, raw, today))
        })
        .collect();
    info!(records = canonical.len(), sources = batches.len(), "normalized");

    let unique = dedup::dedup(canonical);
    let retained = retention::retain(unique, today, retention_days);
    diff::apply(retained, previous, today)
}

pub struct RunSummary {
    pub total: usize,
    pub active: usize,
    pub new: usize,
}

impl RunSummary {
    pub fn of(records: &[CanonicalJobRecord], today: NaiveDate) -> Self {
        Self::tally(records.iter().map(|r| (r.deadline.as_str(), r.is_new)), today)
    }

    /// Count `(deadline, is_new)` pairs.
    pub fn tally<'a>(rows: impl IntoIterator<Item = (&'a str, bool)>, today: NaiveDate) -> Self {
        let mut summary = RunSummary { total: 0, active: 0, new: 0 };
        for (deadline, is_new) in rows {
            summary.total += 1;
            summary.active += usize::from(is_active(deadline, today));
            summary.new += usize::from(is_new);
        }
        summary
    }

    pub fn closed(&self) -> usize {
        self.total - self.active
    }

    pub fn print(&self) {
        println!("Total jobs:       {}", self.total);
        println!("Active (open):    {}", self.active);
        println!("New today:        {}", self.new);
        println!("Closed / expired: {}", self.closed());
    }
}

// ── Tests ──
