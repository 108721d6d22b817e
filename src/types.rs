use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, BTreeSet};
use tabled::Tabled;

use crate::error::ReportError;

/// One projected spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub technician: Option<String>,
    pub helper: Option<String>,
    pub activity: String,
    pub occurred_on: Option<NaiveDateTime>,
    pub contract_id: Option<String>,
}

/// Inclusive window from the start of `start` to the last instant of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(DateRange {
            start: start.and_time(NaiveTime::MIN),
            end: end
                .and_hms_micro_opt(23, 59, 59, 999_999)
                .unwrap_or_else(|| end.and_time(NaiveTime::MIN)),
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    /// Unknown dates are never inside any window.
    pub fn contains(&self, when: Option<NaiveDateTime>) -> bool {
        match when {
            Some(t) => self.start <= t && t <= self.end,
            None => false,
        }
    }
}

/// Activity name to count for one technician, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTally {
    entries: Vec<(String, u64)>,
}

impl ActivityTally {
    pub fn add(&mut self, activity: &str, count: u64) {
        match self.entries.iter_mut().find(|(name, _)| name == activity) {
            Some((_, n)) => *n += count,
            None => self.entries.push((activity.to_string(), count)),
        }
    }

    pub fn increment(&mut self, activity: &str) {
        self.add(activity, 1);
    }

    /// Add every count of `other` into this tally.
    pub fn absorb(&mut self, other: &ActivityTally) {
        for (activity, count) in other.iter() {
            self.add(activity, count);
        }
    }

    #[cfg(test)]
    pub fn get(&self, activity: &str) -> u64 {
        self.entries
            .iter()
            .find(|(name, _)| name == activity)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, n)| (name.as_str(), *n))
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for ActivityTally {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut tally = ActivityTally::default();
        for (activity, count) in iter {
            tally.add(activity.as_ref(), count);
        }
        tally
    }
}

/// Technician to tally; `BTreeMap` keeps technicians in byte order.
pub type TechnicianReport = BTreeMap<String, ActivityTally>;

/// Work done by helpers under each technician.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperAttribution {
    pub helpers_by_technician: BTreeMap<String, BTreeSet<String>>,
    pub counts: BTreeMap<(String, String), ActivityTally>,
}

impl HelperAttribution {
    pub fn total_services(&self) -> u64 {
        self.counts.values().map(ActivityTally::total).sum()
    }
}

/// One visit filed under a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEntry {
    pub activity: String,
    pub occurred_on: Option<NaiveDateTime>,
    pub technician: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractActivityGroup {
    pub contract_id: String,
    pub entries: Vec<ContractEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceCandidate {
    pub contract_id: String,
    pub entries: Vec<ContractEntry>,
    pub has_corrective: bool,
}

/// Console preview row for the technician tally.
#[derive(Debug, Tabled, Clone)]
pub struct TechnicianSummaryRow {
    #[tabled(rename = "Technician")]
    pub technician: String,
    #[tabled(rename = "Activities")]
    pub activities: String,
    #[tabled(rename = "Kinds")]
    pub kinds: usize,
}

/// Console preview row for the recurrence report.
#[derive(Debug, Tabled, Clone)]
pub struct ContractSummaryRow {
    #[tabled(rename = "Contract")]
    pub contract_id: String,
    #[tabled(rename = "Visits")]
    pub visits: usize,
    #[tabled(rename = "Corrective")]
    pub corrective: String,
    #[tabled(rename = "FirstVisit")]
    pub first_visit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, us: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_micro_opt(h, min, s, us)
            .unwrap()
    }

    #[test]
    fn range_boundaries_are_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();

        assert!(range.contains(Some(at(2024, 1, 1, 0, 0, 0, 0))));
        assert!(range.contains(Some(at(2024, 1, 31, 0, 0, 0, 0))));
        assert!(range.contains(Some(at(2024, 1, 31, 23, 59, 59, 999_999))));
        assert!(!range.contains(Some(at(2023, 12, 31, 23, 59, 59, 999_999))));
        assert!(!range.contains(Some(at(2024, 2, 1, 0, 0, 0, 0))));
        assert!(!range.contains(None));
    }

    #[test]
    fn range_rejects_reversed_dates() {
        let err = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(matches!(err, Err(ReportError::InvalidRange { .. })));
    }

    #[test]
    fn tally_keeps_first_seen_order() {
        let mut tally = ActivityTally::default();
        tally.increment("reparo");
        tally.increment("instalação");
        tally.increment("reparo");
        let order: Vec<_> = tally.iter().collect();
        assert_eq!(order, vec![("reparo", 2), ("instalação", 1)]);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.get("missing"), 0);
    }
}
