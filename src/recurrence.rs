// Recurrence detection.
//
// Contracts move through a fixed sequence of stages and may be dropped at any
// of them:
//
//   Raw -> Whitelisted -> Consolidated -> Reconsolidated -> ClusterChecked
//       -> DateWindowed -> Reported
//
// A contract is "recurring" when it has a corrective visit or more than one
// qualifying visit, and (without a corrective visit) all of its qualifying
// visits fall within the recurrence window of the earliest one.
use crate::config::ReportConfig;
use crate::events::{EventSink, PipelineEvent};
use crate::types::{
    ContractActivityGroup, ContractEntry, DateRange, RecurrenceCandidate, ServiceRecord,
};
use crate::util::days_between;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceStage {
    Raw,
    Whitelisted,
    Consolidated,
    Reconsolidated,
    ClusterChecked,
    DateWindowed,
    Reported,
}

impl fmt::Display for RecurrenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrenceStage::Raw => "raw",
            RecurrenceStage::Whitelisted => "whitelisted",
            RecurrenceStage::Consolidated => "consolidated",
            RecurrenceStage::Reconsolidated => "reconsolidated",
            RecurrenceStage::ClusterChecked => "cluster_checked",
            RecurrenceStage::DateWindowed => "date_windowed",
            RecurrenceStage::Reported => "reported",
        };
        f.write_str(name)
    }
}

impl RecurrenceCandidate {
    fn new(contract_id: String, entries: Vec<ContractEntry>, config: &ReportConfig) -> Self {
        let has_corrective = entries.iter().any(|e| config.is_corrective(&e.activity));
        RecurrenceCandidate {
            contract_id,
            entries,
            has_corrective,
        }
    }

    /// Keep the entries matching `keep`, refreshing the corrective flag.
    fn retain(self, config: &ReportConfig, keep: impl Fn(&ContractEntry) -> bool) -> Self {
        let entries = self.entries.into_iter().filter(|e| keep(e)).collect();
        RecurrenceCandidate::new(self.contract_id, entries, config)
    }

    /// One corrective visit, or more than one visit of any qualifying kind.
    pub fn is_triggered(&self) -> bool {
        self.entries.len() > 1 || self.has_corrective
    }
}

/// Group records by contract in order of first appearance.
///
/// Rows without a technician, an activity or a contract id cannot be
/// attributed and are left out. Activity names are lower-cased here.
pub fn group_by_contract(records: &[ServiceRecord]) -> Vec<ContractActivityGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ContractActivityGroup> = Vec::new();
    for r in records {
        let (Some(contract_id), Some(technician)) = (r.contract_id.as_deref(), r.technician.as_deref())
        else {
            continue;
        };
        if r.activity.is_empty() {
            continue;
        }
        let slot = *index.entry(contract_id).or_insert_with(|| {
            groups.push(ContractActivityGroup {
                contract_id: contract_id.to_string(),
                entries: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].entries.push(ContractEntry {
            activity: r.activity.to_lowercase(),
            occurred_on: r.occurred_on,
            technician: technician.to_string(),
        });
    }
    groups
}

/// Raw -> Whitelisted: keep qualifying activities, drop contracts left empty.
pub fn whitelist(
    groups: Vec<ContractActivityGroup>,
    config: &ReportConfig,
) -> Vec<RecurrenceCandidate> {
    groups
        .into_iter()
        .map(|g| RecurrenceCandidate::new(g.contract_id, g.entries, config))
        .map(|c| c.retain(config, |e| config.is_qualifying(&e.activity)))
        .filter(|c| !c.entries.is_empty())
        .collect()
}

/// Whitelisted -> Consolidated: re-admit qualifying or corrective activities
/// and keep the contracts that trip the recurrence trigger.
pub fn consolidate(
    candidates: Vec<RecurrenceCandidate>,
    config: &ReportConfig,
) -> Vec<RecurrenceCandidate> {
    candidates
        .into_iter()
        .map(|c| {
            c.retain(config, |e| {
                config.is_qualifying(&e.activity) || config.is_corrective(&e.activity)
            })
        })
        .filter(RecurrenceCandidate::is_triggered)
        .collect()
}

/// Consolidated -> Reconsolidated: same trigger test, then narrow to the
/// whitelist again.
pub fn reconsolidate(
    candidates: Vec<RecurrenceCandidate>,
    config: &ReportConfig,
) -> Vec<RecurrenceCandidate> {
    candidates
        .into_iter()
        .filter(RecurrenceCandidate::is_triggered)
        .map(|c| c.retain(config, |e| config.is_qualifying(&e.activity)))
        .filter(|c| !c.entries.is_empty())
        .collect()
}

/// Reconsolidated -> ClusterChecked: without a corrective visit every dated
/// activity must fall within `window_days` of the earliest one, otherwise the
/// whole contract goes.
pub fn check_cluster(
    candidates: Vec<RecurrenceCandidate>,
    window_days: i64,
) -> Vec<RecurrenceCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.has_corrective || within_window(&c.entries, window_days))
        .collect()
}

fn within_window(entries: &[ContractEntry], window_days: i64) -> bool {
    // Unknown dates cannot widen the spread; the date window removes them later.
    let dates: Vec<_> = entries.iter().filter_map(|e| e.occurred_on).collect();
    let Some(earliest) = dates.iter().min().copied() else {
        return true;
    };
    dates
        .iter()
        .all(|d| days_between(earliest, *d) <= window_days)
}

/// ClusterChecked -> DateWindowed: keep activities inside `range`.
pub fn apply_date_window(
    candidates: Vec<RecurrenceCandidate>,
    range: &DateRange,
    config: &ReportConfig,
) -> Vec<RecurrenceCandidate> {
    candidates
        .into_iter()
        .map(|c| c.retain(config, |e| range.contains(e.occurred_on)))
        .filter(|c| !c.entries.is_empty())
        .collect()
}

/// DateWindowed -> Reported: the trigger must still hold after windowing.
pub fn select_reported(candidates: Vec<RecurrenceCandidate>) -> Vec<RecurrenceCandidate> {
    candidates
        .into_iter()
        .filter(RecurrenceCandidate::is_triggered)
        .collect()
}

/// Run every stage over `records` and return the contracts to report, in
/// order of first appearance in the sheet.
pub fn detect_recurrences(
    records: &[ServiceRecord],
    range: &DateRange,
    config: &ReportConfig,
    sink: &dyn EventSink,
) -> Vec<RecurrenceCandidate> {
    let stage = |stage: RecurrenceStage, contracts: usize| {
        sink.emit(PipelineEvent::StageCompleted { stage, contracts })
    };

    let groups = group_by_contract(records);
    stage(RecurrenceStage::Raw, groups.len());
    let candidates = whitelist(groups, config);
    stage(RecurrenceStage::Whitelisted, candidates.len());
    let candidates = consolidate(candidates, config);
    stage(RecurrenceStage::Consolidated, candidates.len());
    let candidates = reconsolidate(candidates, config);
    stage(RecurrenceStage::Reconsolidated, candidates.len());
    let candidates = check_cluster(candidates, config.recurrence_window_days);
    stage(RecurrenceStage::ClusterChecked, candidates.len());
    let candidates = apply_date_window(candidates, range, config);
    stage(RecurrenceStage::DateWindowed, candidates.len());
    let reported = select_reported(candidates);
    stage(RecurrenceStage::Reported, reported.len());
    reported
}
