use crate::events::{EventSink, PipelineEvent};
use crate::types::{ActivityTally, HelperAttribution, ServiceRecord, TechnicianReport};
use std::collections::HashSet;
use std::fmt::Write;

/// Count activities per technician.
///
/// Rows with a blank technician, a blank activity or an excluded technician
/// never reach the tally. Technicians come out sorted; activities keep the
/// order in which they were first seen.
pub fn aggregate_technicians(
    records: &[ServiceRecord],
    excluded: &HashSet<String>,
    sink: &dyn EventSink,
) -> TechnicianReport {
    let mut report = TechnicianReport::new();
    for r in records {
        let Some(technician) = r.technician.as_deref() else {
            continue;
        };
        if excluded.contains(technician) || r.activity.is_empty() {
            continue;
        }
        report
            .entry(technician.to_string())
            .or_default()
            .increment(&r.activity);
    }
    sink.emit(PipelineEvent::TechniciansAggregated {
        technicians: report.len(),
    });
    report
}

/// Count what each helper did under each technician.
///
/// A row is skipped when its technician is blank or excluded, when its helper
/// is excluded, or when it has no helper at all.
pub fn attribute_helpers(
    records: &[ServiceRecord],
    excluded_technicians: &HashSet<String>,
    excluded_helpers: &HashSet<String>,
    sink: &dyn EventSink,
) -> HelperAttribution {
    let mut attribution = HelperAttribution::default();
    for r in records {
        let Some(technician) = r.technician.as_deref() else {
            continue;
        };
        if excluded_technicians.contains(technician) {
            continue;
        }
        let Some(helper) = r.helper.as_deref() else {
            continue;
        };
        if excluded_helpers.contains(helper) || r.activity.is_empty() {
            continue;
        }
        attribution
            .helpers_by_technician
            .entry(technician.to_string())
            .or_default()
            .insert(helper.to_string());
        attribution
            .counts
            .entry((technician.to_string(), helper.to_string()))
            .or_default()
            .increment(&r.activity);
    }
    sink.emit(PipelineEvent::HelpersAttributed {
        technicians: attribution.helpers_by_technician.len(),
        pairs: attribution.counts.len(),
        services: attribution.total_services(),
    });
    attribution
}

/// Fold helper counts into the owning technician's tally. Counts are only
/// ever added; a technician seen only through helpers gets a new entry.
pub fn merge_helper_counts(
    report: &mut TechnicianReport,
    attribution: &HelperAttribution,
    sink: &dyn EventSink,
) {
    for ((technician, _helper), tally) in &attribution.counts {
        report
            .entry(technician.clone())
            .or_insert_with(ActivityTally::default)
            .absorb(tally);
    }
    sink.emit(PipelineEvent::HelpersMerged {
        technicians: report.len(),
    });
}

/// Render the helper section of the technician report.
pub fn format_helper_summary(attribution: &HelperAttribution) -> String {
    let mut out = String::new();
    for (technician, helpers) in &attribution.helpers_by_technician {
        let _ = writeln!(out, "Técnico: {}", technician);
        for helper in helpers {
            let _ = writeln!(out, "  Auxiliar: {}", helper);
            if let Some(tally) = attribution
                .counts
                .get(&(technician.clone(), helper.clone()))
            {
                for (activity, count) in tally.iter() {
                    let _ = writeln!(out, "    Serviço: {}, Quantidade: {}", activity, count);
                }
            }
        }
        out.push('\n');
    }
    let _ = writeln!(out, "Total de serviços: {}", attribution.total_services());
    out
}
