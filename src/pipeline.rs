// One function per report. Each run checks the gate, loads the sheet once,
// runs its stages, renders the whole report in memory and only then touches
// the output file, so a failed run leaves nothing behind.
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::events::{EventSink, PipelineEvent};
use crate::filter::filter_by_date;
use crate::gate::LockGate;
use crate::loader::{load_records, LoadReport};
use crate::output::{
    render_recurrence_report, render_technician_report, technician_file_name, write_report,
    RECURRENCE_FILE_NAME,
};
use crate::recurrence::detect_recurrences;
use crate::reports::{
    aggregate_technicians, attribute_helpers, format_helper_summary, merge_helper_counts,
};
use crate::types::{DateRange, HelperAttribution, RecurrenceCandidate, TechnicianReport};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TechnicianRun {
    pub path: PathBuf,
    pub report: TechnicianReport,
    pub attribution: HelperAttribution,
    pub load: LoadReport,
}

#[derive(Debug)]
pub struct RecurrenceRun {
    pub path: PathBuf,
    pub contracts: Vec<RecurrenceCandidate>,
    pub load: LoadReport,
}

fn ensure_unlocked(gate: &dyn LockGate, sink: &dyn EventSink) -> Result<(), ReportError> {
    if gate.is_locked() {
        sink.emit(PipelineEvent::RunRejected {
            reason: "lock gate is closed".to_string(),
        });
        return Err(ReportError::Locked);
    }
    Ok(())
}

fn failed(sink: &dyn EventSink, stage: &'static str, path: &Path, err: ReportError) -> ReportError {
    sink.emit(PipelineEvent::Failure {
        stage,
        path: path.to_path_buf(),
        message: err.to_string(),
    });
    err
}

/// Read the optional JSON override, apply `overrides` on top and validate
/// the result. Without a file the built-in configuration is the base.
pub fn load_config(
    file: Option<&Path>,
    overrides: impl FnOnce(&mut ReportConfig),
    sink: &dyn EventSink,
) -> Result<ReportConfig, ReportError> {
    let origin = file.map(Path::to_path_buf).unwrap_or_default();
    let mut config = match file {
        Some(path) => ReportConfig::from_json_file(path),
        None => Ok(ReportConfig::default()),
    }
    .map_err(|e| failed(sink, "config", &origin, e))?;
    overrides(&mut config);
    config
        .normalized()
        .map_err(|e| failed(sink, "config", &origin, e))
}

fn report_range(
    start: NaiveDate,
    end: NaiveDate,
    input: &Path,
    sink: &dyn EventSink,
) -> Result<DateRange, ReportError> {
    DateRange::new(start, end).map_err(|e| failed(sink, "range", input, e))
}

/// Build `Relatório_<start>_<end>.txt`: activities per technician from
/// `start` to `end` inclusive, with helper work folded into the technician
/// who led it.
pub fn run_technician_report(
    input: &Path,
    start: NaiveDate,
    end: NaiveDate,
    config: &ReportConfig,
    gate: &dyn LockGate,
    sink: &dyn EventSink,
) -> Result<TechnicianRun, ReportError> {
    ensure_unlocked(gate, sink)?;
    let range = report_range(start, end, input, sink)?;
    let (records, load) = load_records(input, config, config.tally_columns, sink)
        .map_err(|e| failed(sink, "load", input, e))?;

    let in_range = filter_by_date(&records, &range, sink);
    let mut report = aggregate_technicians(&in_range, &config.excluded_technicians, sink);
    let attribution = attribute_helpers(
        &in_range,
        &config.excluded_technicians,
        &config.excluded_helpers,
        sink,
    );
    merge_helper_counts(&mut report, &attribution, sink);

    let text = render_technician_report(
        &report,
        &format_helper_summary(&attribution),
        attribution.total_services(),
    );
    let file_name = technician_file_name(&range);
    let path = write_report(&config.output_dir, &file_name, &text)
        .map_err(|e| failed(sink, "write", &config.output_dir.join(&file_name), e.into()))?;
    sink.emit(PipelineEvent::ReportWritten {
        path: path.clone(),
        sections: report.len(),
    });

    Ok(TechnicianRun {
        path,
        report,
        attribution,
        load,
    })
}

/// Build `contratos_reincidentes.txt`: contracts with a corrective visit or
/// clustered repeat visits, restricted to `start..=end`.
pub fn run_recurrence_report(
    input: &Path,
    start: NaiveDate,
    end: NaiveDate,
    config: &ReportConfig,
    gate: &dyn LockGate,
    sink: &dyn EventSink,
) -> Result<RecurrenceRun, ReportError> {
    ensure_unlocked(gate, sink)?;
    let range = report_range(start, end, input, sink)?;
    let (records, load) = load_records(input, config, config.recurrence_columns, sink)
        .map_err(|e| failed(sink, "load", input, e))?;

    let contracts = detect_recurrences(&records, &range, config, sink);

    let text = render_recurrence_report(&contracts);
    let path = write_report(&config.output_dir, RECURRENCE_FILE_NAME, &text).map_err(|e| {
        failed(
            sink,
            "write",
            &config.output_dir.join(RECURRENCE_FILE_NAME),
            e.into(),
        )
    })?;
    sink.emit(PipelineEvent::ReportWritten {
        path: path.clone(),
        sections: contracts.len(),
    });

    Ok(RecurrenceRun {
        path,
        contracts,
        load,
    })
}
