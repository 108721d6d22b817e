// Structured pipeline events.
//
// Stages never log on their own; they report what happened to the sink they
// were handed. `TracingSink` is what the binary uses, `MemorySink` is what the
// tests inspect.
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::recurrence::RecurrenceStage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    SourceOpened {
        path: PathBuf,
        sheet: String,
        columns: usize,
    },
    RowsExtracted {
        rows: usize,
        unknown_dates: usize,
        blank_technicians: usize,
        unreadable_rows: usize,
    },
    DateFiltered {
        kept: usize,
        dropped: usize,
    },
    TechniciansAggregated {
        technicians: usize,
    },
    HelpersAttributed {
        technicians: usize,
        pairs: usize,
        services: u64,
    },
    HelpersMerged {
        technicians: usize,
    },
    StageCompleted {
        stage: RecurrenceStage,
        contracts: usize,
    },
    ReportWritten {
        path: PathBuf,
        sections: usize,
    },
    RunRejected {
        reason: String,
    },
    Failure {
        stage: &'static str,
        path: PathBuf,
        message: String,
    },
}

pub trait EventSink {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::SourceOpened {
                path,
                sheet,
                columns,
            } => info!(path = %path.display(), %sheet, columns, "sheet opened"),
            PipelineEvent::RowsExtracted {
                rows,
                unknown_dates,
                blank_technicians,
                unreadable_rows,
            } => {
                info!(rows, "records extracted");
                if unknown_dates > 0 || blank_technicians > 0 || unreadable_rows > 0 {
                    warn!(
                        unknown_dates,
                        blank_technicians, unreadable_rows, "degraded rows kept or skipped"
                    );
                }
            }
            PipelineEvent::DateFiltered { kept, dropped } => {
                debug!(kept, dropped, "date range applied")
            }
            PipelineEvent::TechniciansAggregated { technicians } => {
                info!(technicians, "technician activities aggregated")
            }
            PipelineEvent::HelpersAttributed {
                technicians,
                pairs,
                services,
            } => info!(technicians, pairs, services, "helper activities attributed"),
            PipelineEvent::HelpersMerged { technicians } => {
                debug!(technicians, "helper counts merged into tally")
            }
            PipelineEvent::StageCompleted { stage, contracts } => {
                debug!(stage = %stage, contracts, "recurrence stage completed")
            }
            PipelineEvent::ReportWritten { path, sections } => {
                info!(path = %path.display(), sections, "report written")
            }
            PipelineEvent::RunRejected { reason } => warn!(%reason, "run rejected"),
            PipelineEvent::Failure {
                stage,
                path,
                message,
            } => error!(stage, path = %path.display(), %message, "run failed"),
        }
    }
}

/// Keeps events in memory, in emission order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    events: std::cell::RefCell<Vec<PipelineEvent>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.borrow().clone()
    }
}

#[cfg(test)]
impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        self.events.borrow_mut().push(event);
    }
}
