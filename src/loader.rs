use crate::config::{ColumnLayout, ColumnRule, ReportConfig};
use crate::error::ReportError;
use crate::events::{EventSink, PipelineEvent};
use crate::types::ServiceRecord;
use crate::util::{decode_cell, non_blank, parse_datetime_safe};
use csv::{ByteRecord, ReaderBuilder};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub header_rows_skipped: usize,
    pub unreadable_rows: usize,
    pub unknown_dates: usize,
    pub blank_technicians: usize,
}

/// Locate the exported sheet: a directory holds one `<sheet>.csv` per sheet,
/// a plain file is taken to be the sheet itself.
pub fn resolve_sheet_path(input: &Path, sheet: &str) -> Result<PathBuf, ReportError> {
    if input.is_dir() {
        let candidate = input.join(format!("{}.csv", sheet));
        if candidate.is_file() {
            return Ok(candidate);
        }
        return Err(ReportError::unreadable(
            input,
            format!("sheet '{}' not found", sheet),
        ));
    }
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    Err(ReportError::unreadable(input, "file not found"))
}

/// Read one positional row into a typed record. Cells are decoded one by
/// one, so a row mixing encodings still projects.
pub fn project_row(row: &ByteRecord, layout: &ColumnLayout) -> ServiceRecord {
    let cell = |idx: usize| row.get(idx).map(decode_cell);
    ServiceRecord {
        technician: non_blank(cell(layout.technician).as_deref()),
        helper: non_blank(cell(layout.helper).as_deref()),
        activity: cell(layout.activity)
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string(),
        occurred_on: parse_datetime_safe(cell(layout.date).as_deref()),
        contract_id: non_blank(cell(layout.contract_id).as_deref()),
    }
}

/// Open the configured sheet, validate its column count against `rule`,
/// drop the metadata rows and project every remaining row.
///
/// Only an unreadable source or a schema mismatch is an error; bad rows,
/// bad dates and blank technicians are counted in the `LoadReport`.
pub fn load_records(
    input: &Path,
    config: &ReportConfig,
    rule: ColumnRule,
    sink: &dyn EventSink,
) -> Result<(Vec<ServiceRecord>, LoadReport), ReportError> {
    let path = resolve_sheet_path(input, &config.sheet_name)?;
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(config.delimiter_byte())
        .from_path(&path)
        .map_err(|e| ReportError::unreadable(&path, e))?;

    let columns = rdr
        .byte_headers()
        .map_err(|e| ReportError::unreadable(&path, e))?
        .len();
    if !rule.accepts(columns) || columns < config.layout.required_columns() {
        return Err(ReportError::SchemaMismatch {
            path,
            found: columns,
            expected: rule,
        });
    }
    sink.emit(PipelineEvent::SourceOpened {
        path: path.clone(),
        sheet: config.sheet_name.clone(),
        columns,
    });

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for (idx, result) in rdr.byte_records().enumerate() {
        if idx < config.header_rows {
            report.header_rows_skipped += 1;
            continue;
        }
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.unreadable_rows += 1;
                continue;
            }
        };
        let record = project_row(&row, &config.layout);
        if record.occurred_on.is_none() {
            report.unknown_dates += 1;
        }
        if record.technician.is_none() {
            report.blank_technicians += 1;
        }
        records.push(record);
    }

    sink.emit(PipelineEvent::RowsExtracted {
        rows: records.len(),
        unknown_dates: report.unknown_dates,
        blank_technicians: report.blank_technicians,
        unreadable_rows: report.unreadable_rows,
    });
    Ok((records, report))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for sheet exports shared by the loader and pipeline tests.
    use std::path::{Path, PathBuf};

    pub const COLUMNS: usize = 22;

    /// (contract, activity, date, technician, helper)
    pub type Row<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

    pub fn sheet_csv(columns: usize, rows: &[Row]) -> String {
        let header: Vec<String> = (0..columns).map(|i| format!("col{}", i)).collect();
        let mut out = header.join(",");
        out.push('\n');
        for i in 0..7 {
            let mut cells = vec![String::new(); columns];
            cells[0] = format!("metadata {}", i);
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        for (contract, activity, date, technician, helper) in rows {
            let mut cells = vec![String::new(); columns];
            cells[2] = contract.to_string();
            cells[8] = activity.to_string();
            cells[14] = date.to_string();
            cells[15] = technician.to_string();
            cells[16] = helper.to_string();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    pub fn write_sheet(dir: &Path, columns: usize, rows: &[Row]) -> PathBuf {
        write_sheet_bytes(dir, sheet_csv(columns, rows).as_bytes())
    }

    pub fn write_sheet_bytes(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join("Ordens de Serviço.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Swap every `marker` in `text` for `raw`, which need not be UTF-8.
    pub fn splice_bytes(text: &str, marker: &str, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut parts = text.split(marker);
        if let Some(first) = parts.next() {
            out.extend_from_slice(first.as_bytes());
        }
        for part in parts {
            out.extend_from_slice(raw);
            out.extend_from_slice(part.as_bytes());
        }
        out
    }
}
