use crate::types::{
    ContractSummaryRow, DateRange, RecurrenceCandidate, TechnicianReport, TechnicianSummaryRow,
};
use crate::util::format_int;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub const RECURRENCE_FILE_NAME: &str = "contratos_reincidentes.txt";

pub fn technician_file_name(range: &DateRange) -> String {
    format!(
        "Relatório_{}_{}.txt",
        range.start_date().format("%Y-%m-%d"),
        range.end_date().format("%Y-%m-%d")
    )
}

/// Render the technician activity report.
///
/// The grand total is the sum of the per-technician subtotals minus
/// `total_services`, the helper services already folded into those subtotals.
pub fn render_technician_report(
    report: &TechnicianReport,
    helper_summary: &str,
    total_services: u64,
) -> String {
    let mut out = String::new();
    let mut grand_total: i64 = 0;
    out.push_str("-------------------------------------------------\n");
    out.push_str("-----> Relatório de Atividades por Técnico <-----\n");
    out.push_str("-------------------------------------------------\n");
    for (technician, tally) in report {
        let _ = write!(
            out,
            "\n********************************\nTécnico: {}\n********************************\n",
            technician
        );
        let subtotal = tally.total();
        grand_total += subtotal as i64;
        let _ = write!(
            out,
            "\n++++++++++++++++++++++++\nTotal de atividades: {}\n++++++++++++++++++++++++\n",
            subtotal
        );
        for (activity, count) in tally.iter() {
            let _ = writeln!(out, "- Atividade: {} = {}", activity, count);
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "********************************\nTotal geral de atividades: {}\n********************************\n",
        grand_total - total_services as i64
    );
    out.push_str("--------------------------------------------\n");
    out.push_str("-----> Relatório de ajuda por Técnico <-----\n");
    out.push_str("--------------------------------------------\n");
    let _ = writeln!(out, "{}", helper_summary);
    out
}

/// Render the recurrence report.
pub fn render_recurrence_report(contracts: &[RecurrenceCandidate]) -> String {
    let mut out = String::new();
    for contract in contracts {
        let _ = writeln!(out, "Contrato: {}", contract.contract_id);
        out.push_str("Atividades:\n");
        for entry in &contract.entries {
            let date = entry
                .occurred_on
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "Atividade: {}, Data: {}, Técnico: {}",
                entry.activity, date, entry.technician
            );
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "---------------------------------------\nTotal de contratos impressos: {}\n---------------------------------------",
        contracts.len()
    );
    out
}

/// Write a fully rendered report in one go, replacing any previous file.
pub fn write_report(dir: &Path, file_name: &str, contents: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

pub fn technician_rows(report: &TechnicianReport) -> Vec<TechnicianSummaryRow> {
    report
        .iter()
        .map(|(technician, tally)| TechnicianSummaryRow {
            technician: technician.clone(),
            activities: format_int(tally.total()),
            kinds: tally.len(),
        })
        .collect()
}

pub fn contract_rows(contracts: &[RecurrenceCandidate]) -> Vec<ContractSummaryRow> {
    contracts
        .iter()
        .map(|c| ContractSummaryRow {
            contract_id: c.contract_id.clone(),
            visits: c.entries.len(),
            corrective: if c.has_corrective { "yes" } else { "no" }.to_string(),
            first_visit: c
                .entries
                .iter()
                .filter_map(|e| e.occurred_on)
                .min()
                .map(|d| d.date().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
    if rows.len() > max_rows {
        println!("({} more rows in the report file)\n", format_int(rows.len() - max_rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityTally, ContractEntry};
    use chrono::NaiveDate;

    fn tally(items: &[(&str, u64)]) -> ActivityTally {
        items.iter().copied().collect()
    }

    #[test]
    fn technician_report_layout_and_grand_total() {
        let mut report = TechnicianReport::new();
        report.insert("ana".to_string(), tally(&[("reparo", 3), ("instalação", 1)]));
        report.insert("bruno".to_string(), tally(&[("reparo", 2)]));

        let text = render_technician_report(&report, "Total de serviços: 2\n", 2);

        let expected = "\
-------------------------------------------------
-----> Relatório de Atividades por Técnico <-----
-------------------------------------------------

********************************
Técnico: ana
********************************

++++++++++++++++++++++++
Total de atividades: 4
++++++++++++++++++++++++
- Atividade: reparo = 3
- Atividade: instalação = 1


********************************
Técnico: bruno
********************************

++++++++++++++++++++++++
Total de atividades: 2
++++++++++++++++++++++++
- Atividade: reparo = 2

********************************
Total geral de atividades: 4
********************************
--------------------------------------------
-----> Relatório de ajuda por Técnico <-----
--------------------------------------------
Total de serviços: 2

";
        assert_eq!(text, expected);
    }

    #[test]
    fn grand_total_subtraction_may_go_negative() {
        let mut report = TechnicianReport::new();
        report.insert("ana".to_string(), tally(&[("reparo", 1)]));
        let text = render_technician_report(&report, "", 5);
        assert!(text.contains("Total geral de atividades: -4\n"));
    }

    #[test]
    fn recurrence_report_layout() {
        let when = NaiveDate::from_ymd_opt(2024, 1, 20)
            .unwrap()
            .and_hms_opt(0, 0, 0);
        let contracts = vec![RecurrenceCandidate {
            contract_id: "contractA".to_string(),
            entries: vec![ContractEntry {
                activity: "corretiva".to_string(),
                occurred_on: when,
                technician: "carlos".to_string(),
            }],
            has_corrective: true,
        }];

        assert_eq!(
            render_recurrence_report(&contracts),
            "Contrato: contractA\nAtividades:\n\
             Atividade: corretiva, Data: 2024-01-20 00:00:00, Técnico: carlos\n\n\
             ---------------------------------------\n\
             Total de contratos impressos: 1\n\
             ---------------------------------------"
        );
    }

    #[test]
    fn recurrence_dates_drop_fractional_seconds() {
        let contracts = vec![RecurrenceCandidate {
            contract_id: "contractA".to_string(),
            entries: vec![
                ContractEntry {
                    activity: "corretiva".to_string(),
                    occurred_on: NaiveDate::from_ymd_opt(2024, 1, 5)
                        .unwrap()
                        .and_hms_milli_opt(8, 30, 15, 250),
                    technician: "t".to_string(),
                },
                ContractEntry {
                    activity: "upgrade".to_string(),
                    occurred_on: None,
                    technician: "t".to_string(),
                },
            ],
            has_corrective: true,
        }];

        let text = render_recurrence_report(&contracts);
        assert!(text.contains("Atividade: corretiva, Data: 2024-01-05 08:30:15, Técnico: t\n"));
        assert!(text.contains("Atividade: upgrade, Data: -, Técnico: t\n"));
    }

    #[test]
    fn file_names_follow_range() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(technician_file_name(&range), "Relatório_2024-01-01_2024-01-31.txt");
    }

    #[test]
    fn write_report_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        write_report(&out, "r.txt", "first").unwrap();
        let path = write_report(&out, "r.txt", "second").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
    }
}
