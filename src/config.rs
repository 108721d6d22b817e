// Fixed run configuration.
//
// Everything here is decided before a run starts and never changes while it
// runs. The built-in values live in a lazily built static so the CLI, the
// JSON override loader and the tests all start from the same defaults.
use crate::error::ReportError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SHEET_NAME: &str = "Ordens de Serviço";
pub const HEADER_ROWS: usize = 7;
pub const RECURRENCE_WINDOW_DAYS: i64 = 30;
pub const CORRECTIVE_ACTIVITY: &str = "corretiva";

const EXCLUDED_TECHNICIANS: &[&str] = &[
    "tiago.peres",
    "eguinailson.nunes",
    "evandro.zuza",
    "geimerson.alves",
    "NOC",
    "jonatas.thiago",
];

const EXCLUDED_HELPERS: &[&str] = &[
    "tiago.peres",
    "eguinailson.nunes",
    "evandro.zuza",
    "geimerson.alves",
    "NOC",
    "jonatas.thiago",
];

const QUALIFYING_ACTIVITIES: &[&str] = &[
    "revertido",
    "verificação",
    "recorrencia",
    "retirada sem sucesso",
    "promessa de pagamento",
    "recolha de equipamento",
    "rede interna",
    "suporte externo",
    "migração",
    "infraestrutura",
    "retirada",
    "ourinetv",
    "transferência",
    "reativação",
    "financeiro",
    "downgrade",
    "upgrade",
    "cancelamento",
    "ativação",
    "suporte interno",
];

static BUILTIN: Lazy<ReportConfig> = Lazy::new(ReportConfig::builtin);

/// Accepted column count for a sheet.
///
/// The technician tally and the recurrence search historically disagreed on
/// this, so each path carries its own rule; `TALLY` and `RECURRENCE` are the
/// two known presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRule {
    Exactly(usize),
    AtMost(usize),
}

impl ColumnRule {
    pub const TALLY: ColumnRule = ColumnRule::Exactly(22);
    pub const RECURRENCE: ColumnRule = ColumnRule::AtMost(26);

    pub fn accepts(&self, columns: usize) -> bool {
        match *self {
            ColumnRule::Exactly(n) => columns == n,
            ColumnRule::AtMost(n) => columns <= n,
        }
    }
}

impl fmt::Display for ColumnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRule::Exactly(n) => write!(f, "exactly {}", n),
            ColumnRule::AtMost(n) => write!(f, "at most {}", n),
        }
    }
}

/// Zero-based positions of the columns the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub contract_id: usize,
    pub activity: usize,
    pub date: usize,
    pub technician: usize,
    pub helper: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        ColumnLayout {
            contract_id: 2,
            activity: 8,
            date: 14,
            technician: 15,
            helper: 16,
        }
    }
}

impl ColumnLayout {
    /// Smallest column count that still holds every projected column.
    pub fn required_columns(&self) -> usize {
        [
            self.contract_id,
            self.activity,
            self.date,
            self.technician,
            self.helper,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub sheet_name: String,
    pub header_rows: usize,
    pub layout: ColumnLayout,
    pub delimiter: char,
    pub excluded_technicians: HashSet<String>,
    pub excluded_helpers: HashSet<String>,
    pub qualifying_activities: HashSet<String>,
    pub corrective_activity: String,
    pub recurrence_window_days: i64,
    pub tally_columns: ColumnRule,
    pub recurrence_columns: ColumnRule,
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl ReportConfig {
    fn builtin() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        ReportConfig {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            header_rows: HEADER_ROWS,
            layout: ColumnLayout::default(),
            delimiter: ',',
            excluded_technicians: owned(EXCLUDED_TECHNICIANS),
            excluded_helpers: owned(EXCLUDED_HELPERS),
            qualifying_activities: owned(QUALIFYING_ACTIVITIES),
            corrective_activity: CORRECTIVE_ACTIVITY.to_string(),
            recurrence_window_days: RECURRENCE_WINDOW_DAYS,
            tally_columns: ColumnRule::TALLY,
            recurrence_columns: ColumnRule::RECURRENCE,
            output_dir: PathBuf::from("."),
        }
    }

    /// Load a JSON override file. Missing fields keep their built-in value.
    pub fn from_json_file(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ReportConfig = serde_json::from_str(&raw).map_err(|e| {
            ReportError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        config.normalized()
    }

    /// Lower-case the activity names and reject values the pipeline cannot use.
    pub fn normalized(mut self) -> Result<Self, ReportError> {
        if !self.delimiter.is_ascii() {
            return Err(ReportError::Configuration(format!(
                "delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        if self.recurrence_window_days < 0 {
            return Err(ReportError::Configuration(
                "recurrence_window_days must not be negative".to_string(),
            ));
        }
        self.qualifying_activities = self
            .qualifying_activities
            .iter()
            .map(|a| a.trim().to_lowercase())
            .collect();
        self.corrective_activity = self.corrective_activity.trim().to_lowercase();
        Ok(self)
    }

    pub fn delimiter_byte(&self) -> u8 {
        // `normalized` guarantees ASCII.
        self.delimiter as u8
    }

    pub fn is_corrective(&self, activity: &str) -> bool {
        activity == self.corrective_activity
    }

    /// Whitelist membership. The corrective sentinel counts as qualifying.
    pub fn is_qualifying(&self, activity: &str) -> bool {
        self.qualifying_activities.contains(activity) || self.is_corrective(activity)
    }
}
