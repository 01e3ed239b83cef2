//! Rulebook loading from a workbook of team sheets.
//!
//! The rulebook is maintained as a spreadsheet with one sheet per reviewing
//! team. It is exported to JSON as `{"sheets": [{"name": ..., "rows": [...]}]}`
//! where each row is an array of cells (strings, numbers, booleans, or null).
//! Column positions vary between sheets, so columns are discovered by keyword
//! match against the header row.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::CoreError;
use crate::model::{Rule, RuleSource, Severity};

/// A rulebook export: ordered sheets of rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// First row is the header.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Risk cells that mark a row as a sub-header rather than a rule.
const NON_RISK_VALUES: &[&str] = &["none", "risk"];

/// Column indices discovered from a sheet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    clause: Option<usize>,
    sub_clause: usize,
    risk: Option<usize>,
    response: Option<usize>,
}

impl Columns {
    /// Returns `None` when neither a clause nor a sub-clause column exists.
    fn discover(header: &[Value]) -> Option<Self> {
        let header: Vec<String> = header.iter().map(|c| cell_text(c).to_lowercase()).collect();
        let find = |keywords: &[&str]| {
            header
                .iter()
                .position(|h| keywords.iter().any(|kw| h.contains(kw)))
        };

        let clause = find(&["clause"]);
        let sub_clause = find(&["sub-clause", "subclause", "sub clause"]).or(clause)?;
        Some(Self {
            clause,
            sub_clause,
            risk: find(&["risk"]),
            response: find(&["response"]),
        })
    }
}

/// Read and parse a rulebook JSON export.
pub fn load_rulebook_file(path: &Path) -> Result<Vec<Rule>, CoreError> {
    if !path.exists() {
        return Err(CoreError::RulebookNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let workbook: Workbook = serde_json::from_str(&text)?;
    Ok(load_rulebook(&workbook))
}

/// Extract rules from every team sheet of a workbook.
///
/// Rows with an empty clause cell inherit the most recent clause label.
/// Rows lacking a severity or a suggested response are section headings and
/// are skipped. Rule numbering runs across the whole workbook.
pub fn load_rulebook(workbook: &Workbook) -> Vec<Rule> {
    let mut rules = Vec::new();

    for sheet in &workbook.sheets {
        let Some(source) = RuleSource::from_sheet_name(&sheet.name) else {
            continue;
        };
        if sheet.rows.len() < 2 {
            continue;
        }
        let Some(cols) = Columns::discover(&sheet.rows[0]) else {
            warn!(sheet = %sheet.name, "no clause column found, skipping sheet");
            continue;
        };

        let mut current_clause = String::new();
        for row in &sheet.rows[1..] {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(cell_text)
                    .unwrap_or_default()
            };

            let clause_val = cell(cols.clause);
            let sub_val = cell(Some(cols.sub_clause));
            let risk_val = cell(cols.risk);
            let resp_val = cell(cols.response);

            if !clause_val.is_empty() {
                current_clause = clause_val;
            }

            if risk_val.is_empty() || NON_RISK_VALUES.contains(&risk_val.to_lowercase().as_str()) {
                continue;
            }
            if resp_val.is_empty() {
                continue;
            }
            let Some(severity) = Severity::parse(&risk_val) else {
                warn!(sheet = %sheet.name, risk = %risk_val, "unrecognised severity, skipping row");
                continue;
            };

            let rule_id = format!("{}_{}", source.as_str(), rules.len() + 1);
            let trigger = if sub_val.is_empty() {
                current_clause.clone()
            } else {
                sub_val
            };
            match Rule::new(
                rule_id,
                source,
                current_clause.clone(),
                trigger,
                severity,
                resp_val,
            ) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(sheet = %sheet.name, error = %e, "discarding rule"),
            }
        }
    }

    let legal = rules.iter().filter(|r| r.source == RuleSource::Legal).count();
    info!(
        total = rules.len(),
        legal,
        infosec = rules.len() - legal,
        "loaded rulebook"
    );
    rules
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
