//! Shared manager lifecycle pieces.
//!
//! A manager is prepared exactly once, during construction: the supplied
//! configuration is iterated, disabled (`None`) terms are skipped silently,
//! each remaining descriptor is resolved and validated, and terms are
//! grouped by group or mode. Construction returns `Result`, so an
//! unprepared manager value cannot exist; changing a term set means
//! rebuilding the manager (individual descriptors can be replaced by name
//! via `set_term_cfg`, which re-validates only that term).

use std::collections::HashMap;

use corral_core::subset::EnvIds;

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Telemetry returned by [`Manager::reset`]: metric name → value.
pub type ResetMetrics = HashMap<String, f32>;

/// Common lifecycle of every term manager.
pub trait Manager {
    /// Number of active terms across all groups/modes.
    fn num_terms(&self) -> usize;

    /// Reset per-term state for the selected environments, returning
    /// telemetry (may be empty if the manager kind defines no resettable
    /// metrics).
    fn reset(&mut self, env_ids: &EnvIds) -> ResetMetrics;
}

// ---------------------------------------------------------------------------
// TermTable
// ---------------------------------------------------------------------------

/// Hand-formatted ASCII table for the managers' diagnostic summaries.
pub(crate) struct TermTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TermTable {
    pub(crate) fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn row(&mut self, cells: Vec<String>) {
        debug_assert_eq!(cells.len(), self.headers.len());
        self.rows.push(cells);
    }

    pub(crate) fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        // Interior width of the box: per-column width plus padding and
        // separators, minus the outer borders.
        let mut interior: usize = widths.iter().map(|w| w + 3).sum::<usize>() - 1;
        if self.title.len() > interior {
            let extra = self.title.len() - interior;
            if let Some(last) = widths.last_mut() {
                *last += extra;
            }
            interior += extra;
        }

        let separator = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line
        };
        let title_border = format!("+{}+", "-".repeat(interior));

        let mut out = String::new();
        out.push_str(&title_border);
        out.push('\n');
        let pad = interior - self.title.len();
        let left = pad / 2;
        out.push_str(&format!(
            "|{}{}{}|\n",
            " ".repeat(left),
            self.title,
            " ".repeat(pad - left)
        ));
        out.push_str(&separator);
        out.push('\n');
        out.push_str(&render_row(&self.headers, &widths));
        out.push_str(&separator);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&render_row(row, &widths));
        }
        out.push_str(&separator);
        out.push('\n');
        out
    }
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, &width) in cells.iter().zip(widths) {
        line.push_str(&format!(" {cell:<width$} |"));
    }
    line.push('\n');
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
