use comfy_table::{Cell, Table};
use redis_sync::{CopyOutcome, SyncReport};

use crate::output::{GlobalOptions, TableDisplay, new_table, tone_cell};
use crate::theme::Tone;

impl TableDisplay for SyncReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = new_table(options, &["Keys", "Count"]);

        table.add_row(vec![Cell::new("  Scanned"), Cell::new(self.scanned)]);
        let copied_label = if self.dry_run { "Would copy" } else { "Copied" };
        let rows = [
            (Tone::from(CopyOutcome::Copied), copied_label, self.copied),
            (Tone::from(CopyOutcome::Skipped), "Skipped (existing)", self.skipped),
            (Tone::from(CopyOutcome::Vanished), "Vanished", self.vanished),
            (Tone::Failed, "Failed", self.failed_count()),
        ];
        for (tone, label, count) in rows {
            // Zero counts stay uncolored so the eye lands on what happened.
            let label_cell = if count == 0 {
                Cell::new(format!("  {label}"))
            } else {
                tone_cell(options, tone, label)
            };
            table.add_row(vec![label_cell, Cell::new(count)]);
        }
        table.add_row(vec![Cell::new("  Elapsed"), Cell::new(format!("{}ms", self.elapsed_ms))]);

        table
    }

    fn to_compact(&self) -> String {
        format!(
            "scanned={} copied={} skipped={} vanished={} failed={} elapsed_ms={}{}",
            self.scanned,
            self.copied,
            self.skipped,
            self.vanished,
            self.failed_count(),
            self.elapsed_ms,
            if self.dry_run { " dry_run" } else { "" }
        )
    }
}

/// One row per failed key.
pub fn failures_table(report: &SyncReport, options: &GlobalOptions) -> Table {
    let mut table = new_table(options, &["Key", "Reason"]);
    for failure in &report.failed {
        table.add_row(vec![tone_cell(options, Tone::Failed, &failure.key), Cell::new(&failure.reason)]);
    }
    table
}
