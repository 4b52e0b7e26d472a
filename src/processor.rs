//! Spreadsheet backfill.
//!
//! Every row with diary text but no summary gets analyzed and its summary (F)
//! and themes (E) cells written. Rows filled in by the web form already carry
//! a summary and are left alone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::analyze_entry;
use crate::config::Config;
use crate::entry::{COL_RAW_TEXT, COL_SUMMARY, COL_THEMES, EntryState, cell};
use crate::error::Result;
use crate::gemini::GenerativeModel;
use crate::sheets::Worksheet;

/// Outcome of one pass over the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Data rows looked at (header excluded).
    pub scanned: usize,
    pub analyzed: usize,
    pub failed: usize,
}

pub struct Processor {
    sheet: Arc<dyn Worksheet>,
    model: Arc<dyn GenerativeModel>,
    cell_write_delay: Duration,
    row_delay: Duration,
}

impl Processor {
    pub fn new(sheet: Arc<dyn Worksheet>, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            sheet,
            model,
            cell_write_delay: Duration::ZERO,
            row_delay: Duration::ZERO,
        }
    }

    /// Pauses between the two cell writes of a row and between rows, to stay
    /// under the Sheets write quota.
    pub fn with_delays(mut self, cell_write_delay: Duration, row_delay: Duration) -> Self {
        self.cell_write_delay = cell_write_delay;
        self.row_delay = row_delay;
        self
    }

    pub fn from_config(
        config: &Config,
        sheet: Arc<dyn Worksheet>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self::new(sheet, model).with_delays(config.cell_write_delay(), config.row_delay())
    }

    /// One backfill pass.
    ///
    /// # Errors
    /// * Reading the sheet failed. Failures on individual rows are logged and
    ///   counted in the report instead.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        log::info!("Backfill cycle started");
        let rows = self.sheet.get_all_values().await?;
        let mut report = CycleReport::default();

        if rows.len() <= 1 {
            log::info!("Sheet is empty or has only headers");
            return Ok(report);
        }

        for (i, row) in rows.iter().enumerate().skip(1) {
            report.scanned += 1;
            if EntryState::of(row) != EntryState::PendingAnalysis {
                continue;
            }

            // Sheet rows are 1-based.
            let row_num = i + 1;
            log::info!("Processing row {}", row_num);
            match self.process_row(row_num, cell(row, COL_RAW_TEXT)).await {
                Ok(()) => {
                    report.analyzed += 1;
                    log::info!("Row {} done", row_num);
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!("Row {} failed: {}", row_num, e);
                }
            }
            tokio::time::sleep(self.row_delay).await;
        }

        log::info!(
            "Backfill cycle finished: {} rows, {} analyzed, {} failed",
            report.scanned,
            report.analyzed,
            report.failed
        );
        Ok(report)
    }

    async fn process_row(&self, row_num: usize, raw_text: &str) -> Result<()> {
        let analysis = analyze_entry(self.model.as_ref(), raw_text).await?;
        self.sheet
            .update_cell(row_num, COL_SUMMARY, &analysis.summary)
            .await?;
        tokio::time::sleep(self.cell_write_delay).await;
        self.sheet
            .update_cell(row_num, COL_THEMES, &analysis.themes)
            .await?;
        Ok(())
    }

    /// Run a cycle now and then every `interval` until `shutdown` resolves.
    /// A failed cycle is logged and the loop keeps going. Shutdown also
    /// interrupts a cycle in progress; rows not yet written stay pending.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            // A cycle can take minutes; shutdown abandons it between awaits.
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        log::error!("Backfill cycle failed: {}", e);
                    }
                }
            }
        }
        log::info!("Processor stopping");
    }
}
