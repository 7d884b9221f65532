use std::io::{self, Write};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;

use crate::pipeline::{BatchAbortError, PipelineOutcome, ProgressEvent};
use crate::stats::ProcessingStatistics;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Only progress bar and final summary
    Summary = 1,  // High-level run progress (default)
    Detailed = 2, // Per-entity results and warnings
    Debug = 3,    // Everything, including recovery internals
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// Console logger for one ingestion run. Messages route through the active
/// progress bar so the bar keeps its fixed position.
#[derive(Clone)]
pub struct IngestLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
}

impl IngestLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are never hidden, whatever the verbosity
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", self.get_timestamp(), level, message);

        // An active progress bar owns the bottom line; print above it
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn get_timestamp(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    pub async fn start_progress(&self, total: u64) {
        let pb = ProgressBar::new(total);

        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| {
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );

        pb.set_message("Starting...");

        let mut guard = self.progress_bar.write().await;
        *guard = Some(pb);
    }

    pub async fn progress_event(&self, event: &ProgressEvent) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_position(event.current as u64);
            pb.set_message(format!("{} [{}]", event.current_entity_id, event.stage));
        }
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        let mut guard = self.progress_bar.write().await;
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }

        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", final_message);
        }
    }

    pub fn log_run_start(&self, roster_size: usize, source: &str) {
        self.info(&format!("Loaded {} entities from {}", roster_size, source));
    }

    pub fn log_export_start(&self, format: &str) {
        self.info(&format!("Exporting results in {} format", format));
    }

    pub fn log_export_success(&self, path: &str) {
        self.info(&format!("Export completed: {}", path));
    }

    /// Summary after a completed (possibly interrupted) run.
    pub fn print_final_summary(&self, outcome: &PipelineOutcome, output_file: Option<&str>) {
        self.print_summary_block(&outcome.statistics, output_file);

        let stats = &outcome.statistics;
        if outcome.interrupted {
            println!(
                "⚠️  Ingestion interrupted: {} of {} entities processed.",
                stats.total, stats.planned
            );
        } else if stats.failed == 0 && stats.skipped == 0 {
            println!(
                "✅ Ingestion completed successfully! Built {} records.",
                stats.succeeded + stats.partial_succeeded
            );
        } else if stats.succeeded + stats.partial_succeeded > 0 {
            println!(
                "⚠️  Ingestion completed with issues: {} records built, {} failed, {} skipped.",
                stats.succeeded + stats.partial_succeeded,
                stats.failed,
                stats.skipped
            );
        } else {
            println!("❌ Ingestion produced no records.");
        }
    }

    /// Summary after a failure-rate abort.
    pub fn print_abort_summary(&self, abort: &BatchAbortError) {
        self.print_summary_block(&abort.statistics, None);

        println!("❌ Ingestion aborted: {}", abort);
    }

    fn print_summary_block(&self, stats: &ProcessingStatistics, output_file: Option<&str>) {
        // Clear any progress bar artifacts before the block
        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== INGESTION SUMMARY ===");
        println!("Duration: {:.2}s", stats.duration_ms as f64 / 1000.0);
        print!("{}", stats.report());
        if let Some(path) = output_file {
            println!("Results Exported: {}", path);
        }
        println!("=========================\n");

        for hint in stats.recommendations() {
            println!("💡 {}", hint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(
            VerbosityLevel::from_verbose_count(0),
            VerbosityLevel::Summary
        );
        assert_eq!(
            VerbosityLevel::from_verbose_count(1),
            VerbosityLevel::Detailed
        );
        assert_eq!(VerbosityLevel::from_verbose_count(2), VerbosityLevel::Debug);
        assert_eq!(VerbosityLevel::from_verbose_count(9), VerbosityLevel::Debug);
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(VerbosityLevel::Silent < VerbosityLevel::Summary);
        assert!(VerbosityLevel::Detailed < VerbosityLevel::Debug);
    }

    #[tokio::test]
    async fn test_progress_bar_lifecycle() {
        let logger = IngestLogger::new(VerbosityLevel::Silent);
        logger.start_progress(10).await;
        assert!(logger.progress_bar.read().await.is_some());

        logger.update_progress("halfway").await;
        logger.finish_progress("done").await;
        assert!(logger.progress_bar.read().await.is_none());
    }
}
