use clap::Parser;

use crate::config::AppConfig;
use crate::logger::VerbosityLevel;
use crate::record::EntityKind;

#[derive(Parser, Debug)]
#[command(name = "dexharvest")]
#[command(about = "A resilient ingestion pipeline for game catalog entities")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/dexharvest.toml
    #[arg(long)]
    pub init: bool,

    /// Path to a CSV or JSON roster of entities to ingest
    /// CSV: columns named "id" and "kind"
    /// JSON: array of objects with "id" and "kind" fields
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<String>,

    /// Single entity id to ingest (requires --kind)
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Entity kind for --id: 'character', 'weapon', or 'disc'
    #[arg(short, long, value_name = "KIND")]
    pub kind: Option<String>,

    /// Output format: 'json' or 'csv' (defaults to the configured format)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Output path, extension added from the format if missing
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Entities per batch for progress grouping and the abort check
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Pause between consecutive entities in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Maximum retry attempts for failed requests (overrides config)
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Failure rate that aborts the run, 0.0 to 1.0 (overrides config)
    #[arg(long, value_name = "RATE")]
    pub abort_threshold: Option<f64>,

    /// Minimum success rate for a zero exit code, 0.0 to 1.0 (overrides config)
    #[arg(long, value_name = "RATE")]
    pub min_success_rate: Option<f64>,

    /// Comma-separated language priority for text extraction (e.g. 'en,ja')
    #[arg(long, value_name = "LANGS")]
    pub languages: Option<String>,

    /// Fail entities whose records do not validate instead of exporting
    /// them flagged as degraded
    #[arg(long)]
    pub strict: bool,

    /// Verbose logging (use -v for detailed progress, -vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress everything except errors and the final summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Check if running in single-entity mode (--id provided)
    pub fn is_single_mode(&self) -> bool {
        self.id.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        // Roster validation only applies when not using --init
        if !self.init && self.input.is_none() && !self.is_single_mode() {
            return Err(
                "An input roster is required (use --input, or --id with --kind)".to_string(),
            );
        }

        if self.input.is_some() && self.is_single_mode() {
            return Err("--input and --id cannot be combined".to_string());
        }

        if self.is_single_mode() {
            if let Some(id) = &self.id {
                if id.trim().is_empty() {
                    return Err("--id must not be blank".to_string());
                }
            }
            match &self.kind {
                None => return Err("--id requires --kind".to_string()),
                Some(k) if EntityKind::from_label(k).is_none() => {
                    return Err(format!(
                        "Unknown kind '{}': expected 'character', 'weapon', or 'disc'",
                        k
                    ));
                }
                _ => {}
            }
        }

        if let Some(format) = &self.format {
            if !["json", "csv"].contains(&format.as_str()) {
                return Err("Output format must be 'json' or 'csv'".to_string());
            }
        }

        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 {
                return Err("Batch size must be greater than 0".to_string());
            }
        }

        for (flag, value) in [
            ("--abort-threshold", self.abort_threshold),
            ("--min-success-rate", self.min_success_rate),
        ] {
            if let Some(rate) = value {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(format!("{} must be between 0.0 and 1.0", flag));
                }
            }
        }

        if let Some(languages) = &self.languages {
            if languages.split(',').all(|l| l.trim().is_empty()) {
                return Err("Language list cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Overlay command-line options on the loaded configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(batch_size) = self.batch_size {
            config.pipeline.batch_size = batch_size;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.pipeline.inter_item_delay_ms = delay_ms;
        }
        if let Some(max_retries) = self.max_retries {
            config.pipeline.max_retries = max_retries;
        }
        if let Some(rate) = self.abort_threshold {
            config.pipeline.abort_failure_rate = rate;
        }
        if let Some(rate) = self.min_success_rate {
            config.pipeline.min_success_rate = rate;
        }
        if self.strict {
            config.pipeline.include_degraded = false;
        }
        if let Some(languages) = &self.languages {
            config.languages.priority = languages
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(format) = &self.format {
            config.export.format = format.clone();
        }
        if let Some(output) = &self.output {
            config.export.output = output.clone();
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Silent
        } else {
            VerbosityLevel::from_verbose_count(self.verbose)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_validate_requires_roster_source() {
        let cli = parse(&["dexharvest"]);
        assert!(cli.validate().unwrap_err().contains("--input"));

        let cli = parse(&["dexharvest", "--input", "roster.csv"]);
        assert!(cli.validate().is_ok());

        let cli = parse(&["dexharvest", "--id", "ember-wolf", "--kind", "character"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_single_mode_needs_known_kind() {
        let cli = parse(&["dexharvest", "--id", "ember-wolf"]);
        assert!(cli.validate().unwrap_err().contains("--kind"));

        let cli = parse(&["dexharvest", "--id", "ember-wolf", "--kind", "mount"]);
        assert!(cli.validate().unwrap_err().contains("mount"));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let cli = parse(&["dexharvest", "--id", "", "--kind", "character"]);
        assert!(cli.validate().unwrap_err().contains("blank"));

        let cli = parse(&["dexharvest", "--id", "   ", "--kind", "character"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_rates_and_formats() {
        let cli = parse(&[
            "dexharvest",
            "--input",
            "roster.csv",
            "--abort-threshold",
            "1.5",
        ]);
        assert!(cli.validate().is_err());

        let cli = parse(&["dexharvest", "--input", "roster.csv", "--format", "xml"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["dexharvest", "--input", "roster.csv", "--batch-size", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_apply_to_overlays_config() {
        let mut config: AppConfig = toml::from_str(crate::config::DEFAULT_CONFIG).unwrap();
        let cli = parse(&[
            "dexharvest",
            "--input",
            "roster.csv",
            "--batch-size",
            "25",
            "--max-retries",
            "5",
            "--languages",
            "ja, en",
            "--strict",
            "--format",
            "csv",
        ]);

        cli.apply_to(&mut config);

        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.pipeline.max_retries, 5);
        assert_eq!(config.languages.priority, vec!["ja", "en"]);
        assert!(!config.pipeline.include_degraded);
        assert_eq!(config.export.format, "csv");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dexharvest", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(parse(&["dexharvest"]).verbosity(), VerbosityLevel::Summary);
        assert_eq!(
            parse(&["dexharvest", "-v"]).verbosity(),
            VerbosityLevel::Detailed
        );
        assert_eq!(
            parse(&["dexharvest", "-q"]).verbosity(),
            VerbosityLevel::Silent
        );
    }
}
