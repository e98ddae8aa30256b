use std::path::PathBuf;

use crate::Result;
use crate::report::ReportSummary;

/// Filters a report document and exits non-zero when it holds failures
#[derive(Debug, clap::Args)]
pub struct Report {
    /// Report document written by a run, `-` for stdin
    #[clap(value_name = "FILE")]
    file: PathBuf,
    /// Only validations asserting this state
    #[clap(long)]
    state: Option<String>,
    /// Only reports from this target
    #[clap(long)]
    target: Option<String>,
    /// Only validations declared against this locator or URL
    #[clap(long, value_name = "LOCATOR")]
    validation_target: Option<String>,
    /// Only validations of this type
    #[clap(long = "type", value_name = "TYPE")]
    validation_type: Option<String>,
    /// Only passing validations
    #[clap(long, conflicts_with_all = ["failure", "critical"])]
    success: bool,
    /// Only failed validations
    #[clap(long, conflicts_with = "critical")]
    failure: bool,
    /// Only steps that aborted their target
    #[clap(long)]
    critical: bool,
    /// Pretty print the filtered document
    #[clap(long)]
    pretty: bool,
}

impl Report {
    pub async fn run(&self) -> Result<()> {
        let raw = if self.file.as_os_str() == "-" {
            std::io::read_to_string(std::io::stdin())?
        } else {
            std::fs::read_to_string(&self.file)?
        };
        let summary = self.filter(ReportSummary::from_json(&raw)?);
        println!("{}", summary.to_json(self.pretty)?);
        if summary.exit_code() != 0 {
            warn!(
                "{} of {} reports failed ({} critical)",
                summary.fails(),
                summary.total(),
                summary.critical_failures()
            );
            std::process::exit(summary.exit_code());
        }
        Ok(())
    }

    fn filter(&self, mut summary: ReportSummary) -> ReportSummary {
        if let Some(state) = &self.state {
            summary = summary.by_state(state);
        }
        if let Some(target) = &self.target {
            summary = summary.by_target(target);
        }
        if let Some(target) = &self.validation_target {
            summary = summary.by_validation_target(target);
        }
        if let Some(validation_type) = &self.validation_type {
            summary = summary.by_validation_type(validation_type);
        }
        if self.success {
            summary = summary.by_success();
        }
        if self.failure {
            summary = summary.by_failure();
        }
        if self.critical {
            summary = summary.by_critical_failure();
        }
        summary
    }
}
