use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Report;
use crate::Result;

/// Reports of a run with counters derived from them.
///
/// Filters return new summaries over a subsequence of the reports; the
/// counters are always recomputed and never taken from input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSummary {
    pub run_id: String,
    pub outputs: Value,
    reports: Vec<Report>,
    successes: usize,
    fails: usize,
    critical_failures: usize,
}

impl ReportSummary {
    pub fn new(run_id: impl Into<String>, outputs: Value, reports: Vec<Report>) -> Self {
        let mut summary = Self {
            run_id: run_id.into(),
            outputs,
            reports,
            ..Default::default()
        };
        for report in &summary.reports {
            match report {
                Report::StepFailure(_) => {
                    summary.fails += 1;
                    summary.critical_failures += 1;
                }
                _ if report.is_success() => summary.successes += 1,
                _ => summary.fails += 1,
            }
        }
        summary
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn fails(&self) -> usize {
        self.fails
    }

    pub fn critical_failures(&self) -> usize {
        self.critical_failures
    }

    /// Process exit status for this summary
    pub fn exit_code(&self) -> i32 {
        if self.fails > 0 { 1 } else { 0 }
    }

    pub fn filter(&self, predicate: impl Fn(&Report) -> bool) -> Self {
        Self::new(
            self.run_id.clone(),
            self.outputs.clone(),
            self.reports.iter().filter(|r| predicate(r)).cloned().collect(),
        )
    }

    /// Validations that asserted `state`
    pub fn by_state(&self, state: &str) -> Self {
        self.filter(|r| r.validation().is_some_and(|v| v.state.eq_ignore_ascii_case(state)))
    }

    /// Reports produced while running against the target named `name`
    pub fn by_target(&self, name: &str) -> Self {
        self.filter(|r| r.target_name().eq_ignore_ascii_case(name))
    }

    /// Validations declared against the locator or URL `target`
    pub fn by_validation_target(&self, target: &str) -> Self {
        self.filter(|r| r.validation().is_some_and(|v| v.target.eq_ignore_ascii_case(target)))
    }

    pub fn by_validation_type(&self, validation_type: &str) -> Self {
        self.filter(|r| {
            r.validation()
                .is_some_and(|v| v.validation_type.eq_ignore_ascii_case(validation_type))
        })
    }

    pub fn by_success(&self) -> Self {
        self.filter(|r| r.is_success())
    }

    /// Failed assertions only; aborted steps are left to `by_critical_failure`
    pub fn by_failure(&self) -> Self {
        self.filter(|r| r.validation().is_some_and(|v| !v.success))
    }

    pub fn by_critical_failure(&self) -> Self {
        self.filter(|r| r.is_critical())
    }

    pub fn to_document(&self) -> ReportDocument {
        ReportDocument {
            report_summary: SummaryBody {
                total_reports: self.total(),
                successes: self.successes,
                failures: self.fails,
                critical_failures: self.critical_failures,
                reports: self.reports.clone(),
            },
            outputs: match &self.outputs {
                Value::Null => Value::Object(Map::new()),
                outputs => outputs.clone(),
            },
            run_id: self.run_id.clone(),
        }
    }

    pub fn from_document(document: ReportDocument) -> Self {
        Self::new(
            document.run_id,
            document.outputs,
            document.report_summary.reports,
        )
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let document = self.to_document();
        Ok(if pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let document: ReportDocument = serde_json::from_str(raw)?;
        Ok(Self::from_document(document))
    }
}

/// Serialized form of a [`ReportSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    #[serde(rename = "reportSummary")]
    report_summary: SummaryBody,
    #[serde(default)]
    outputs: Value,
    #[serde(default)]
    run_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    total_reports: usize,
    #[serde(default)]
    successes: usize,
    #[serde(default)]
    failures: usize,
    #[serde(default)]
    critical_failures: usize,
    #[serde(default)]
    reports: Vec<Report>,
}
