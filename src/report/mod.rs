//! Records produced while running a spec.
//!
//! Every step yields at most one [`Report`]. Records are immutable once built;
//! [`ReportSummary`] tabulates and filters them.

use serde::{Deserialize, Serialize, Serializer};

mod summary;

pub use summary::{ReportDocument, ReportSummary};

/// Outcome of a validation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    #[serde(rename = "type")]
    pub validation_type: String,
    /// Locator or URL the validation was declared against, unresolved
    pub target: String,
    pub state: String,
    #[serde(alias = "targetBrowser")]
    pub target_name: String,
    #[serde(rename = "passed", alias = "success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
}

impl ValidationReport {
    pub fn new(
        validation_type: impl Into<String>,
        target: impl Into<String>,
        state: impl Into<String>,
        target_name: impl Into<String>,
        success: bool,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            validation_type: validation_type.into(),
            target: target.into(),
            state: state.into(),
            target_name: target_name.into(),
            success,
            msg: msg.into(),
        }
    }
}

/// A step raised instead of completing. The rest of that target's sequence
/// was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailureReport {
    pub action: String,
    #[serde(alias = "targetBrowser")]
    pub target_name: String,
    #[serde(rename = "passed", serialize_with = "always_false", skip_deserializing)]
    passed: (),
    pub step_index: usize,
    pub msg: String,
}

impl StepFailureReport {
    pub fn new(
        action: impl Into<String>,
        target_name: impl Into<String>,
        step_index: usize,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            target_name: target_name.into(),
            passed: (),
            step_index,
            msg: msg.into(),
        }
    }
}

fn always_false<S: Serializer>(_: &(), serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(false)
}

/// A visual parity validation along with the images it touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualParityReport {
    #[serde(flatten)]
    pub validation: ValidationReport,
    pub baseline_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_image_uri: Option<String>,
}

/// Serialized as a single-key object naming the kind of record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::EnumIs)]
pub enum Report {
    #[serde(rename = "validationReport")]
    Validation(ValidationReport),
    #[serde(rename = "stepFailureReport")]
    StepFailure(StepFailureReport),
    #[serde(rename = "visualParityReport")]
    VisualParity(VisualParityReport),
}

impl Report {
    /// The validation part of the record, if it is one
    pub fn validation(&self) -> Option<&ValidationReport> {
        match self {
            Report::Validation(report) => Some(report),
            Report::VisualParity(report) => Some(&report.validation),
            Report::StepFailure(_) => None,
        }
    }

    pub fn target_name(&self) -> &str {
        match self {
            Report::StepFailure(report) => &report.target_name,
            _ => self
                .validation()
                .map(|v| v.target_name.as_str())
                .unwrap_or_default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.validation().is_some_and(|v| v.success)
    }

    pub fn is_critical(&self) -> bool {
        self.is_step_failure()
    }

    pub fn msg(&self) -> &str {
        match self {
            Report::StepFailure(report) => &report.msg,
            _ => self.validation().map(|v| v.msg.as_str()).unwrap_or_default(),
        }
    }
}

impl From<ValidationReport> for Report {
    fn from(report: ValidationReport) -> Self {
        Report::Validation(report)
    }
}

impl From<StepFailureReport> for Report {
    fn from(report: StepFailureReport) -> Self {
        Report::StepFailure(report)
    }
}

impl From<VisualParityReport> for Report {
    fn from(report: VisualParityReport) -> Self {
        Report::VisualParity(report)
    }
}
