use thiserror::Error;

use crate::enums::EnumKind;

/// Domain failures that callers may want to tell apart with `downcast_ref::<Error>()`.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("'{0}' does not exist")]
    InvalidContextExpression(String),
    #[error("unable to create output '{0}': the name conflicts with an existing output")]
    InvalidOutputName(String),
    #[error("'{name}' is not a known {kind} value")]
    EnumValueNotFound { name: String, kind: EnumKind },
    #[error("{0}")]
    FailedStep(String),
    #[error("no driver is bound to the \"{0}\" step")]
    NoDriver(String),
    #[error("expression resolution did not terminate after {limit} substitutions: {text}")]
    ResolutionDidNotTerminate { text: String, limit: usize },
    #[error("invalid test spec: {0}")]
    InvalidSpec(String),
    #[error("no element found for locator \"{0}\"")]
    ElementNotFound(String),
    #[error(
        "exclusion \"{exclusion}\" is not fully contained in the bounding box of \"{target}\""
    )]
    InvalidExclusion { target: String, exclusion: String },
}

pub type Result<T> = eyre::Result<T>;
