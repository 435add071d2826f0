use crate::diagnostics::Diagnostic;
use thiserror::Error;

pub type FormatScriptResult<T> = Result<T, FormatScriptError>;

#[derive(Error, Debug)]
pub enum FormatScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Translation failed: {}", summarize(.0))]
    Translation(Vec<Diagnostic>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl FormatScriptError {
    /// Diagnostics carried by a failed translation, empty for other errors
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            FormatScriptError::Translation(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "no tree produced".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}
