//! Error taxonomy.
//!
//! Fatal errors (`LoadError`, `CredentialError`) halt the session before any
//! report is rendered. `RefinementError` and `DelegatedAnalysisError` are
//! recovered by the session and only affect the current question.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn the input file into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read data file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("data file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected structure in data file: {0}")]
    Structure(String),
    #[error("record {index}: field '{field}' is not a valid {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

/// The API key could not be resolved from any source.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no API key found (checked --api-key, OPENAI_API_KEY and {secrets_path})")]
    Missing { secrets_path: PathBuf },
    #[error("failed to read secrets file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("failed to read API key from the terminal: {0}")]
    Prompt(String),
}

/// Transport or protocol failure talking to the completion API.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("cannot connect to completion API at {0}")]
    Connect(String),
    #[error("failed to send request: {0}")]
    Request(String),
    #[error("completion API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
    #[error("completion API returned an empty message")]
    EmptyCompletion,
}

/// The refinement call failed; callers fall back to the raw question.
#[derive(Debug, Error)]
#[error("query refinement failed: {0}")]
pub struct RefinementError(#[from] pub LlmError);

/// The delegated analysis engine failed to answer a question.
#[derive(Debug, Error)]
pub enum DelegatedAnalysisError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("the dataset has no columns usable for analysis")]
    NoUsableColumns,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_message() {
        let err = LoadError::InvalidField {
            index: 3,
            field: "reviewsCount",
            expected: "non-negative whole number",
        };
        assert_eq!(
            err.to_string(),
            "record 3: field 'reviewsCount' is not a valid non-negative whole number"
        );
    }

    #[test]
    fn test_refinement_error_wraps_llm_error() {
        let err: RefinementError = LlmError::Timeout(30).into();
        assert_eq!(
            err.to_string(),
            "query refinement failed: request timed out after 30s"
        );
    }
}
