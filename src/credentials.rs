//! API key resolution.
//!
//! The key comes from `--api-key` / `OPENAI_API_KEY` first, then from a
//! TOML secrets file, then from a masked prompt when a terminal is attached.
//! Empty values count as absent.

use crate::error::CredentialError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SecretsFile {
    #[serde(rename = "OpenAI_API_KEY", alias = "OPENAI_API_KEY", default)]
    openai_api_key: Option<String>,
}

/// Resolve the completion API key.
pub fn resolve_api_key(
    explicit: Option<&str>,
    secrets_path: &Path,
) -> Result<String, CredentialError> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        debug!("Using API key from command line or environment");
        return Ok(key.to_string());
    }

    if secrets_path.exists() {
        let content =
            std::fs::read_to_string(secrets_path).map_err(|e| CredentialError::Unreadable {
                path: secrets_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let secrets: SecretsFile =
            toml::from_str(&content).map_err(|e| CredentialError::Unreadable {
                path: secrets_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if let Some(key) = secrets
            .openai_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
        {
            debug!("Using API key from {}", secrets_path.display());
            return Ok(key);
        }
    }

    Err(CredentialError::Missing {
        secrets_path: secrets_path.to_path_buf(),
    })
}

/// Resolve the key, asking on the terminal when nothing else provides one.
pub fn resolve_or_prompt(
    explicit: Option<&str>,
    secrets_path: &Path,
    can_prompt: bool,
) -> Result<String, CredentialError> {
    match resolve_api_key(explicit, secrets_path) {
        Err(CredentialError::Missing { .. }) if can_prompt => prompt_api_key(secrets_path),
        resolved => resolved,
    }
}

/// Read the key from the terminal without echoing it.
fn prompt_api_key(secrets_path: &Path) -> Result<String, CredentialError> {
    let entered = rpassword::prompt_password("🔑 OpenAI API key: ")
        .map_err(|e| CredentialError::Prompt(e.to_string()))?;
    key_from_prompt(&entered, secrets_path)
}

fn key_from_prompt(entered: &str, secrets_path: &Path) -> Result<String, CredentialError> {
    let key = entered.trim();
    if key.is_empty() {
        return Err(CredentialError::Missing {
            secrets_path: secrets_path.to_path_buf(),
        });
    }

    debug!("Using API key entered at the prompt");
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");
        std::fs::write(&secrets, "OpenAI_API_KEY = \"from-file\"").unwrap();

        assert_eq!(
            resolve_api_key(Some("from-cli"), &secrets).unwrap(),
            "from-cli"
        );
    }

    #[test]
    fn test_reads_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");
        std::fs::write(&secrets, "OpenAI_API_KEY = \"sk-file\"\nother = 1\n").unwrap();

        assert_eq!(resolve_api_key(None, &secrets).unwrap(), "sk-file");
        assert_eq!(resolve_api_key(Some("  "), &secrets).unwrap(), "sk-file");
    }

    #[test]
    fn test_accepts_upper_case_key_name() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");
        std::fs::write(&secrets, "OPENAI_API_KEY = \"sk-upper\"").unwrap();

        assert_eq!(resolve_api_key(None, &secrets).unwrap(), "sk-upper");
    }

    #[test]
    fn test_missing_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");

        assert!(matches!(
            resolve_api_key(None, &secrets),
            Err(CredentialError::Missing { .. })
        ));

        std::fs::write(&secrets, "OpenAI_API_KEY = \"\"").unwrap();
        assert!(matches!(
            resolve_api_key(None, &secrets),
            Err(CredentialError::Missing { .. })
        ));
    }

    #[test]
    fn test_empty_prompt_answer_is_missing() {
        let secrets = Path::new(".evinsight/secrets.toml");

        assert!(matches!(
            key_from_prompt("", secrets),
            Err(CredentialError::Missing { .. })
        ));
        assert!(matches!(
            key_from_prompt("  \n", secrets),
            Err(CredentialError::Missing { .. })
        ));
        assert_eq!(key_from_prompt(" sk-typed\n", secrets).unwrap(), "sk-typed");
    }

    #[test]
    fn test_no_prompt_without_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");

        assert!(matches!(
            resolve_or_prompt(None, &secrets, false),
            Err(CredentialError::Missing { .. })
        ));
        assert_eq!(
            resolve_or_prompt(Some("sk-flag"), &secrets, true).unwrap(),
            "sk-flag"
        );
    }

    #[test]
    fn test_malformed_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.toml");
        std::fs::write(&secrets, "OpenAI_API_KEY = ").unwrap();

        assert!(matches!(
            resolve_api_key(None, &secrets),
            Err(CredentialError::Unreadable { .. })
        ));
    }
}
