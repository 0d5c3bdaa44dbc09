use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Stored token envelope written by an out-of-band sign-in flow. Only the
/// access token is consumed here; expiry is surfaced as a warning because a
/// stale token degrades hyperlink resolution instead of failing the run.
#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    access_token: String,
    #[serde(default)]
    expires_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SheetsCredentials {
    pub access_token: String,
}

/// Resolve spreadsheet credentials once, at startup. Checks the
/// `GOOGLE_APPLICATION_CREDENTIALS` environment variable first, then the
/// conventional per-user path. Absence is not an error: hyperlink resolution
/// simply stays unavailable for the run.
pub fn discover() -> Option<SheetsCredentials> {
    let path = credentials_path()?;
    load_from_path(&path)
}

pub fn default_credentials_path() -> PathBuf {
    if let Some(config) = dirs::config_dir() {
        return config.join("resume-intake").join("credentials.json");
    }

    PathBuf::from(".").join("credentials.json")
}

fn credentials_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CREDENTIALS_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Some(path);
        }
        warn!(
            path = %path.display(),
            "{CREDENTIALS_ENV} points at a missing file; hyperlink resolution disabled"
        );
        return None;
    }

    let default_path = default_credentials_path();
    if default_path.exists() {
        return Some(default_path);
    }

    debug!(
        path = %default_path.display(),
        "no credentials found; hyperlink resolution disabled"
    );
    None
}

fn load_from_path(path: &Path) -> Option<SheetsCredentials> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read credentials file");
            return None;
        }
    };

    let envelope = match serde_json::from_str::<TokenEnvelope>(&content) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "invalid credentials file");
            return None;
        }
    };

    if envelope.access_token.trim().is_empty() {
        warn!(path = %path.display(), "credentials file has an empty access token");
        return None;
    }

    if let Some(expires_at) = envelope.expires_at_utc {
        if expires_at <= Utc::now() {
            warn!(%expires_at, "stored access token is expired; hyperlink resolution may fail");
        }
    }

    Some(SheetsCredentials {
        access_token: envelope.access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_token_from_valid_envelope() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, r#"{"access_token": "ya29.token"}"#).unwrap();

        let credentials = load_from_path(&path).unwrap();
        assert_eq!(credentials.access_token, "ya29.token");
    }

    #[test]
    fn malformed_or_empty_envelopes_yield_none() {
        let temp = tempfile::tempdir().unwrap();

        let garbled = temp.path().join("garbled.json");
        std::fs::write(&garbled, "not json").unwrap();
        assert!(load_from_path(&garbled).is_none());

        let empty_token = temp.path().join("empty.json");
        std::fs::write(&empty_token, r#"{"access_token": ""}"#).unwrap();
        assert!(load_from_path(&empty_token).is_none());

        assert!(load_from_path(&temp.path().join("missing.json")).is_none());
    }
}
