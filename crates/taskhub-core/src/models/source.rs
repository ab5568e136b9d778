use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialVault, resolve_setting};
use crate::models::CoreError;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Jira,
    GitHub,
    GitLab,
    Linear,
    Email,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Linear => "linear",
            Self::Email => "email",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Jira => "Jira",
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
            Self::Linear => "Linear",
            Self::Email => "Email",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "jira" => Ok(Self::Jira),
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            "linear" => Ok(Self::Linear),
            "email" => Ok(Self::Email),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured connection to a remote service.
///
/// `config` holds adapter settings. Secrets never live here directly; a
/// credential is stored as a `keyring:<key>` reference into the vault.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub source_type: SourceType,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    pub poll_interval_sec: i64,
    pub last_sync_at: Option<SystemTime>,
    pub last_error: Option<String>,
    pub config: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn new(
        source_type: SourceType,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_type,
            name: name.into(),
            base_url: base_url.into(),
            enabled: true,
            poll_interval_sec: 0,
            last_sync_at: None,
            last_error: None,
            config: BTreeMap::new(),
        }
    }

    /// Effective polling interval; non-positive values fall back to the default.
    pub fn poll_interval(&self) -> Duration {
        match u64::try_from(self.poll_interval_sec) {
            Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
            _ => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Looks up `key`, following a `keyring:` reference through `vault`.
    pub fn credential(
        &self,
        key: &str,
        vault: &dyn CredentialVault,
    ) -> Result<Option<String>, CoreError> {
        match self.setting(key) {
            Some(raw) => resolve_setting(vault, raw).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_poll_interval_falls_back_to_default() {
        let mut config = SourceConfig::new(SourceType::Jira, "work", "https://jira.example.com");
        assert_eq!(config.poll_interval(), Duration::from_secs(120));

        config.poll_interval_sec = -5;
        assert_eq!(config.poll_interval(), Duration::from_secs(120));

        config.poll_interval_sec = 30;
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn source_type_round_trips_through_its_string_form() {
        for source_type in [
            SourceType::Jira,
            SourceType::GitHub,
            SourceType::GitLab,
            SourceType::Linear,
            SourceType::Email,
        ] {
            assert_eq!(source_type.as_str().parse::<SourceType>(), Ok(source_type));
        }
        assert!("bugzilla".parse::<SourceType>().is_err());
    }
}
