//! Credential vault seam.
//!
//! Source configs never carry raw secrets. A credential setting holds a
//! `keyring:<key>` reference and the secret itself lives in whatever
//! [`CredentialVault`] the host application provides (an OS keychain in the
//! desktop client, [`InMemoryVault`] in tests).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{CoreError, CoreErrorKind};

pub const KEYRING_PREFIX: &str = "keyring:";

pub trait CredentialVault: Send + Sync {
    fn get(&self, key: &str) -> Result<String, CoreError>;

    fn set(&self, key: &str, secret: &str) -> Result<(), CoreError>;

    fn delete(&self, key: &str) -> Result<(), CoreError>;
}

#[derive(Default)]
pub struct InMemoryVault {
    secrets: Mutex<HashMap<String, String>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CoreError> {
        self.secrets
            .lock()
            .map_err(|_| CoreError::internal("credential vault mutex poisoned"))
    }
}

impl CredentialVault for InMemoryVault {
    fn get(&self, key: &str) -> Result<String, CoreError> {
        self.lock()?.get(key).cloned().ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Authentication,
                format!("no credential stored under '{key}'"),
            )
        })
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), CoreError> {
        self.lock()?.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

pub fn keyring_reference(key: &str) -> String {
    format!("{KEYRING_PREFIX}{key}")
}

pub fn credential_key(source_id: &str, field: &str) -> String {
    format!("{source_id}/{field}")
}

/// Returns the secret behind a `keyring:` reference, or `raw` unchanged when
/// it is a plain setting.
pub fn resolve_setting(vault: &dyn CredentialVault, raw: &str) -> Result<String, CoreError> {
    match raw.strip_prefix(KEYRING_PREFIX) {
        Some(key) if key.trim().is_empty() => Err(CoreError::invalid_input(
            "keyring reference must name a key",
        )),
        Some(key) => vault.get(key),
        None => Ok(raw.to_string()),
    }
}

/// Stores `secret` for one field of a source and returns the reference to
/// put into `SourceConfig::config` in its place.
pub fn store_credential(
    vault: &dyn CredentialVault,
    source_id: &str,
    field: &str,
    secret: &str,
) -> Result<String, CoreError> {
    let key = credential_key(source_id, field);
    vault.set(&key, secret)?;
    Ok(keyring_reference(&key))
}

/// Deletes every vault entry referenced by a source's settings. Used when a
/// source is removed.
pub fn forget_credentials<'a>(
    vault: &dyn CredentialVault,
    settings: impl IntoIterator<Item = &'a String>,
) -> Result<(), CoreError> {
    for raw in settings {
        if let Some(key) = raw.strip_prefix(KEYRING_PREFIX) {
            vault.delete(key)?;
        }
    }
    Ok(())
}
