// SPDX-License-Identifier: Apache-2.0

//! Credential storage.
//!
//! The core persists exactly three things: the access token, the refresh
//! token, and optional saved sign-in details. [`CredentialStore`] abstracts the
//! backend so the same executor runs against the system keyring on a device
//! and an in-memory map in tests.
//!
//! Reads never fail: a missing entry, an unreadable entry, or bytes that do
//! not decode all read as absent.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::RideError;
use crate::types::{AuthCredential, SavedCredentials};

/// Logical names under which credentials are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Bearer token for API calls.
    AccessToken,
    /// Token used to renew the access token.
    RefreshToken,
    /// JSON-encoded [`SavedCredentials`].
    SavedCredentials,
}

impl CredentialKind {
    /// Every kind, in clearing order.
    pub const ALL: [CredentialKind; 3] = [
        CredentialKind::AccessToken,
        CredentialKind::RefreshToken,
        CredentialKind::SavedCredentials,
    ];

    /// Account name used as the storage key.
    #[must_use]
    pub fn account(self) -> &'static str {
        match self {
            CredentialKind::AccessToken => "access_token",
            CredentialKind::RefreshToken => "refresh_token",
            CredentialKind::SavedCredentials => "saved_credentials",
        }
    }
}

/// Persists and retrieves credentials.
///
/// Implementations must make `store` atomic with respect to `get`: a reader
/// sees either the old value, the new value, or nothing, never a partial write.
pub trait CredentialStore: Send + Sync {
    /// Stores `value` under `kind`, replacing any previous value.
    fn store(&self, kind: CredentialKind, value: &SecretString) -> crate::Result<()>;

    /// Returns the value stored under `kind`, or `None`.
    fn get(&self, kind: CredentialKind) -> Option<SecretString>;

    /// Removes the value stored under `kind`. Removing nothing is not an error.
    fn clear(&self, kind: CredentialKind) -> crate::Result<()>;

    /// Removes every stored credential.
    ///
    /// Attempts every kind even if one fails, then reports the first failure.
    fn clear_all(&self) -> crate::Result<()> {
        let mut first_error = None;
        for kind in CredentialKind::ALL {
            if let Err(e) = self.clear(kind) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// A missing access token means "not authenticated". Presence proves nothing
    /// about validity; the service decides that.
    fn is_authenticated(&self) -> bool {
        self.get(CredentialKind::AccessToken).is_some()
    }

    /// Stores both halves of a token pair.
    fn store_credential(&self, credential: &AuthCredential) -> crate::Result<()> {
        self.store(CredentialKind::AccessToken, &credential.access_token)?;
        self.store(CredentialKind::RefreshToken, &credential.refresh_token)
    }

    /// Returns the token pair when both halves are present.
    fn credential(&self) -> Option<AuthCredential> {
        Some(AuthCredential {
            access_token: self.get(CredentialKind::AccessToken)?,
            refresh_token: self.get(CredentialKind::RefreshToken)?,
        })
    }

    /// Stores saved sign-in details as JSON.
    fn store_saved_credentials(&self, saved: &SavedCredentials) -> crate::Result<()> {
        let json = serde_json::to_string(saved).map_err(|e| RideError::Encoding {
            message: e.to_string(),
        })?;
        self.store(CredentialKind::SavedCredentials, &SecretString::from(json))
    }

    /// Returns saved sign-in details; undecodable JSON reads as absent.
    fn saved_credentials(&self) -> Option<SavedCredentials> {
        let raw = self.get(CredentialKind::SavedCredentials)?;
        match serde_json::from_str(raw.expose_secret()) {
            Ok(saved) => Some(saved),
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable saved credentials");
                None
            }
        }
    }
}

/// Mutex-guarded in-memory store for platforms without a secure store, and
/// for tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<CredentialKind, SecretString>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a token pair.
    #[must_use]
    pub fn with_credential(credential: &AuthCredential) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.insert(
                CredentialKind::AccessToken,
                credential.access_token.clone(),
            );
            entries.insert(
                CredentialKind::RefreshToken,
                credential.refresh_token.clone(),
            );
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn store(&self, kind: CredentialKind, value: &SecretString) -> crate::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(kind, value.clone());
        Ok(())
    }

    fn get(&self, kind: CredentialKind) -> Option<SecretString> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&kind)
            .filter(|v| !v.expose_secret().is_empty())
            .cloned()
    }

    fn clear(&self, kind: CredentialKind) -> crate::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&kind);
        Ok(())
    }

    fn store_credential(&self, credential: &AuthCredential) -> crate::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            CredentialKind::AccessToken,
            credential.access_token.clone(),
        );
        entries.insert(
            CredentialKind::RefreshToken,
            credential.refresh_token.clone(),
        );
        Ok(())
    }

    fn clear_all(&self) -> crate::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        info!("Cleared all in-memory credentials");
        Ok(())
    }
}

#[cfg(feature = "keyring")]
pub use keyring_store::KeyringCredentialStore;

#[cfg(feature = "keyring")]
mod keyring_store {
    use std::sync::{Mutex, PoisonError};

    use keyring::Entry;
    use secrecy::{ExposeSecret, SecretString};
    use tracing::{debug, info, instrument};

    use super::{CredentialKind, CredentialStore};

    /// Keyring service name used by default.
    pub const DEFAULT_SERVICE: &str = "ridesync";

    /// Store backed by the operating system keyring.
    ///
    /// Writes are delete-then-write under a process-wide lock so that a
    /// concurrent reader never observes a half-replaced entry.
    #[derive(Debug)]
    pub struct KeyringCredentialStore {
        service: String,
        lock: Mutex<()>,
    }

    impl KeyringCredentialStore {
        /// Creates a store under the given keyring service name.
        #[must_use]
        pub fn new(service: impl Into<String>) -> Self {
            Self {
                service: service.into(),
                lock: Mutex::new(()),
            }
        }

        fn entry(&self, kind: CredentialKind) -> keyring::Result<Entry> {
            Entry::new(&self.service, kind.account())
        }
    }

    impl Default for KeyringCredentialStore {
        fn default() -> Self {
            Self::new(DEFAULT_SERVICE)
        }
    }

    impl CredentialStore for KeyringCredentialStore {
        #[instrument(skip(self, value))]
        fn store(&self, kind: CredentialKind, value: &SecretString) -> crate::Result<()> {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = self.entry(kind)?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(e.into()),
            }
            entry.set_password(value.expose_secret())?;
            info!(account = kind.account(), "Credential stored in system keyring");
            Ok(())
        }

        fn get(&self, kind: CredentialKind) -> Option<SecretString> {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = self.entry(kind).ok()?;
            match entry.get_password() {
                Ok(password) if !password.is_empty() => Some(SecretString::from(password)),
                Ok(_) => None,
                Err(e) => {
                    debug!(account = kind.account(), error = %e, "No usable keyring entry");
                    None
                }
            }
        }

        #[instrument(skip(self))]
        fn clear(&self, kind: CredentialKind) -> crate::Result<()> {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            match self.entry(kind)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }
}
