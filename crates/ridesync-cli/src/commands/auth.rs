// SPDX-License-Identifier: Apache-2.0

//! Credential management commands.

use std::io::{self, BufRead, IsTerminal};

use anyhow::{Context, Result, bail};
use dialoguer::Password;
use ridesync_core::{AuthCredential, CredentialStore};
use secrecy::SecretString;
use tracing::info;

use crate::commands::types::{AuthChangeResult, AuthStatusResult};

/// Run the status command - report whether a token is stored.
pub fn run_status(store: &dyn CredentialStore) -> AuthStatusResult {
    AuthStatusResult {
        authenticated: store.is_authenticated(),
        phone_number: store.saved_credentials().map(|saved| saved.phone_number),
    }
}

/// Run the set-token command - store a token pair.
pub fn run_set_token(store: &dyn CredentialStore) -> Result<AuthChangeResult> {
    let (access, refresh) = if io::stdin().is_terminal() {
        prompt_tokens()?
    } else {
        read_tokens(io::stdin().lock())?
    };

    store.store_credential(&AuthCredential {
        access_token: access,
        refresh_token: refresh,
    })?;

    info!("Stored credentials in keyring");
    Ok(AuthChangeResult {
        authenticated: true,
        message: "Token stored in keyring.".to_string(),
    })
}

/// Run the logout command - remove stored credentials.
pub fn run_logout(store: &dyn CredentialStore) -> Result<AuthChangeResult> {
    if !store.is_authenticated() {
        return Ok(AuthChangeResult {
            authenticated: false,
            message: "No token stored in keyring.".to_string(),
        });
    }

    store.clear_all()?;

    info!("Removed credentials from keyring");
    Ok(AuthChangeResult {
        authenticated: false,
        message: "Logged out. Tokens removed from keyring.".to_string(),
    })
}

fn prompt_tokens() -> Result<(SecretString, SecretString)> {
    let access = Password::new()
        .with_prompt("Access token")
        .interact()
        .context("Failed to read access token")?;
    let refresh = Password::new()
        .with_prompt("Refresh token")
        .interact()
        .context("Failed to read refresh token")?;
    Ok((SecretString::from(access), SecretString::from(refresh)))
}

/// Reads the access token and the refresh token from the first two lines.
fn read_tokens(input: impl BufRead) -> Result<(SecretString, SecretString)> {
    let mut lines = input.lines();
    let mut next = |name: &str| -> Result<SecretString> {
        let line = lines
            .next()
            .transpose()
            .with_context(|| format!("Failed to read {name}"))?
            .unwrap_or_default();
        let token = line.trim();
        if token.is_empty() {
            bail!("Missing {name} on stdin");
        }
        Ok(SecretString::from(token.to_string()))
    };
    let access = next("access token")?;
    let refresh = next("refresh token")?;
    Ok((access, refresh))
}
