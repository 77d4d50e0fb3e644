// SPDX-License-Identifier: Apache-2.0

//! Command handlers for RideSync CLI.

pub mod auth;
pub mod order;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ridesync_core::{AppConfig, CredentialStore, KeyringCredentialStore, OrderId, RideClient};

use crate::cli::{AuthCommand, Commands, OrderCommand, OutputContext};
use crate::output;

/// Creates a styled spinner (only if interactive).
fn maybe_spinner(ctx: &OutputContext, message: &str) -> Option<ProgressBar> {
    if ctx.show_progress() {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        s.set_message(message.to_string());
        s.enable_steady_tick(Duration::from_millis(100));
        Some(s)
    } else {
        None
    }
}

/// Credentials live in the system keyring under the `ridesync` service.
fn credential_store() -> Arc<dyn CredentialStore> {
    Arc::new(KeyringCredentialStore::default())
}

fn client(config: &AppConfig) -> Result<Arc<RideClient>> {
    Ok(Arc::new(RideClient::from_config(config, credential_store())?))
}

/// Dispatch to the appropriate command handler.
pub async fn run(command: Commands, ctx: OutputContext, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Auth(auth_cmd) => {
            let store = credential_store();
            match auth_cmd {
                AuthCommand::Status => output::render(&auth::run_status(store.as_ref()), &ctx),
                AuthCommand::SetToken => {
                    let result = auth::run_set_token(store.as_ref())?;
                    output::render(&result, &ctx)
                }
                AuthCommand::Logout => {
                    let result = auth::run_logout(store.as_ref())?;
                    output::render(&result, &ctx)
                }
            }
        }

        Commands::Order(order_cmd) => {
            let client = client(config)?;
            match order_cmd {
                OrderCommand::Show { id } => {
                    let spinner = maybe_spinner(&ctx, "Fetching order...");
                    let result = order::run_show(client, OrderId::new(id)).await;
                    if let Some(s) = spinner {
                        s.finish_and_clear();
                    }
                    output::render(&result?, &ctx)
                }
                OrderCommand::Track { id, max_updates } => {
                    order::run_track(client, config, OrderId::new(id), max_updates, &ctx).await
                }
                OrderCommand::Cancel { id, yes } => {
                    let result = order::run_cancel(client, config, OrderId::new(id), yes, &ctx).await?;
                    output::render(&result, &ctx)
                }
            }
        }
    }
}
