//! Account provisioning workflow.
//!
//! Creates test accounts through the admin identity API, then logs each
//! account in with its initial password and rotates it to the configured
//! final password. Every network call goes through the paced queue; per-user
//! failures are recorded in the output document and never abort the batch.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ProvisioningConfig;
use crate::identity::{CreateAccountRequest, IdentityClient};
use crate::models::{CredentialEntry, UsersFile};
use crate::pacer::PacedQueue;

/// One attempted account, success or failure
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub username: String,
    pub account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl AccountOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Provisioner {
    client: IdentityClient,
    config: ProvisioningConfig,
}

impl Provisioner {
    pub fn new(client: IdentityClient, config: ProvisioningConfig) -> Self {
        Self { client, config }
    }

    /// Run the full workflow and assemble the users document
    pub async fn provision(&self, queue: &mut PacedQueue) -> anyhow::Result<UsersFile> {
        let admin_token = self.admin_token().await?;
        let final_password = self.client.config().default_password.clone();

        info!("Creating {} account(s)", self.config.user_count);
        let mut outcomes = Vec::with_capacity(self.config.user_count);
        let mut created = Vec::new();

        for index in 1..=self.config.user_count {
            let username = generate_username(&self.config.username_prefix, index);
            let request = self.account_request(&username);

            let item = queue
                .run(&username, || {
                    self.client.create_account(&admin_token, &request)
                })
                .await;

            let mut outcome = AccountOutcome {
                username: username.clone(),
                account_id: None,
                created_at: Utc::now(),
                error: None,
            };
            match item.outcome {
                Ok(account) => {
                    info!(
                        "Created account {}/{}: {}",
                        index, self.config.user_count, username
                    );
                    outcome.account_id = account.account_id.clone();
                    created.push((outcome.username.clone(), account.initial_password));
                }
                Err(e) => {
                    warn!("Account creation failed for {}: {}", username, e);
                    outcome.error = Some(e);
                }
            }
            outcomes.push(outcome);
        }

        info!("Rotating passwords for {} account(s)", created.len());
        for (username, initial_password) in created {
            let item = queue
                .run(&username, || {
                    self.reset_password(&admin_token, &username, &initial_password, &final_password)
                })
                .await;
            if let Err(e) = item.outcome {
                warn!("Password rotation failed for {}: {}", username, e);
                if let Some(outcome) = outcomes.iter_mut().find(|o| o.username == username) {
                    outcome.error = Some(e);
                }
            }
        }

        Ok(build_users_file(
            &self.client.config().base_url,
            &final_password,
            outcomes,
        ))
    }

    /// First login may require the admin bearer, or reject it; try both
    async fn reset_password(
        &self,
        admin_token: &str,
        username: &str,
        initial_password: &str,
        final_password: &str,
    ) -> anyhow::Result<()> {
        let token = match self
            .client
            .request_token_as(username, initial_password, Some(admin_token))
            .await
        {
            Ok(token) => token,
            Err(_) => self
                .client
                .request_token(username, initial_password)
                .await
                .context("initial login failed on both attempts")?,
        };

        self.client
            .change_password(&token, final_password)
            .await
            .context("password change rejected")?;
        Ok(())
    }

    async fn admin_token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.config.admin_token {
            return Ok(token.clone());
        }
        info!("No admin token provided; logging in as admin");
        self.client
            .request_token(&self.config.admin_username, &self.config.admin_password)
            .await
            .map_err(|e| anyhow!("admin login failed: {}", e))
    }

    fn account_request(&self, username: &str) -> CreateAccountRequest {
        let suffix = rand::thread_rng().gen_range(0..10_000);
        CreateAccountRequest {
            username: username.to_string(),
            first_name: format!("User{}", suffix),
            last_name: format!("Test{}", suffix),
            entity_id: self.config.entity_id,
            title: "SWE".to_string(),
            roles_ids: vec![self.config.role_id.clone()],
            is_super_admin: false,
        }
    }
}

/// `<prefix>-<NN>-<6 random lowercase alphanumerics>`
pub fn generate_username(prefix: &str, index: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{:02}-{}", prefix, index, suffix)
}

/// Assemble the document consumed by the engine and the bulk-login tool
pub fn build_users_file(
    base_url: &str,
    final_password: &str,
    outcomes: Vec<AccountOutcome>,
) -> UsersFile {
    let successful = outcomes.iter().filter(|o| o.is_success()).count();
    UsersFile {
        base_url: base_url.to_string(),
        created_at: Some(Utc::now()),
        total_users: outcomes.len(),
        successful_users: successful,
        users: outcomes
            .into_iter()
            .map(|o| {
                let success = o.is_success();
                CredentialEntry {
                    username: o.username,
                    password: success.then(|| final_password.to_string()),
                    account_id: o.account_id,
                    created_at: Some(o.created_at),
                    success,
                    error: o.error,
                }
            })
            .collect(),
    }
}

/// Persist the users document as pretty-printed JSON
pub fn write_users_file(path: &Path, file: &UsersFile) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(
        "Users document saved to {} ({}/{} successful)",
        path.display(),
        file.successful_users,
        file.total_users
    );
    Ok(())
}
