use std::sync::Arc;

use anyhow::{Context, Result};
use scenewatch_api::SnapshotQuery;
use scenewatch_api_client::ApiClient;
use scenewatch_runtime_config::ClientConfig;
use scenewatch_sync::{SyncOptions, Workspace};
use tracing::debug;

use crate::prompt;

/// Resolved configuration plus the HTTP client every command shares.
pub struct App {
    pub config: ClientConfig,
    pub client: Arc<ApiClient>,
    assume_yes: bool,
}

impl App {
    /// Load `scenewatch.toml` (with env overrides) and apply the `--server` flag.
    pub fn load(server: Option<String>, assume_yes: bool) -> Result<Self> {
        let mut config = scenewatch_runtime_config::load().context("Failed to load config")?;
        if let Some(url) = server {
            config.server.url = url;
        }

        let client = ApiClient::new(&config.server.url, config.server.timeout())
            .with_context(|| format!("Failed to create client for {}", config.server.url))?;
        debug!("using server {}", client.base_url());

        Ok(Self {
            config,
            client: Arc::new(client),
            assume_yes,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            poll_interval: self.config.sync.poll_interval(),
            keyframes: self.config.sync.keyframes,
            snapshot_query: SnapshotQuery {
                limit: self.config.sync.snapshot_limit,
                offset: None,
            },
        }
    }

    pub fn workspace(&self) -> Workspace<ApiClient> {
        self.workspace_with(self.sync_options())
    }

    pub fn workspace_with(&self, options: SyncOptions) -> Workspace<ApiClient> {
        Workspace::new(
            Arc::clone(&self.client),
            prompt::confirmer(self.assume_yes),
            options,
        )
    }
}
