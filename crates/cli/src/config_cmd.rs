use anyhow::{Context, Result, bail};
use scenewatch_runtime_config::{
    API_BASE_ENV, ClientConfig, apply_compat_fallbacks, apply_env_overrides, config_path,
    load_from, save_to,
};
use std::path::Path;

/// Values passed to `scenewatch config`. Unset fields keep their stored value.
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub server: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub keyframes: Option<usize>,
    /// `Some(0)` clears the page size.
    pub snapshot_limit: Option<u32>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.server.is_none()
            && self.timeout_secs.is_none()
            && self.poll_interval_ms.is_none()
            && self.keyframes.is_none()
            && self.snapshot_limit.is_none()
    }

    fn apply(self, config: &mut ClientConfig) -> Result<()> {
        if let Some(url) = self.server {
            config.server.url = normalize_server_url(&url)?;
        }
        if let Some(secs) = self.timeout_secs {
            config.server.timeout_secs = secs;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.sync.poll_interval_ms = ms;
        }
        if let Some(keyframes) = self.keyframes {
            config.sync.keyframes = keyframes;
        }
        if let Some(limit) = self.snapshot_limit {
            config.sync.snapshot_limit = (limit > 0).then_some(limit);
        }
        Ok(())
    }
}

fn normalize_server_url(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("server url cannot be empty");
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        bail!("server url must start with http:// or https://");
    }
    Ok(trimmed.to_string())
}

fn render_config(path: &Path, config: &ClientConfig, env_override: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Config file: {}\n\n", path.display()));
    out.push_str("[server]\n");
    out.push_str(&format!("  url              = {}", config.server.url));
    if env_override {
        out.push_str(&format!("  (from {API_BASE_ENV})"));
    }
    out.push('\n');
    out.push_str(&format!("  timeout_secs     = {}\n", config.server.timeout_secs));
    out.push('\n');
    out.push_str("[sync]\n");
    out.push_str(&format!(
        "  poll_interval_ms = {}\n",
        config.sync.poll_interval_ms
    ));
    out.push_str(&format!("  keyframes        = {}\n", config.sync.keyframes));
    out.push_str(&format!(
        "  snapshot_limit   = {}\n",
        config
            .sync
            .snapshot_limit
            .map_or_else(|| "(server default)".to_string(), |limit| limit.to_string())
    ));
    out
}

/// Print the effective config.
pub fn show_config() -> Result<()> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    let env_override = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    print!("{}", render_config(&path, &config, env_override));
    Ok(())
}

/// Update the stored config with the provided values.
pub fn set_config(update: ConfigUpdate) -> Result<()> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    update.apply(&mut config)?;
    apply_compat_fallbacks(&mut config);
    save_to(&path, &config)
        .with_context(|| format!("Failed to save config at {}", path.display()))?;

    println!("Configuration updated.");
    show_config()
}
