//! Rendering and writing the LiteLLM routing configuration.
//!
//! One `model_list` entry per model identifier, each routed to
//! `openrouter/<id>` with the upstream base URL and injected headers. The
//! upstream key is referenced through the process environment rather than
//! written to disk.

use std::path::{Path, PathBuf};

use ccrelay_core::{HeaderSet, vars};
use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;

use super::config::{ProxyConfig, STREAM_TIMEOUT_SECS};
use crate::error::{RelayError, RelayResult};

/// File name of the rendered configuration inside the working directory.
pub const CONFIG_FILE_NAME: &str = "litellm_config.yaml";

/// Environment variable the proxy process reads the upstream key from.
pub const UPSTREAM_KEY_ENV: &str = vars::API_KEY;

#[derive(Serialize)]
struct LiteLlmConfig<'a> {
    model_list: Vec<ModelEntry<'a>>,
    general_settings: GeneralSettings<'a>,
    litellm_settings: LiteLlmSettings,
}

#[derive(Serialize)]
struct ModelEntry<'a> {
    model_name: &'a str,
    litellm_params: ModelParams<'a>,
}

#[derive(Serialize)]
struct ModelParams<'a> {
    model: String,
    api_key: String,
    api_base: &'a str,
    #[serde(skip_serializing_if = "no_headers")]
    extra_headers: &'a HeaderSet,
}

#[derive(Serialize)]
struct GeneralSettings<'a> {
    master_key: &'a str,
}

#[derive(Serialize)]
struct LiteLlmSettings {
    stream_timeout: u64,
    drop_params: bool,
}

fn no_headers(headers: &&HeaderSet) -> bool {
    headers.is_empty()
}

/// Render the configuration as YAML.
///
/// Values go through the YAML serializer, so quotes, colons and `#` in
/// header values come out escaped.
pub fn render_config(config: &ProxyConfig) -> Result<String, serde_yaml_ng::Error> {
    let api_key = format!("os.environ/{UPSTREAM_KEY_ENV}");
    let document = LiteLlmConfig {
        model_list: config
            .models
            .iter()
            .map(|id| ModelEntry {
                model_name: id,
                litellm_params: ModelParams {
                    model: format!("openrouter/{id}"),
                    api_key: api_key.clone(),
                    api_base: &config.base_url,
                    extra_headers: &config.headers,
                },
            })
            .collect(),
        general_settings: GeneralSettings {
            master_key: &config.master_key,
        },
        litellm_settings: LiteLlmSettings {
            stream_timeout: STREAM_TIMEOUT_SECS,
            drop_params: true,
        },
    };
    serde_yaml_ng::to_string(&document)
}

/// A rendered config on disk. Dropping it removes the working directory.
#[derive(Debug)]
pub struct WrittenConfig {
    dir: TempDir,
    path: PathBuf,
}

impl WrittenConfig {
    /// Scoped working directory the proxy runs in.
    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create a scoped working directory under `config.work_root` and write the
/// rendered configuration into it.
pub fn write_config(config: &ProxyConfig) -> RelayResult<WrittenConfig> {
    let dir = tempfile::Builder::new()
        .prefix("ccrelay-")
        .tempdir_in(&config.work_root)
        .map_err(|source| RelayError::ConfigWrite {
            path: config.work_root.clone(),
            source,
        })?;
    let path = dir.path().join(CONFIG_FILE_NAME);

    let rendered = render_config(config).map_err(|e| RelayError::ConfigWrite {
        path: path.clone(),
        source: std::io::Error::other(e),
    })?;
    std::fs::write(&path, rendered).map_err(|source| RelayError::ConfigWrite {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), models = config.models.len(), "Wrote proxy config");
    Ok(WrittenConfig { dir, path })
}
