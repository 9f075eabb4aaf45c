//! Local translation proxy: config synthesis, rendering, and supervision.

pub mod backend;
pub mod config;
pub mod litellm;
pub mod render;
pub mod supervisor;

pub use backend::{LaunchSpec, ProxyBackend, ProxyProcess};
pub use config::{
    ANTHROPIC_PATH, MASTER_KEY_PREFIX, ProxyConfig, ProxyOptions, generate_master_key, synthesize,
};
pub use litellm::{ChildProcess, InstallCommand, LiteLlmBackend};
pub use render::{CONFIG_FILE_NAME, WrittenConfig, render_config, write_config};
pub use supervisor::{ProxyHandle, ProxySupervisor, SupervisorState};
