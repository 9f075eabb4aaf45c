//! Core domain types for ccrelay.
//!
//! Pure value transformation only: header directive parsing, model sets,
//! relay options and the environment abstraction they are read through.
//! Process and network concerns live in `ccrelay-runtime`.

#![deny(unused_crate_dependencies)]

pub mod env;
pub mod headers;
pub mod models;
pub mod options;

pub use env::{EnvChange, EnvSnapshot, Environment, is_truthy};
pub use headers::{HeaderDirective, HeaderSet, JsonStage};
pub use models::{DEFAULT_MODELS, ModelSet, extract_model_flag, parse_model_list};
pub use options::{
    DEFAULT_APP_TITLE, DEFAULT_BASE_URL, DEFAULT_SITE_URL, REFERER_HEADER, RelayOptions,
    TITLE_HEADER, vars,
};
