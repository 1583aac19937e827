pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Command};
pub use config::RadarConfig;

pub use app::{build_app, RadarApp};
pub use core::{RadarEngine, SourceStatus};
pub use domain::model::{Query, RadarResponse};
pub use utils::error::{RadarError, Result};
