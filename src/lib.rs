//! Javelin - Fast Java dependency manager
//!
//! Resolves declared dependencies into a reproducible lock file and
//! installs verified artifacts from Maven-style repositories.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod install;
pub mod lockfile;
pub mod model;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod ui;

pub use error::{JavelinError, JavelinResult};
