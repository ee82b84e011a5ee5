//! Bolthole
//!
//! Watches a directory tree, batches raw file system notifications into a
//! small set of clean change events, and either mirrors them into another
//! tree or records them as git commits.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod error;
pub mod git;
pub mod observability;
pub mod sync;
pub mod watcher;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
