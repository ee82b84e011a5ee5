//! Configuration management for Bolthole.
//!
//! Values come from command-line arguments, falling back to `BOLTHOLE_*`
//! environment variables; `main.rs` assembles them into a [`Config`].

mod settings;

pub use settings::{Config, Mode, MAX_DEBOUNCE};
