//! Repository mode.
//!
//! Flushed batches are staged and committed with a message synthesized
//! from the batch itself.

mod message;
mod recorder;
mod repo;

pub use message::{generate_message, SUBJECT_LINE_LIMIT};
pub use recorder::Recorder;
pub use repo::{GitRepo, StatusEntry};
