//! Adapters that serve the segmentation and classification models from
//! external programs.
//!
//! Every call spawns the configured program with the preprocessed batch and a
//! params document staged in temporary JSON files, then parses the JSON it
//! prints. Calls never share a process, so the adapters are safe to use from
//! concurrent requests.

pub mod error;
pub mod models;
pub mod runner;

pub use error::{BridgeError, Result};
pub use models::*;
pub use runner::ScriptRunner;
