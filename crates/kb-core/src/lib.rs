//! kb-core
//!
//! Shared vocabulary for the knowledge retrieval workspace: the normalized
//! `ResultItem`, backend identities, the error taxonomy, the traits every
//! backend and collaborator implements, and configuration loading.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;
