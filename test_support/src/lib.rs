//! Test utilities shared by the integration tests.
//!
//! This crate provides a complete sample project (model, sources, assets and
//! a rule file) that can be written into a temporary directory, plus helpers
//! for probing the system `ninja` binary.

pub mod ninja;
pub mod project;

pub use project::{JSIX_MODEL, load_model, write_project};
