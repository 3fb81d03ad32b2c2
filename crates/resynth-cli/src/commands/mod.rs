//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod info;
pub mod render;
pub mod run;
