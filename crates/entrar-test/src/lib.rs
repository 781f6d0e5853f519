//! Test utilities for the entrar SDK crates.

mod api;

pub use api::start_api_mock;
