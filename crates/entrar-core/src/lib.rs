#![doc = include_str!("../README.md")]

pub mod api;
pub mod client;
mod error;

pub use client::{Client, ClientSettings};
pub use error::{ApiError, MissingFieldError};
