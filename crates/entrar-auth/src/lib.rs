#![doc = include_str!("../README.md")]

mod auth_client;

pub mod api;
pub mod challenge;
pub mod flow;
pub mod login;
pub mod password_reset;
pub mod registration;
pub mod session;

pub use auth_client::{AuthClient, AuthClientExt};
