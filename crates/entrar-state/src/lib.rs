#![doc = include_str!("../README.md")]

/// This module provides a generic repository interface for storing and retrieving items.
pub mod repository;

/// In-memory repository backend, used for session-scoped state and in tests.
pub mod memory;

pub use memory::MemoryRepository;
pub use repository::{Repository, RepositoryError, RepositoryItem};
