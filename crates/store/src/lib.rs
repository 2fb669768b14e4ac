//! `tribune-store` — storage and cache seams for the forum user layer.
//!
//! The [`Store`] trait is the only way the user and session layers touch
//! persisted data; [`Cache`] is an optional object cache in front of it.
//! This crate ships in-memory implementations for tests and development;
//! real database backends implement the same traits elsewhere.

pub mod cache;
pub mod memory;
pub mod store;
pub mod types;


pub use cache::{CACHE_USERS, Cache, MemoryCache};
pub use memory::MemoryStore;
pub use store::{Store, StoreError};
pub use types::{
    ForumDefaults, StoredCredentials, UserFieldPatch, UserListFilter, VOLATILE_FIELDS,
    VolatileField, VolatileValues,
};
