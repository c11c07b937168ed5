//! # Gemstore Core
//!
//! Runtime-agnostic domain logic for the gem and jewelry catalog service:
//! document model, query building, the store abstraction, category index
//! maintenance, validation, and the entity repositories.
//!
//! This crate contains no HTTP, sqlx, or filesystem code. Persistence is
//! reached only through [`store::DocumentStore`]; the in-memory
//! implementation in [`store::memory`] backs unit tests and the `memory`
//! backend of the application.
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Documents, writes with server timestamps, value ordering |
//! | [`query`] | Filters, ordering, pagination, per-entity list policies |
//! | [`store`] | `DocumentStore` trait and in-memory implementation |
//! | [`index`] | `gemTypes` / `jewelryTypes` category index maintenance |
//! | [`validate`] | Payload validation per entity |
//! | [`upload`] | Upload kinds and public paths |
//! | [`repo`] | Entity repositories built on the store |

pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod repo;
pub mod store;
pub mod upload;
pub mod validate;

pub use error::{Error, FieldErrors, Result};
