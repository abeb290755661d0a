//! # loadtest-fixtures
//!
//! Identity-scoped CSV fixture generation for load tests against a
//! multi-tenant correspondence/tasks platform.
//!
//! The library backs three binaries:
//! - `provision-users` creates test accounts through the admin identity API
//!   and writes the `users.json` roster document;
//! - `login-users` re-authenticates that roster and emits a flat token CSV;
//! - `generate-fixtures` runs the engine: authenticate the roster, load
//!   per-user access scopes from PostgreSQL, sample reference data from
//!   PostgreSQL and MongoDB, and write one CSV file per fixture definition
//!   under a timestamped output directory.
//!
//! Column semantics are hard-wired to the fixture catalog in [`fixtures`];
//! value resolution strategies live in [`fields`].

pub mod config;
pub mod credentials;
pub mod csvout;
pub mod engine;
pub mod errors;
pub mod fields;
pub mod fixtures;
pub mod identity;
pub mod models;
pub mod pacer;
pub mod provisioning;
pub mod scopes;
pub mod stores;

pub use config::Settings;
pub use engine::Engine;
pub use errors::{AuthError, FatalError, TokenDecodeError};
pub use models::{AccessScope, RunSummary, UserRecord};
