//! Conservatory core - records, backend access and workflows for running a
//! music conservatory's enrollment office.
//!
//! The crate talks to a hosted PostgREST-style backend through the
//! `Backend` trait (`RestBackend` over HTTP, `InMemoryBackend` for tests
//! and demos), decodes rows into typed records at the repository edge, and
//! builds the office workflows on top:
//!
//! - contract generation from `{{placeholder}}` templates, and signatures
//! - the open-task list and dashboard summary
//! - enrollment, payment recording and payment reminders
//! - email dispatch through a pluggable provider

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod contracts;
pub mod dashboard;
pub mod email;
pub mod enrollment;
pub mod format;
pub mod models;
pub mod notify;
pub mod payments;
pub mod reminders;
pub mod repo;
pub mod saga;
pub mod services;
pub mod tasks;
pub mod template;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendError, InMemoryBackend, RestBackend};
pub use config::Config;
pub use services::Services;
