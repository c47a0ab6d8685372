//! Core types and the assignment engine for the Kohort experimentation
//! service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the experiment data model, the validator, the targeting evaluator,
//! the bucketing engine, the [`store::ExperimentStore`] abstraction with an
//! in-memory implementation, and the [`assignment::AssignmentService`] that
//! ties them together.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assignment;
pub mod bucketing;
pub mod context;
pub mod error;
pub mod experiment;
pub mod memory;
pub mod store;
pub mod targeting;
pub mod validate;

pub use error::{Error, Result};
