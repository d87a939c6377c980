//! warehouse-sandbox - a read-only SQL sandbox over a SQLite financial
//! warehouse.
//!
//! Callers hand arbitrary SQL text to a [`query::SqlExecutor`], which rejects
//! anything but a single read-only SELECT, runs the rest on a read-only
//! connection under a time budget and row cap, and audits every attempt.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
pub mod templates;
pub mod tools;
