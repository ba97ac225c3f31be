//! Exam result analytics: links loosely-structured result rows to canonical
//! students, infers per-subject score columns and aggregates exams, classes
//! and students. The `ipc` module wraps it as a line-delimited JSON sidecar.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod index;
pub mod ipc;
pub mod logging;
pub mod normalize;
pub mod record;
pub mod report;
pub mod resolve;
pub mod stats;
pub mod subjects;
