//! File and remote I/O.
//!
//! - [`staging`] - append-mode staging files written by the export pipeline
//! - [`compression`] - gzip member-per-flush writing and transparent reading
//! - [`jsonl`] - JSON Lines record source
//! - [`remote`] - sinks that receive finished staging files, plus HEC delivery

pub mod compression;
pub mod jsonl;
pub mod remote;
pub mod staging;
