//! Report stores: turning uploaded workbooks into SQLite databases and
//! reading them back.
//!
//! - [`ingest`] normalises a workbook's sheets into tables according to an
//!   [`IngestPlan`].
//! - [`introspect`] reads a store's catalog into a [`Schema`](tabletalk_core::schema::Schema).
//! - [`query`] runs a single read-only statement and never fails past its
//!   boundary.
//! - [`Reports`] ties those together per store id with a single-writer,
//!   multi-reader lock.

pub mod error;
pub mod ingest;
pub mod introspect;
pub mod normalize;
pub mod plan;
pub mod query;
mod reports;
pub mod sanitize;

pub use error::{Error, Result};
pub use ingest::{IngestReport, SkipReason, SkippedSheet, Source, TableReport};
pub use plan::{HeaderStrategy, IngestPlan, SheetRule, SheetSelector};
pub use reports::Reports;

#[cfg(test)]
mod tests;
