//! `apfleet-recon`: per-entity reconciliation engine.
//!
//! Pure engine crate: receives structured records from up to three sources,
//! returns one unified record per entity and writes flat tables.
//! No network or CLI dependencies.

pub mod catalogue;
pub mod error;
pub mod export;
pub mod model;
pub mod reconcile;

pub use catalogue::{ColumnSchema, FieldCatalogue, SourceCatalogue};
pub use error::ReconError;
pub use export::{export_table, table_file_name, write_table, ExportOptions};
pub use model::{Reconciliation, SourceCount, SourceRecords, StructuredRecord, UnifiedRecord};
pub use reconcile::reconcile;
