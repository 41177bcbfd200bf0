//! Core pipeline logic for rebundle.
//!
//! This crate is independent of the process environment and of git:
//! - Version normalization and compound version construction.
//! - The persisted metadata record and its store.
//! - The update gate deciding whether a run has work to do.
//! - Payload classification and per-variant archive packaging.
//! - The single download of the shared auxiliary library archive.

pub mod archive;
mod auxiliary;
mod error;
mod gate;
mod metadata;
pub mod package;
mod payload;
mod variant;
mod version;

/// Single-shot download of the shared auxiliary library archive.
pub use auxiliary::{AuxiliaryError, download_auxiliary};
/// Packaging error shared by payload scanning, archive merging and jobs.
pub use error::PackageError;
/// Update decision over the four version signals.
pub use gate::{GateDecision, VersionSignals, decide};
/// Persisted record of the last published version and its store.
pub use metadata::{Metadata, MetadataError, MetadataStore};
/// Payload enumeration and per-file classification.
pub use payload::{Payload, PayloadFile};
/// Platform variants, file classification and asset selection.
pub use variant::{FileClass, Variant, VariantParseError, select_asset};
/// Tag normalization and version ordering helpers.
pub use version::{compound_version, is_at_most, resolve_version};
