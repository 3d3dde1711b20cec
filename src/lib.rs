//! semmodel - incremental semantic-model builder
//!
//! Reconciles monthly accounting/inventory exports for a multi-channel
//! retail operation into derived fact tables, without reprocessing
//! multi-megabyte spreadsheets on every run. The core is a small,
//! dependency-aware incremental build system specialized for tabular
//! sources:
//!
//! - sources are declared by name and resolved to spreadsheet files fresh
//!   on every run ([`source`]);
//! - a persisted freshness index of per-file modification times decides,
//!   per source, whether anything changed ([`freshness`]);
//! - unchanged sources are served from Parquet snapshots instead of being
//!   reparsed ([`cache`], [`loader`]);
//! - a dependency graph maps the changed sources to the fact tables that
//!   must be recomputed, in deterministic order ([`graph`]);
//! - registered builders recompute exactly those facts, strictly validating
//!   their inputs ([`builders`]);
//! - every rebuild is appended to an audit log ([`buildlog`]).
//!
//! # Data layout
//!
//! Everything lives under one external data root, resolved from a
//! candidate list at startup:
//!
//! ```text
//! <data_root>/
//!   clean/...                   monthly spreadsheet exports (inputs)
//!   tables/...                  static lookup spreadsheets (inputs)
//!   cache/<source>.parquet      columnar snapshot per named source
//!   facts/<fact>.parquet        derived fact tables
//!   _meta/_last_loaded.json     freshness index
//!   _meta/_build_log.csv        append-only build audit log
//! ```
//!
//! # Module map
//!
//! - [`cli`] - clap command definitions (`build`, `status`, `cache clean`)
//! - [`config`] - JSON declarations: sources, dependencies, root candidates
//! - [`core`] - error taxonomy and CLI error display
//! - [`table`] - loosely-typed table, Parquet round-trip, file parsing
//! - [`source`] - glob/path resolution of named sources
//! - [`freshness`] - persisted mtime records and the changed/unchanged call
//! - [`cache`] - Parquet snapshot store and the run lock
//! - [`loader`] - cache-or-parse smart loading per source
//! - [`graph`] - dependency declarations as a checked digraph
//! - [`builders`] - fact builder trait, registry, and the production builders
//! - [`orchestrator`] - the phase-by-phase run driver
//! - [`buildlog`] - append-only CSV audit trail

pub mod buildlog;
pub mod builders;
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod freshness;
pub mod graph;
pub mod loader;
pub mod orchestrator;
pub mod source;
pub mod table;
pub mod utils;
