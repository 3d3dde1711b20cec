//! Integration test suite for semmodel.
//!
//! End-to-end tests that drive the compiled binary against throwaway data
//! roots of CSV sources.
//!
//! # Running
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test organization
//!
//! - **build_flow**: the incremental build lifecycle (first load, no-op
//!   rerun, change propagation, failure modes)
//! - **b2b_model**: the full B2B margin model built through the binary
//! - **status_and_cache**: the read-only status report and cache cleaning

#[path = "../common/mod.rs"]
mod common;

mod b2b_model;
mod build_flow;
mod status_and_cache;
