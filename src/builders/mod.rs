//! Fact builders: the transformation units that turn loaded sources into
//! derived fact tables.
//!
//! Every builder implements [`FactBuilder`] and is registered once, at
//! startup, in the [`BuilderRegistry`]. The orchestrator looks builders up
//! by fact name; a fact declared in the dependency map with no registered
//! builder is a configuration-level failure
//! ([`SemModelError::BuilderNotRegistered`]), not a reflection miss.
//!
//! Builders are strict. Each one declares the sources and columns it needs
//! and fails fast - with the missing names listed - rather than producing a
//! partial or silently wrong fact. Builders never mutate their inputs: the
//! same loaded source may feed several builders in one run, so every
//! transformation works on a copy.

pub mod sales_b2b;
pub mod sales_b2c;

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::SemModelError;
use crate::table::{Table, Value};

/// A registered fact-table transformation.
pub trait FactBuilder: Send + Sync {
    /// The fact-table name this builder produces (also its registry key).
    fn name(&self) -> &'static str;

    /// Source names this builder requires in its input map.
    fn required_sources(&self) -> &'static [&'static str];

    /// Produces the fact table from already-loaded sources.
    ///
    /// Must return a fully valid table or an error - never partial output.
    fn build(
        &self,
        data_root: &Path,
        sources: &BTreeMap<String, Table>,
    ) -> Result<Table, SemModelError>;
}

/// Startup-time table of fact name → builder.
pub struct BuilderRegistry {
    builders: BTreeMap<&'static str, Box<dyn FactBuilder>>,
}

impl BuilderRegistry {
    /// Registry with every production builder registered.
    pub fn standard() -> Self {
        let mut registry = Self { builders: BTreeMap::new() };
        registry.register(Box::new(sales_b2b::SalesB2b));
        registry.register(Box::new(sales_b2c::SalesB2c));
        registry
    }

    /// Registers a builder under its own name, replacing any previous one.
    pub fn register(&mut self, builder: Box<dyn FactBuilder>) {
        self.builders.insert(builder.name(), builder);
    }

    /// Looks up the builder for a fact name.
    pub fn get(&self, fact: &str) -> Option<&dyn FactBuilder> {
        self.builders.get(fact).map(Box::as_ref)
    }

    /// Registered fact names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.builders.keys().copied()
    }
}

/// Verifies that every required source is present in the loaded set.
pub(crate) fn require_sources(
    fact: &str,
    sources: &BTreeMap<String, Table>,
    required: &[&str],
) -> Result<(), SemModelError> {
    let missing: Vec<String> =
        required.iter().filter(|s| !sources.contains_key(**s)).map(ToString::to_string).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SemModelError::MissingSource {
            fact: fact.to_string(),
            missing,
            available: sources.keys().cloned().collect(),
        })
    }
}

/// Verifies that a source table carries every required column.
pub(crate) fn require_columns(
    fact: &str,
    source: &str,
    table: &Table,
    required: &[&str],
) -> Result<(), SemModelError> {
    let missing: Vec<String> =
        required.iter().filter(|c| !table.has_column(**c)).map(ToString::to_string).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SemModelError::MissingColumn {
            fact: fact.to_string(),
            source_table: source.to_string(),
            missing,
            available: table.column_names().to_vec(),
        })
    }
}

/// Copy of a table with uppercase column names and uppercase text cells.
///
/// The monthly exports are hand-touched spreadsheets; casing drifts between
/// files, so joins and filters all run on an uppercased copy.
pub(crate) fn standardize_text_case(table: &Table) -> Table {
    let mut out = table.clone();
    out.rename_columns(|c| c.to_uppercase());
    let names = out.column_names().to_vec();
    for r in 0..out.n_rows() {
        for name in &names {
            if let Some(Value::Str(s)) = out.get(r, name) {
                let upper = s.to_uppercase();
                out.set(r, name, Value::Str(upper));
            }
        }
    }
    out
}

/// Rounds to a fixed number of decimal places.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
