//! Builder for the `sales_b2c` fact table.
//!
//! Consumes the marketplace line-item export (`L_LPI`). The B2C channel's
//! margin logic still lives upstream, so this builder validates the input
//! strictly and passes the table through unchanged; the validation is the
//! point - a schema drift in the export must fail the run, not flow into
//! the reports.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::SemModelError;
use crate::table::Table;

use super::{FactBuilder, require_columns, require_sources};

/// Columns the export must carry for downstream reports to work.
const REQUIRED_COLUMNS: &[&str] = &["CODPF", "Qt", "Data", "PMerc_T", "PMerc_U"];

/// `sales_b2c` fact builder.
pub struct SalesB2c;

impl FactBuilder for SalesB2c {
    fn name(&self) -> &'static str {
        "sales_b2c"
    }

    fn required_sources(&self) -> &'static [&'static str] {
        &["L_LPI"]
    }

    fn build(
        &self,
        _data_root: &Path,
        sources: &BTreeMap<String, Table>,
    ) -> Result<Table, SemModelError> {
        require_sources(self.name(), sources, self.required_sources())?;

        let df = sources["L_LPI"].clone();
        if df.is_empty() {
            return Err(SemModelError::EmptySource {
                fact: self.name().to_string(),
                source_table: "L_LPI".to_string(),
            });
        }
        require_columns(self.name(), "L_LPI", &df, REQUIRED_COLUMNS)?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn lpi_table() -> Table {
        let mut t = Table::new(["CODPF", "Qt", "Data", "PMerc_T", "PMerc_U"]);
        t.push_row(vec![
            Value::Str("PF1".into()),
            Value::Int(2),
            Value::Str("2025-11-03".into()),
            Value::Float(50.0),
            Value::Float(25.0),
        ]);
        t
    }

    fn build(sources: &BTreeMap<String, Table>) -> Result<Table, SemModelError> {
        SalesB2c.build(Path::new("/tmp"), sources)
    }

    #[test]
    fn valid_source_passes_through() {
        let sources = BTreeMap::from([("L_LPI".to_string(), lpi_table())]);
        let fact = build(&sources).unwrap();
        assert_eq!(fact.n_rows(), 1);
        assert_eq!(fact.column_names(), lpi_table().column_names());
    }

    #[test]
    fn missing_source_lists_the_name() {
        let sources = BTreeMap::from([("O_NFCI".to_string(), lpi_table())]);
        let err = build(&sources).unwrap_err();
        match err {
            SemModelError::MissingSource { missing, available, .. } => {
                assert_eq!(missing, vec!["L_LPI".to_string()]);
                assert_eq!(available, vec!["O_NFCI".to_string()]);
            }
            other => panic!("expected MissingSource, got {other:?}"),
        }
    }

    #[test]
    fn empty_source_is_rejected() {
        let sources = BTreeMap::from([(
            "L_LPI".to_string(),
            Table::new(["CODPF", "Qt", "Data", "PMerc_T", "PMerc_U"]),
        )]);
        let err = build(&sources).unwrap_err();
        assert!(matches!(err, SemModelError::EmptySource { .. }));
    }

    #[test]
    fn required_columns_are_checked_case_sensitively() {
        // The export uses mixed-case headers; an uppercased file is a
        // different schema and must be rejected, not silently accepted.
        let mut t = Table::new(["CODPF", "QT", "DATA", "PMERC_T", "PMERC_U"]);
        t.push_row(vec![
            Value::Str("PF1".into()),
            Value::Int(1),
            Value::Str("2025-11-03".into()),
            Value::Float(1.0),
            Value::Float(1.0),
        ]);
        let sources = BTreeMap::from([("L_LPI".to_string(), t)]);

        let err = build(&sources).unwrap_err();
        match err {
            SemModelError::MissingColumn { missing, .. } => {
                assert_eq!(
                    missing,
                    vec![
                        "Qt".to_string(),
                        "Data".to_string(),
                        "PMerc_T".to_string(),
                        "PMerc_U".to_string()
                    ]
                );
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }
}
