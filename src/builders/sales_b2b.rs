//! Builder for the `sales_b2b` fact table.
//!
//! Consumes the consolidated B2B invoice export (`O_NFCI`) plus seven
//! static lookup tables, and produces the margin-annotated sales fact:
//! filtered to authorized invoices, repriced for product consignments,
//! joined against product / client-group / representative / freight /
//! rebate lookups, and extended with the cost and margin columns the
//! monthly reports are built on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::core::SemModelError;
use crate::table::{Table, Value};

use super::{FactBuilder, require_columns, require_sources, round_to, standardize_text_case};

/// Default unit cost when no purchase entry predates the sale.
/// Deliberately absurd so missing costs stand out in margin reports.
const DEFAULT_UNIT_COST: f64 = 999.0;

/// Combined IPI/COFINS-style tax factor applied to gross merchandise value.
const TAX_FACTOR: f64 = 0.0925;

const CONSIGNMENT_OP: &str = "REMESSA DE PRODUTO";

/// `sales_b2b` fact builder.
pub struct SalesB2b;

impl FactBuilder for SalesB2b {
    fn name(&self) -> &'static str {
        "sales_b2b"
    }

    fn required_sources(&self) -> &'static [&'static str] {
        &[
            "O_NFCI",
            "T_Remessas",
            "T_ProdF",
            "T_GruposCli",
            "T_Entradas",
            "T_Reps",
            "T_Fretes",
            "T_Verbas",
        ]
    }

    fn build(
        &self,
        _data_root: &Path,
        sources: &BTreeMap<String, Table>,
    ) -> Result<Table, SemModelError> {
        require_sources(self.name(), sources, self.required_sources())?;

        let mut df = standardize_text_case(&sources["O_NFCI"]);
        if df.is_empty() {
            return Err(SemModelError::EmptySource {
                fact: self.name().to_string(),
                source_table: "O_NFCI".to_string(),
            });
        }
        require_columns(self.name(), "O_NFCI", &df, &["QT", "PMERC_T", "PNF_T"])?;

        let lookups: BTreeMap<&str, Table> = self
            .required_sources()
            .iter()
            .skip(1)
            .map(|name| (*name, standardize_text_case(&sources[*name])))
            .collect();

        filter_authorized(&mut df);
        reprice_consignments(&mut df);

        join_remessa_flag(&mut df, &lookups["T_Remessas"]);
        join_parent_product(&mut df, &lookups["T_ProdF"]);
        join_client_group(&mut df, &lookups["T_GruposCli"]);
        join_last_cost(self.name(), &mut df, &lookups["T_Entradas"])?;
        join_commission(&mut df, &lookups["T_Reps"]);
        join_freight(&mut df, &lookups["T_Fretes"]);
        join_rebate(&mut df, &lookups["T_Verbas"]);

        derive_margin_columns(&mut df);
        apply_rounding(&mut df);

        debug!("sales_b2b built: {} rows, {} cols", df.n_rows(), df.n_cols());
        Ok(df)
    }
}

/// Keeps only authorized invoice lines.
fn filter_authorized(df: &mut Table) {
    if df.has_column("SITUAÇÃO") {
        let before = df.n_rows();
        df.retain_rows(|t, i| {
            t.get(i, "SITUAÇÃO").and_then(Value::as_str) == Some("AUTORIZADO")
        });
        debug!("filtered canceled invoices: {before} -> {} rows", df.n_rows());
    } else {
        warn!("column 'SITUAÇÃO' not found in O_NFCI, skipping authorization filter");
    }
}

/// Consignment shipments carry no commercial price; they are repriced at a
/// symbolic unit value so downstream totals stay well-defined.
fn reprice_consignments(df: &mut Table) {
    if !df.has_column("OP") {
        return;
    }
    let mut count = 0usize;
    for r in 0..df.n_rows() {
        if df.get(r, "OP").and_then(Value::as_str) != Some(CONSIGNMENT_OP) {
            continue;
        }
        let qt = df.get(r, "QT").and_then(Value::as_f64).unwrap_or(0.0);
        if df.has_column("PMERC_U") {
            df.set(r, "PMERC_U", Value::Float(0.01));
        }
        df.set(r, "PMERC_T", Value::Float(0.01 * qt));
        df.set(r, "PNF_T", Value::Float(0.01 * qt));
        count += 1;
    }
    if count > 0 {
        debug!("repriced {count} consignment row(s)");
    }
}

fn text_key(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

/// REM_NF: 1 when the client appears in the consignment-client table.
fn join_remessa_flag(df: &mut Table, remessas: &Table) {
    if df.has_column("NOMEF") && remessas.has_column("NOMEF") {
        let names: HashSet<String> = (0..remessas.n_rows())
            .filter_map(|r| text_key(remessas.get(r, "NOMEF")))
            .collect();
        df.add_column("REM_NF", |t, i| {
            let hit = text_key(t.get(i, "NOMEF")).is_some_and(|n| names.contains(&n));
            Value::Int(i64::from(hit))
        });
    } else {
        df.add_column("REM_NF", |_, _| Value::Int(0));
    }
}

/// First-match lookup map from a two-column table.
fn lookup_map(table: &Table, key_col: &str, value_col: &str) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    for r in 0..table.n_rows() {
        if let Some(key) = text_key(table.get(r, key_col)) {
            let value = table.get(r, value_col).cloned().unwrap_or(Value::Null);
            map.entry(key).or_insert(value);
        }
    }
    map
}

/// CODPP: parent product code from the product table, `"xxx"` when unknown.
fn join_parent_product(df: &mut Table, prodf: &Table) {
    if df.has_column("CODPF") && prodf.has_column("CODPF") && prodf.has_column("CODPP") {
        let map = lookup_map(prodf, "CODPF", "CODPP");
        df.add_column("CODPP", |t, i| {
            text_key(t.get(i, "CODPF"))
                .and_then(|k| map.get(&k).cloned())
                .filter(|v| !v.is_null())
                .unwrap_or(Value::Str("xxx".to_string()))
        });
    } else {
        df.add_column("CODPP", |_, _| Value::Str("xxx".to_string()));
    }
}

/// G1: client group, `"V"` (varejo) when the client is unmapped.
fn join_client_group(df: &mut Table, grupos: &Table) {
    if df.has_column("NOMEF") && grupos.has_column("NOMEF") && grupos.has_column("G1") {
        let map = lookup_map(grupos, "NOMEF", "G1");
        df.add_column("G1", |t, i| {
            text_key(t.get(i, "NOMEF"))
                .and_then(|k| map.get(&k).cloned())
                .filter(|v| !v.is_null())
                .unwrap_or(Value::Str("V".to_string()))
        });
    } else {
        df.add_column("G1", |_, _| Value::Str("V".to_string()));
    }
}

/// ECU: last recorded unit cost at or before the sale date.
///
/// The purchase-entry table is keyed by parent product (`PAI`) with the
/// entry date in `ULTIMA ENTRADA` and the unit cost in `ULT CU R$`. For
/// each sale the most recent entry not after the sale date wins; no match
/// (or an unparseable sale date) falls back to [`DEFAULT_UNIT_COST`].
fn join_last_cost(fact: &str, df: &mut Table, entradas: &Table) -> Result<(), SemModelError> {
    if !(df.has_column("CODPP") && df.has_column("DATA")) {
        df.add_column("ECU", |_, _| Value::Float(DEFAULT_UNIT_COST));
        return Ok(());
    }
    require_columns(fact, "T_Entradas", entradas, &["PAI", "ULTIMA ENTRADA", "ULT CU R$"])?;

    // product -> entries sorted most-recent-first
    let mut costs: HashMap<String, Vec<(NaiveDateTime, f64)>> = HashMap::new();
    for r in 0..entradas.n_rows() {
        let Some(product) = text_key(entradas.get(r, "PAI")) else { continue };
        let Some(date) = entradas.get(r, "ULTIMA ENTRADA").and_then(Value::to_datetime) else {
            continue;
        };
        let Some(cost) = entradas.get(r, "ULT CU R$").and_then(Value::as_f64) else { continue };
        costs.entry(product).or_default().push((date, cost));
    }
    for entries in costs.values_mut() {
        entries.sort_by(|a, b| b.0.cmp(&a.0));
    }

    df.add_column("ECU", |t, i| {
        let Some(sale_date) = t.get(i, "DATA").and_then(Value::to_datetime) else {
            return Value::Float(DEFAULT_UNIT_COST);
        };
        let cost = text_key(t.get(i, "CODPP"))
            .and_then(|product| {
                costs.get(&product)?.iter().find(|(date, _)| *date <= sale_date).map(|(_, c)| *c)
            })
            .unwrap_or(DEFAULT_UNIT_COST);
        Value::Float(cost)
    });
    Ok(())
}

fn join_pct_column(
    df: &mut Table,
    lookup: &Table,
    df_key: &str,
    lookup_key: &str,
    pct_col: &str,
) {
    if df.has_column(df_key) && lookup.has_column(lookup_key) && lookup.has_column(pct_col) {
        let map = lookup_map(lookup, lookup_key, pct_col);
        df.add_column(pct_col, |t, i| {
            let pct = text_key(t.get(i, df_key))
                .and_then(|k| map.get(&k).and_then(Value::as_f64))
                .unwrap_or(0.0);
            Value::Float(pct)
        });
    } else {
        df.add_column(pct_col, |_, _| Value::Float(0.0));
    }
}

/// COMISSPCT: representative commission rate.
fn join_commission(df: &mut Table, reps: &Table) {
    join_pct_column(df, reps, "VENDEDOR", "VENDEDOR", "COMISSPCT");
}

/// FRETEPCT: freight rate by destination state, zeroed for groups that
/// ship on their own account (DROP, ALWE).
fn join_freight(df: &mut Table, fretes: &Table) {
    join_pct_column(df, fretes, "UF", "UF", "FRETEPCT");
    for r in 0..df.n_rows() {
        let group = text_key(df.get(r, "G1"));
        if matches!(group.as_deref(), Some("DROP") | Some("ALWE")) {
            df.set(r, "FRETEPCT", Value::Float(0.0));
        }
    }
}

/// VERBAPCT: contractual rebate rate by client.
fn join_rebate(df: &mut Table, verbas: &Table) {
    join_pct_column(df, verbas, "NOMEF", "NOMEF", "VERBAPCT");
}

fn num(t: &Table, i: usize, col: &str) -> f64 {
    t.get(i, col).and_then(Value::as_f64).unwrap_or(0.0)
}

/// The derived cost/margin columns, in dependency order.
fn derive_margin_columns(df: &mut Table) {
    // C: 1 for commercial lines, 0 for lines removed as internal transfers
    df.add_column("C", |t, i| {
        Value::Int(1 - t.get(i, "REM_NF").and_then(Value::as_i64).unwrap_or(0))
    });

    // B: consignment line that stays in the model
    let has_op = df.has_column("OP");
    df.add_column("B", |t, i| {
        let is_consignment =
            has_op && t.get(i, "OP").and_then(Value::as_str) == Some(CONSIGNMENT_OP);
        let kept = t.get(i, "C").and_then(Value::as_i64) == Some(1);
        Value::Int(i64::from(is_consignment && kept))
    });

    df.add_column("ECT", |t, i| Value::Float(num(t, i, "ECU") * num(t, i, "QT")));

    df.add_column("COMISSVLR", |t, i| {
        Value::Float(num(t, i, "COMISSPCT") * num(t, i, "PMERC_T") * num(t, i, "C"))
    });

    // Freight is charged on invoice value but never below a floor derived
    // from replacement cost.
    df.add_column("FRETEVLR", |t, i| {
        let c = num(t, i, "C");
        let pct = num(t, i, "FRETEPCT");
        let on_invoice = pct * num(t, i, "PNF_T") * c;
        let on_cost = pct * num(t, i, "ECT") * c * 2.0;
        Value::Float(on_invoice.max(on_cost))
    });

    df.add_column("VERBAVLR", |t, i| {
        Value::Float(num(t, i, "VERBAPCT") * num(t, i, "PNF_T") * num(t, i, "C"))
    });

    df.add_column("MARGVLR", |t, i| {
        let c = num(t, i, "C");
        let net_revenue = num(t, i, "PMERC_T") * (1.0 - TAX_FACTOR) - num(t, i, "ICMS_T");
        Value::Float(
            c * net_revenue
                - num(t, i, "VERBAVLR")
                - num(t, i, "FRETEVLR")
                - num(t, i, "COMISSVLR")
                - num(t, i, "ECT"),
        )
    });

    df.add_column("MARGPCT", |t, i| {
        let total = num(t, i, "PMERC_T");
        if total == 0.0 {
            Value::Float(0.0)
        } else {
            Value::Float(num(t, i, "MARGVLR") / total)
        }
    });
}

/// Two decimal places for money columns, three for the margin ratio.
fn apply_rounding(df: &mut Table) {
    let names = df.column_names().to_vec();
    for name in names {
        let decimals = if name == "MARGPCT" { 3 } else { 2 };
        for r in 0..df.n_rows() {
            if let Some(Value::Float(v)) = df.get(r, &name) {
                let rounded = round_to(*v, decimals);
                df.set(r, &name, Value::Float(rounded));
            }
        }
    }
}
