/// Context resolution: turns input rows into reconciliation items.
///
/// For every row the context name columns are normalised into a `NameKey`
/// and probed against each lookup table in specificity order. All matches
/// are kept, most specific first.

use crate::lookup::LookupTable;
use crate::names::{search_text, NameKey};
use crate::records::InputTable;

/// Column layout of the input table. Indices are 0-based.
#[derive(Debug, Clone)]
pub struct InputColumns {
    pub context_cols: Vec<usize>,
    pub name_col: usize,
    pub strip_qualifier: bool,
}

/// A containing region under which a search is constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextCandidate {
    /// Gazetteer URI of the containing region
    pub id: String,
    /// Number of name parts of the table that produced it
    pub specificity: usize,
    /// Definition file the match came from (diagnostics only)
    pub source: String,
}

/// One unit of work for the driver. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ReconciliationItem {
    /// 0-based data row index in the input table
    pub row: usize,
    pub search_text: String,
    /// Ordered by descending specificity
    pub contexts: Vec<ContextCandidate>,
}

/// Probe every table with the matching-length prefix of `key`.
pub fn resolve_contexts(key: &NameKey, tables: &[LookupTable]) -> Vec<ContextCandidate> {
    tables
        .iter()
        .filter_map(|table| {
            let prefix = key.prefix(table.specificity())?;
            table.get(&prefix).map(|id| ContextCandidate {
                id: id.to_string(),
                specificity: table.specificity(),
                source: table.source().to_string(),
            })
        })
        .collect()
}

/// Build the work list for an input table.
///
/// Rows too short for the configured columns and rows whose search text is
/// empty are skipped (they still flow through to the output unmatched).
pub fn resolve_items(
    input: &InputTable,
    columns: &InputColumns,
    tables: &[LookupTable],
) -> Vec<ReconciliationItem> {
    let max_idx = columns
        .context_cols
        .iter()
        .copied()
        .chain([columns.name_col])
        .max()
        .unwrap_or(0);

    let mut items = Vec::new();
    for (row_idx, row) in input.rows.iter().enumerate() {
        let file_row = row_idx + 2;
        if row.len() <= max_idx {
            tracing::warn!(row = file_row, "Input row too short for name or context columns, skipping");
            continue;
        }

        let raw_name = &row[columns.name_col];
        let Some(text) = search_text(raw_name, columns.strip_qualifier) else {
            tracing::warn!(row = file_row, original = %raw_name.trim(), "Empty search text after processing, skipping");
            continue;
        };

        let raw_parts: Vec<&str> = columns.context_cols.iter().map(|&c| row[c].as_str()).collect();
        let key = NameKey::from_parts(&raw_parts);

        let contexts = if key.is_empty() {
            tracing::warn!(row = file_row, search = %text, "All context name parts are empty, global search only");
            Vec::new()
        } else {
            let found = resolve_contexts(&key, tables);
            if found.is_empty() {
                tracing::info!(row = file_row, search = %text, context = %key, "No context found, global search only");
            }
            found
        };

        items.push(ReconciliationItem {
            row: row_idx,
            search_text: text,
            contexts,
        });
    }
    items
}
