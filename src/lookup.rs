/// Lookup tables mapping normalised region names to gazetteer context identifiers.
///
/// Each definition file yields one immutable table. Tables are ordered
/// most-specific-first (longest key) so callers can query them in sequence.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use crate::errors::ReconError;
use crate::names::NameKey;

/// Where to read one lookup table from. Column indices are 0-based.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub path: PathBuf,
    pub name_cols: Vec<usize>,
    pub id_col: usize,
}

#[derive(Debug, Clone)]
pub struct LookupTable {
    entries: HashMap<NameKey, String>,
    specificity: usize,
    source: String,
}

impl LookupTable {
    /// Build a table from in-memory entries. First write wins on duplicate keys.
    pub fn from_entries<I>(source: impl Into<String>, specificity: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (NameKey, String)>,
    {
        let mut map = HashMap::new();
        for (key, id) in entries {
            map.entry(key).or_insert(id);
        }
        LookupTable {
            entries: map,
            specificity,
            source: source.into(),
        }
    }

    pub fn get(&self, key: &NameKey) -> Option<&str> {
        if key.len() != self.specificity {
            return None;
        }
        self.entries.get(key).map(String::as_str)
    }

    /// Number of name parts every key in this table has.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load every table and sort them by specificity, most specific first.
///
/// A missing or unreadable file is fatal. Bad rows are logged and skipped.
pub fn load_tables(specs: &[TableSpec]) -> Result<Vec<LookupTable>, ReconError> {
    let mut tables = specs
        .iter()
        .map(load_table)
        .collect::<Result<Vec<_>, _>>()?;
    sort_by_specificity(&mut tables);
    Ok(tables)
}

/// Stable, so equally specific tables keep their command-line order.
pub fn sort_by_specificity(tables: &mut [LookupTable]) {
    tables.sort_by(|a, b| b.specificity.cmp(&a.specificity));
}

fn load_table(spec: &TableSpec) -> Result<LookupTable, ReconError> {
    let source = spec.path.display().to_string();
    let file = File::open(&spec.path).map_err(|e| ReconError::io(&spec.path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let max_idx = spec.name_cols.iter().copied().chain([spec.id_col]).max().unwrap_or(0);
    let mut entries: HashMap<NameKey, String> = HashMap::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let file_row = i + 2;

        if record.len() <= max_idx {
            tracing::warn!(source = %source, row = file_row, "Definition row too short for name or id columns, skipping");
            continue;
        }

        let raw_parts: Vec<&str> = spec.name_cols.iter().map(|&c| &record[c]).collect();
        let key = NameKey::from_parts(&raw_parts);
        let context_id = record[spec.id_col].trim();

        if key.len() != spec.name_cols.len() || !key.is_complete() || context_id.is_empty() {
            tracing::warn!(source = %source, row = file_row, "Definition row missing a name part or identifier, skipping");
            continue;
        }

        if entries.contains_key(&key) {
            tracing::warn!(
                source = %source,
                row = file_row,
                name = %raw_parts.join(", "),
                "Duplicate region name, keeping first identifier"
            );
            continue;
        }
        entries.insert(key, context_id.to_string());
    }

    if entries.is_empty() {
        tracing::warn!(source = %source, "No region definitions loaded from file");
    } else {
        tracing::info!(source = %source, entries = entries.len(), specificity = spec.name_cols.len(), "Loaded region definitions");
    }

    Ok(LookupTable {
        entries,
        specificity: spec.name_cols.len(),
        source,
    })
}
