/// Record source and sink: reads the input table and merges results back.
///
/// Rows are kept as raw strings exactly as read; every input data row is
/// written back once in region mode, whether or not it was reconciled.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::errors::ReconError;
use crate::reconcile::MatchResult;

/// Count column, always written last in region mode.
pub const NUMBER_OF_RESULTS: &str = "number_of_results";

/// Columns filled from a `MatchResult`, in output order.
pub const MANAGED_COLUMNS: [&str; 10] = [
    "label",
    "label_en",
    "label_it",
    "label_de",
    "label_fr",
    "type",
    "scope_note",
    "wikidata_description",
    "tgn_uri",
    "wikidata_uri",
];

/// Extra columns appended in country mode, in output order.
pub const COUNTRY_COLUMNS: [&str; 10] = [
    NUMBER_OF_RESULTS,
    "wikidata_label",
    "label_en",
    "label_it",
    "label_de",
    "label_fr",
    "scope_note",
    "wikidata_description",
    "term",
    "wikidata_uri",
];

/// A delimited input file split into its header and data rows.
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl InputTable {
    /// Read a CSV file. The first record is the header; rows may be ragged.
    pub fn read(path: &Path) -> Result<Self, ReconError> {
        let file = File::open(path).map_err(|e| ReconError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => {
                tracing::warn!(path = %path.display(), "Input file is empty");
                return Ok(InputTable::default());
            }
        };
        let mut rows = Vec::new();
        for record in records {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        tracing::info!(path = %path.display(), rows = rows.len(), "Input table loaded");
        Ok(InputTable { header, rows })
    }
}

/// Value of a managed column for `result`.
fn managed_value<'a>(result: &'a MatchResult, column: &str) -> &'a str {
    match column {
        "label" => &result.label,
        "label_en" => &result.label_en,
        "label_it" => &result.label_it,
        "label_de" => &result.label_de,
        "label_fr" => &result.label_fr,
        "type" => &result.place_type,
        "scope_note" => &result.scope_note,
        "wikidata_description" => &result.secondary_description,
        "tgn_uri" => &result.gazetteer_uri,
        "wikidata_uri" => &result.secondary_uri,
        _ => "",
    }
}

/// Output header for region mode.
///
/// The first existing count column is dropped, managed columns missing from
/// the header are appended, and the count column goes last.
pub fn region_header(original: &[String]) -> Vec<String> {
    let mut header: Vec<String> = original.to_vec();
    if let Some(pos) = header.iter().position(|c| c == NUMBER_OF_RESULTS) {
        header.remove(pos);
    }
    for column in MANAGED_COLUMNS {
        if !header.iter().any(|c| c == column) {
            header.push(column.to_string());
        }
    }
    header.push(NUMBER_OF_RESULTS.to_string());
    header
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

/// Write the region-mode output table.
///
/// Original values are copied by column name; where a name repeats, the
/// last position of that name in the output header receives the value.
pub fn write_regions<W: Write>(
    out: W,
    input: &InputTable,
    results: &BTreeMap<usize, MatchResult>,
) -> Result<(), ReconError> {
    let header = region_header(&input.header);
    let positions: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let count_idx = header.len() - 1;

    let mut writer = csv_writer(out);
    writer.write_record(&header)?;

    for (row_idx, row) in input.rows.iter().enumerate() {
        let mut record = vec![String::new(); header.len()];
        for (col_idx, name) in input.header.iter().enumerate() {
            let Some(value) = row.get(col_idx) else {
                break;
            };
            // An incoming count value is overwritten below.
            if let Some(&target) = positions.get(name.as_str()) {
                record[target] = value.clone();
            }
        }

        match results.get(&row_idx) {
            Some(result) => {
                for column in MANAGED_COLUMNS {
                    record[positions[column]] = managed_value(result, column).to_string();
                }
                record[count_idx] = "1".to_string();
            }
            None => record[count_idx] = "0".to_string(),
        }
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .map_err(|e| ReconError::io("<output>", e))?;
    Ok(())
}

/// One country-mode match, flattened to output strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRecord {
    pub wikidata_label: String,
    pub label_en: String,
    pub label_it: String,
    pub label_de: String,
    pub label_fr: String,
    pub scope_note: String,
    pub wikidata_description: String,
    /// URI of the matched gazetteer entity
    pub term: String,
    pub wikidata_uri: String,
}

/// Write the country-mode output table.
///
/// Unmatched rows get a count of 0 and empty fields. A row with several
/// matches is repeated once per match; only the first line carries the count.
pub fn write_countries<W: Write>(
    out: W,
    input: &InputTable,
    matches: &BTreeMap<usize, Vec<CountryRecord>>,
) -> Result<(), ReconError> {
    let mut writer = csv_writer(out);
    let mut header = input.header.clone();
    header.extend(COUNTRY_COLUMNS.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;

    for (row_idx, row) in input.rows.iter().enumerate() {
        let found = matches.get(&row_idx).map(Vec::as_slice).unwrap_or(&[]);
        if found.is_empty() {
            let mut record = row.clone();
            record.push("0".to_string());
            record.extend(std::iter::repeat(String::new()).take(COUNTRY_COLUMNS.len() - 1));
            writer.write_record(&record)?;
            continue;
        }
        for (match_idx, m) in found.iter().enumerate() {
            let count = if match_idx == 0 { found.len().to_string() } else { String::new() };
            let mut record = row.clone();
            record.extend([
                count,
                m.wikidata_label.clone(),
                m.label_en.clone(),
                m.label_it.clone(),
                m.label_de.clone(),
                m.label_fr.clone(),
                m.scope_note.clone(),
                m.wikidata_description.clone(),
                m.term.clone(),
                m.wikidata_uri.clone(),
            ]);
            writer.write_record(&record)?;
        }
    }

    writer
        .flush()
        .map_err(|e| ReconError::io("<output>", e))?;
    Ok(())
}
