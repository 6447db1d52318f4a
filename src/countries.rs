/// Country mode: label search restricted to sovereign states.
///
/// Unlike region mode every matching entity is kept. Each distinct text is
/// queried once and attached to the first row it appears on.

use std::collections::{BTreeMap, HashSet};

use crate::gazetteer::{gazetteer_id, CountryMatch, Gazetteer};
use crate::records::{CountryRecord, InputTable};
use crate::secondary::SecondaryKb;

/// Distinct non-empty texts of `column` with the first row holding each.
pub fn collect_texts(input: &InputTable, column: usize) -> Vec<(usize, String)> {
    let mut seen = HashSet::new();
    let mut texts = Vec::new();
    for (row_idx, row) in input.rows.iter().enumerate() {
        let Some(raw) = row.get(column) else {
            tracing::warn!(row = row_idx + 2, column = column + 1, "Row too short for the text column, skipping");
            continue;
        };
        if raw.trim().is_empty() || !seen.insert(raw.as_str()) {
            continue;
        }
        texts.push((row_idx, raw.clone()));
    }
    texts
}

async fn to_record(secondary: &dyn SecondaryKb, found: CountryMatch) -> CountryRecord {
    let details = found.details;
    let mut record = CountryRecord {
        label_en: details.label_en,
        label_it: details.label_it,
        label_de: details.label_de,
        label_fr: details.label_fr,
        scope_note: details.scope_note,
        term: details.uri.clone(),
        ..Default::default()
    };

    let id = Some(details.identifier)
        .filter(|id| !id.is_empty())
        .or_else(|| gazetteer_id(&details.uri));
    if let Some(id) = id {
        match secondary.cross_reference(&id).await {
            Ok(Some(entity)) => {
                record.wikidata_label = entity.label;
                record.wikidata_description = entity.description;
                record.wikidata_uri = entity.uri;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(gazetteer_id = %id, error = %e, "Cross-reference lookup failed"),
        }
    }
    record
}

/// Query every distinct text and collect all matches by row.
pub async fn reconcile_countries(
    gazetteer: &dyn Gazetteer,
    secondary: &dyn SecondaryKb,
    input: &InputTable,
    column: usize,
) -> BTreeMap<usize, Vec<CountryRecord>> {
    let texts = collect_texts(input, column);
    let total = texts.len();
    tracing::info!(terms = total, "Starting country queries");

    let mut results = BTreeMap::new();
    for (idx, (row_idx, text)) in texts.into_iter().enumerate() {
        tracing::info!(row = row_idx + 2, search = %text, "Querying term {}/{}", idx + 1, total);
        let matches = match gazetteer.search_countries(text.trim()).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(row = row_idx + 2, search = %text, error = %e, "Country query failed");
                continue;
            }
        };
        if matches.is_empty() {
            tracing::info!(row = row_idx + 2, search = %text, "No match found");
            continue;
        }

        let mut records = Vec::with_capacity(matches.len());
        for found in matches {
            tracing::debug!(
                row = row_idx + 2,
                search = %text,
                uri = %found.details.uri,
                matched_label = %found.matched_label,
                "Sovereign state matched"
            );
            records.push(to_record(secondary, found).await);
        }
        results.insert(row_idx, records);
    }

    tracing::info!(terms = total, matched = results.len(), "Finished country queries");
    results
}
