/// SPARQL-backed gazetteer (Getty TGN vocabulary)
///
/// Candidate searches compute rank keys server-side and return every
/// matching entity; selection happens in the ranker. Detail lookups
/// aggregate multilingual labels, place type and scope note for one URI.

use async_trait::async_trait;

use super::{Candidate, CountryMatch, Gazetteer, PlaceDetails, SearchScope};
use crate::errors::KbError;
use crate::sparql::{chain_union, iri, label_filter, Binding, SparqlClient, CANDIDATE_LIMIT};

const PREFIXES: &str = "\
PREFIX skosxl: <http://www.w3.org/2008/05/skos-xl#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX gvp: <http://vocab.getty.edu/ontology#>
PREFIX dcterms: <http://purl.org/dc/terms/>
PREFIX dc: <http://purl.org/dc/elements/1.1/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
";

const ADMINISTRATIVE_DIVISION: &str = "<http://vocab.getty.edu/aat/300236157>";
const INHABITED_PLACE: &str = "<http://vocab.getty.edu/aat/300008347>";
const SOVEREIGN_STATE: &str = "<http://vocab.getty.edu/aat/300232420>";

/// Containment depth for contextual searches
pub const MAX_CONTEXT_HOPS: u8 = 5;

const LANGUAGES: [&str; 4] = ["en", "it", "de", "fr"];

/// Gazetteer reached over the SPARQL protocol.
pub struct SparqlGazetteer {
    client: SparqlClient,
}

impl SparqlGazetteer {
    pub fn new(client: SparqlClient) -> Self {
        SparqlGazetteer { client }
    }
}

/// Label match on preferred or alternative terms of `?place`.
fn label_match(text: &str) -> String {
    format!(
        "?place skosxl:prefLabel|skosxl:altLabel ?label_entity .\n  \
         ?label_entity gvp:term ?term .\n  \
         {}",
        label_filter("term", text)
    )
}

/// 4-level ranking: administrative division, inhabited place,
/// inhabited place via a non-preferred type, anything else.
fn contextual_type_rank() -> String {
    format!(
        "OPTIONAL {{ ?place gvp:placeTypePreferred/gvp:broaderPreferred* {ADMINISTRATIVE_DIVISION} . BIND(1 AS ?admin_rank) }}\n  \
         OPTIONAL {{ ?place gvp:placeTypePreferred/gvp:broaderPreferred* {INHABITED_PLACE} . BIND(2 AS ?inhabited_rank) }}\n  \
         OPTIONAL {{ ?place gvp:placeTypeNonPreferred/gvp:broaderPreferred* {INHABITED_PLACE} . BIND(3 AS ?inhabited_alt_rank) }}\n  \
         BIND(COALESCE(?admin_rank, ?inhabited_rank, ?inhabited_alt_rank, 4) AS ?type_rank_x)"
    )
}

/// 3-level ranking used without a context.
fn global_type_rank() -> String {
    format!(
        "OPTIONAL {{ ?place gvp:placeTypePreferred/gvp:broaderPreferred* {INHABITED_PLACE} . BIND(1 AS ?inhabited_rank) }}\n  \
         OPTIONAL {{ ?place gvp:placeTypeNonPreferred/gvp:broaderPreferred* {INHABITED_PLACE} . BIND(2 AS ?inhabited_alt_rank) }}\n  \
         BIND(COALESCE(?inhabited_rank, ?inhabited_alt_rank, 3) AS ?type_rank_x)"
    )
}

pub(crate) fn search_query(text: &str, scope: SearchScope<'_>) -> Result<String, KbError> {
    let query = match scope {
        SearchScope::Within(context) => {
            let containment = chain_union(
                "?place",
                "gvp:broaderPreferred",
                &iri(context)?,
                MAX_CONTEXT_HOPS,
                "distance_x",
            );
            format!(
                "{PREFIXES}\n\
                 SELECT ?place (SAMPLE(?identifier_x) AS ?identifier) (MIN(?type_rank_x) AS ?type_rank) (MIN(?distance_x) AS ?distance_rank) WHERE {{\n  \
                 {}\n  \
                 {containment}\n  \
                 {}\n  \
                 OPTIONAL {{ ?place dc:identifier ?identifier_x }}\n\
                 }}\n\
                 GROUP BY ?place\n\
                 ORDER BY ASC(MIN(?type_rank_x)) ASC(MIN(?distance_x))\n\
                 LIMIT {CANDIDATE_LIMIT}\n",
                label_match(text),
                contextual_type_rank(),
            )
        }
        SearchScope::Global => format!(
            "{PREFIXES}\n\
             SELECT ?place (SAMPLE(?identifier_x) AS ?identifier) (MIN(?type_rank_x) AS ?type_rank) WHERE {{\n  \
             {}\n  \
             {}\n  \
             OPTIONAL {{ ?place dc:identifier ?identifier_x }}\n\
             }}\n\
             GROUP BY ?place\n\
             ORDER BY ASC(MIN(?type_rank_x))\n\
             LIMIT {CANDIDATE_LIMIT}\n",
            label_match(text),
            global_type_rank(),
        ),
    };
    Ok(query)
}

/// OPTIONAL blocks binding the detail variables of `?place`.
fn detail_patterns() -> String {
    let mut patterns = String::new();
    for lang in LANGUAGES {
        patterns.push_str(&format!(
            "OPTIONAL {{ ?place skosxl:prefLabel ?pref_{lang} . ?pref_{lang} dcterms:language <http://vocab.getty.edu/language/{lang}> . ?pref_{lang} gvp:term ?pref_term_{lang} . }}\n  \
             OPTIONAL {{ ?place skosxl:altLabel ?alt_{lang} . ?alt_{lang} dcterms:language <http://vocab.getty.edu/language/{lang}> . ?alt_{lang} gvp:term ?alt_term_{lang} . }}\n  \
             BIND(COALESCE(?pref_term_{lang}, ?alt_term_{lang}) AS ?label_{lang}_x)\n  "
        ));
    }
    patterns.push_str(
        "OPTIONAL { ?place gvp:placeTypePreferred/gvp:prefLabelGVP/gvp:term ?type_x . }\n  \
         OPTIONAL { ?place skos:scopeNote/rdf:value ?scope_note_x . }\n  \
         OPTIONAL { ?place gvp:prefLabelGVP/gvp:term ?label_x . }\n  \
         OPTIONAL { ?place dc:identifier ?identifier_x . }",
    );
    patterns
}

fn detail_projection() -> String {
    let mut vars = vec!["(SAMPLE(?identifier_x) AS ?identifier)".to_string(), "(SAMPLE(?label_x) AS ?label)".to_string()];
    for lang in LANGUAGES {
        vars.push(format!("(SAMPLE(?label_{lang}_x) AS ?label_{lang})"));
    }
    vars.push("(SAMPLE(?type_x) AS ?type)".to_string());
    vars.push("(SAMPLE(?scope_note_x) AS ?scope_note)".to_string());
    vars.join(" ")
}

pub(crate) fn describe_query(uri: &str, follow_replacement: bool) -> Result<String, KbError> {
    let target = iri(uri)?;
    let anchor = if follow_replacement {
        format!(
            "BIND({target} AS ?requested)\n  \
             OPTIONAL {{ ?requested dcterms:isReplacedBy ?replacement . }}\n  \
             BIND(COALESCE(?replacement, ?requested) AS ?place)"
        )
    } else {
        format!("BIND({target} AS ?place)")
    };
    Ok(format!(
        "{PREFIXES}\n\
         SELECT ?place {} WHERE {{\n  \
         {anchor}\n  \
         {}\n\
         }}\n\
         GROUP BY ?place\n\
         LIMIT 1\n",
        detail_projection(),
        detail_patterns(),
    ))
}

pub(crate) fn countries_query(text: &str) -> String {
    format!(
        "{PREFIXES}\n\
         SELECT ?place (SAMPLE(?term) AS ?matched_term) {} WHERE {{\n  \
         {}\n  \
         ?place gvp:placeTypePreferred/gvp:broaderPreferred* {SOVEREIGN_STATE} .\n  \
         {}\n\
         }}\n\
         GROUP BY ?place\n\
         ORDER BY ?place\n",
        detail_projection(),
        label_match(text),
        detail_patterns(),
    )
}

fn details_from_binding(row: &Binding) -> Option<PlaceDetails> {
    let uri = row.get("place")?;
    Some(PlaceDetails {
        uri: uri.to_string(),
        identifier: row.value("identifier").to_string(),
        label: row.value("label").to_string(),
        label_en: row.value("label_en").to_string(),
        label_it: row.value("label_it").to_string(),
        label_de: row.value("label_de").to_string(),
        label_fr: row.value("label_fr").to_string(),
        place_type: row.value("type").to_string(),
        scope_note: row.value("scope_note").to_string(),
    })
}

fn candidate_from_binding(row: &Binding, contextual: bool) -> Option<Candidate> {
    let uri = row.get("place")?;
    let Some(type_rank) = row.rank("type_rank") else {
        tracing::warn!(place = %uri, "Candidate without a usable type rank, ignoring");
        return None;
    };
    let distance_rank = if contextual {
        let Some(d) = row.rank("distance_rank") else {
            tracing::warn!(place = %uri, "Contextual candidate without a distance rank, ignoring");
            return None;
        };
        Some(d)
    } else {
        None
    };
    Some(Candidate {
        uri: uri.to_string(),
        identifier: row.get("identifier").map(str::to_string),
        type_rank,
        distance_rank,
    })
}

#[async_trait]
impl Gazetteer for SparqlGazetteer {
    async fn search(&self, text: &str, scope: SearchScope<'_>) -> Result<Vec<Candidate>, KbError> {
        let query = search_query(text, scope)?;
        let rows = self.client.select(&query).await?;
        let contextual = matches!(scope, SearchScope::Within(_));
        Ok(rows
            .iter()
            .filter_map(|row| candidate_from_binding(row, contextual))
            .collect())
    }

    async fn describe(&self, uri: &str, follow_replacement: bool) -> Result<Option<PlaceDetails>, KbError> {
        let query = describe_query(uri, follow_replacement)?;
        let rows = self.client.select(&query).await?;
        if rows.len() > 1 {
            tracing::warn!(uri = %uri, rows = rows.len(), "Detail lookup returned several rows, using the first");
        }
        Ok(rows.first().and_then(details_from_binding))
    }

    async fn search_countries(&self, text: &str) -> Result<Vec<CountryMatch>, KbError> {
        let rows = self.client.select(&countries_query(text)).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                details_from_binding(row).map(|details| CountryMatch {
                    matched_label: row.value("matched_term").to_string(),
                    details,
                })
            })
            .collect())
    }
}
