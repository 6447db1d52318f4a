/// SPARQL-backed secondary knowledge base (Wikidata vocabulary)

use async_trait::async_trait;

use super::{LinkedEntity, SecondaryEntity, SecondaryKb, UnlinkedEntity};
use crate::errors::KbError;
use crate::sparql::{chain_union, escape_string, label_filter, Binding, SparqlClient};

const PREFIXES: &str = "\
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX wdt: <http://www.wikidata.org/prop/direct/>
PREFIX schema: <http://schema.org/>
";

/// Gazetteer cross-reference property
const GAZETTEER_ID: &str = "wdt:P1667";
/// Located-in relation
const LOCATED_IN: &str = "wdt:P131";

pub const MAX_LINKED_HOPS: u8 = 3;
pub const MAX_UNLINKED_HOPS: u8 = 4;

const MATCH_LIMIT: usize = 25;

pub struct SparqlSecondaryKb {
    client: SparqlClient,
}

impl SparqlSecondaryKb {
    pub fn new(client: SparqlClient) -> Self {
        SparqlSecondaryKb { client }
    }
}

fn english_description() -> &'static str {
    "OPTIONAL { ?item schema:description ?description_x . FILTER(LANG(?description_x) = \"en\") }"
}

/// Containment of `?item` under the entity cross-referenced to `parent_id`.
fn located_under(parent_id: &str, max_hops: u8) -> String {
    format!(
        "{}\n  ?top {GAZETTEER_ID} \"{}\" .",
        chain_union("?item", LOCATED_IN, "?top", max_hops, "hops_x"),
        escape_string(parent_id)
    )
}

pub(crate) fn cross_reference_query(gazetteer_id: &str) -> String {
    format!(
        "{PREFIXES}\n\
         SELECT ?item (SAMPLE(?label_x) AS ?label) (SAMPLE(?description_x) AS ?description) WHERE {{\n  \
         ?item {GAZETTEER_ID} \"{}\" .\n  \
         OPTIONAL {{ ?item rdfs:label ?label_x . FILTER(LANG(?label_x) = \"en\") }}\n  \
         {}\n\
         }}\n\
         GROUP BY ?item\n\
         ORDER BY ?item\n\
         LIMIT {MATCH_LIMIT}\n",
        escape_string(gazetteer_id),
        english_description(),
    )
}

/// Linked search. Cross-referenced entities sort first so the result limit
/// never drops them in favour of unlinked ones.
pub(crate) fn linked_query(text: &str, parent_id: Option<&str>) -> String {
    let (hops, containment, order) = match parent_id {
        Some(parent) => (
            " (MIN(?hops_x) AS ?hops)",
            located_under(parent, MAX_LINKED_HOPS),
            "ORDER BY DESC(COUNT(?gazetteer_id_x)) ASC(MIN(?hops_x)) ?item",
        ),
        None => ("", String::new(), "ORDER BY DESC(COUNT(?gazetteer_id_x)) ?item"),
    };
    format!(
        "{PREFIXES}\n\
         SELECT ?item (SAMPLE(?gazetteer_id_x) AS ?gazetteer_id) (SAMPLE(?description_x) AS ?description){hops} WHERE {{\n  \
         ?item skos:prefLabel ?label .\n  \
         {}\n  \
         OPTIONAL {{ ?item {GAZETTEER_ID} ?gazetteer_id_x }}\n  \
         {containment}\n  \
         {}\n\
         }}\n\
         GROUP BY ?item\n\
         {order}\n\
         LIMIT {MATCH_LIMIT}\n",
        label_filter("label", text),
        english_description(),
    )
}

pub(crate) fn unlinked_query(text: &str, parent_id: &str) -> String {
    format!(
        "{PREFIXES}\n\
         SELECT ?item (SAMPLE(?label) AS ?matched_label) (SAMPLE(?description_x) AS ?description) (MIN(?hops_x) AS ?hops) WHERE {{\n  \
         ?item skos:prefLabel ?label .\n  \
         {}\n  \
         {}\n  \
         {}\n\
         }}\n\
         GROUP BY ?item\n\
         ORDER BY ASC(MIN(?hops_x)) ?item\n\
         LIMIT {MATCH_LIMIT}\n",
        label_filter("label", text),
        located_under(parent_id, MAX_UNLINKED_HOPS),
        english_description(),
    )
}

fn linked_from_binding(row: &Binding, constrained: bool) -> Option<LinkedEntity> {
    let uri = row.get("item")?;
    let hops = row.rank("hops");
    if constrained && hops.is_none() {
        tracing::warn!(item = %uri, "Located-in match without a hop count, ignoring");
        return None;
    }
    Some(LinkedEntity {
        uri: uri.to_string(),
        gazetteer_id: row.get("gazetteer_id").map(|id| id.trim().to_string()),
        description: row.value("description").to_string(),
        hops,
    })
}

fn unlinked_from_binding(row: &Binding) -> Option<UnlinkedEntity> {
    let uri = row.get("item")?;
    let Some(hops) = row.rank("hops") else {
        tracing::warn!(item = %uri, "Located-in match without a hop count, ignoring");
        return None;
    };
    Some(UnlinkedEntity {
        entity: SecondaryEntity {
            uri: uri.to_string(),
            label: row.value("matched_label").to_string(),
            description: row.value("description").to_string(),
        },
        hops,
    })
}

#[async_trait]
impl SecondaryKb for SparqlSecondaryKb {
    async fn cross_reference(&self, gazetteer_id: &str) -> Result<Option<SecondaryEntity>, KbError> {
        let rows = self.client.select(&cross_reference_query(gazetteer_id)).await?;
        if rows.len() > 1 {
            tracing::warn!(gazetteer_id = %gazetteer_id, rows = rows.len(), "Several entities share a cross-reference, using the first");
        }
        Ok(rows.first().and_then(|row| {
            row.get("item").map(|uri| SecondaryEntity {
                uri: uri.to_string(),
                label: row.value("label").to_string(),
                description: row.value("description").to_string(),
            })
        }))
    }

    async fn find_linked(&self, text: &str, parent_id: Option<&str>) -> Result<Vec<LinkedEntity>, KbError> {
        let rows = self.client.select(&linked_query(text, parent_id)).await?;
        Ok(rows
            .iter()
            .filter_map(|row| linked_from_binding(row, parent_id.is_some()))
            .collect())
    }

    async fn find_unlinked(&self, text: &str, parent_id: &str) -> Result<Vec<UnlinkedEntity>, KbError> {
        let rows = self.client.select(&unlinked_query(text, parent_id)).await?;
        Ok(rows.iter().filter_map(unlinked_from_binding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_linked_query_walks_three_hops_to_parent() {
        let q = linked_query("Fresno", Some("7007000"));
        assert!(q.contains("?top wdt:P1667 \"7007000\" ."));
        assert!(q.contains("BIND(3 AS ?hops_x)"));
        assert!(!q.contains("BIND(4 AS ?hops_x)"));
        assert!(q.contains("OPTIONAL { ?item wdt:P1667 ?gazetteer_id_x }"));
    }

    #[test]
    fn test_global_linked_query_is_unconstrained() {
        let q = linked_query("Fresno", None);
        assert!(!q.contains("wdt:P131"));
        assert!(!q.contains("?hops"));
    }

    #[test]
    fn test_unlinked_query_walks_four_hops() {
        let q = unlinked_query("Fresno", "7007000");
        assert!(q.contains("BIND(4 AS ?hops_x)"));
        assert!(!q.contains("?gazetteer_id"));
    }

    #[test]
    fn test_linked_query_orders_cross_referenced_first() {
        let global = linked_query("Fresno", None);
        assert!(global.contains("ORDER BY DESC(COUNT(?gazetteer_id_x)) ?item"));
        let within = linked_query("Fresno", Some("7007000"));
        assert!(within.contains("ORDER BY DESC(COUNT(?gazetteer_id_x)) ASC(MIN(?hops_x)) ?item"));
    }

    #[test]
    fn test_parent_id_is_escaped() {
        let q = linked_query("x", Some("1\" } DROP"));
        assert!(q.contains("\"1\\\" } DROP\""));
    }

    #[test]
    fn test_linked_parsing() {
        let row = Binding::from_pairs(&[
            ("item", "http://www.wikidata.org/entity/Q43301"),
            ("gazetteer_id", " 2001880 "),
            ("hops", "2"),
        ]);
        let linked = linked_from_binding(&row, true).unwrap();
        assert_eq!(linked.gazetteer_id.as_deref(), Some("2001880"));
        assert_eq!(linked.hops, Some(2));
        assert_eq!(linked.description, "");

        let no_hops = Binding::from_pairs(&[("item", "http://www.wikidata.org/entity/Q1")]);
        assert!(linked_from_binding(&no_hops, true).is_none());
        assert!(linked_from_binding(&no_hops, false).is_some());
    }

    #[tokio::test]
    async fn test_cross_reference_takes_first_entity() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/wikidata").body_includes("P1667");
                then.status(200).body(
                    r#"{"head": {"vars": ["item", "label", "description"]},
                        "results": {"bindings": [
                            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q43301"},
                             "label": {"type": "literal", "xml:lang": "en", "value": "Fresno"},
                             "description": {"type": "literal", "xml:lang": "en", "value": "city in California"}},
                            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q99"}}
                        ]}}"#,
                );
            })
            .await;

        let client = SparqlClient::new(&server.url("/wikidata"), Duration::from_secs(5)).unwrap();
        let kb = SparqlSecondaryKb::new(client);
        let entity = kb.cross_reference("2001880").await.unwrap().unwrap();
        assert_eq!(entity.uri, "http://www.wikidata.org/entity/Q43301");
        assert_eq!(entity.description, "city in California");
    }
}
