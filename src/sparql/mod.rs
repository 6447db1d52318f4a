/// SPARQL protocol client and result-set helpers
///
/// Sends SELECT queries as a form-encoded POST and decodes the
/// `application/sparql-results+json` table. Both knowledge bases are
/// reached through this client.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::KbError;

const RESULTS_MEDIA_TYPE: &str = "application/sparql-results+json";

/// Upper bound on candidate rows fetched per label search
pub const CANDIDATE_LIMIT: usize = 50;

/// Response envelope of a SELECT query
#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: SelectResults,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    #[serde(default)]
    bindings: Vec<Binding>,
}

/// A single RDF term in a result row.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RdfTerm {
    /// "uri", "literal", "typed-literal" or "bnode"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

/// One result row. Unbound or null variables read as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Binding(HashMap<String, Option<RdfTerm>>);

impl Binding {
    /// Value of `var`, or "" when unbound.
    pub fn value(&self, var: &str) -> &str {
        self.get(var).unwrap_or("")
    }

    /// Value of `var` when it is bound to a non-empty term.
    pub fn get(&self, var: &str) -> Option<&str> {
        self.0
            .get(var)
            .and_then(|t| t.as_ref())
            .map(|t| t.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Parse a small integer binding such as a rank key.
    pub fn rank(&self, var: &str) -> Option<u8> {
        self.get(var).and_then(|v| v.trim().parse().ok())
    }
}

#[cfg(test)]
impl Binding {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Binding(
            pairs
                .iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        Some(RdfTerm { kind: "literal".to_string(), value: v.to_string() }),
                    )
                })
                .collect(),
        )
    }
}

/// HTTP client for one SPARQL endpoint.
pub struct SparqlClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, Option<String>)>,
}

impl SparqlClient {
    /// Create a client with a fixed per-request timeout.
    ///
    /// # Errors
    /// Returns `KbError::NotConfigured` if the endpoint is blank or the
    /// underlying HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, KbError> {
        if endpoint.trim().is_empty() {
            return Err(KbError::NotConfigured("SPARQL endpoint URL is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KbError::NotConfigured(format!("Failed to build HTTP client: {}", e)))?;

        Ok(SparqlClient {
            client,
            endpoint: endpoint.to_string(),
            credentials: None,
        })
    }

    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a SELECT query and return its rows in service order.
    pub async fn select(&self, query: &str) -> Result<Vec<Binding>, KbError> {
        tracing::debug!(endpoint = %self.endpoint, query = %query, "Executing SPARQL query");

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, RESULTS_MEDIA_TYPE)
            .form(&[("query", query)]);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, pass.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| KbError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(KbError::Api { status, message: body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| KbError::Transport(format!("Failed to read response body: {}", e)))?;

        let parsed: SelectResponse = serde_json::from_str(&body)
            .map_err(|e| KbError::Decode(format!("{} (body: {})", e, truncate(&body, 200))))?;

        Ok(parsed.results.bindings)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Escape text so it matches itself literally inside a quoted SPARQL REGEX pattern.
///
/// Regex metacharacters are escaped first, then the result is escaped as a
/// SPARQL string literal (backslash and double quote).
pub fn literal_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '|' | '.' | '-' | '^' | '$' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']'
        ) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    escape_string(&pattern)
}

/// Escape text for use inside a double-quoted SPARQL string literal.
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Wrap a URI as an IRI reference, rejecting characters that would break the query.
pub fn iri(uri: &str) -> Result<String, KbError> {
    let uri = uri.trim();
    let invalid = uri.is_empty()
        || uri
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'));
    if invalid {
        return Err(KbError::InvalidTerm(format!("not an IRI: {:?}", uri)));
    }
    Ok(format!("<{}>", uri))
}

/// Anchored, case-insensitive whole-string label filter.
pub fn label_filter(var: &str, text: &str) -> String {
    format!("FILTER(REGEX(STR(?{var}), \"^{}$\", \"i\"))", literal_pattern(text))
}

/// Union of fixed-length relation chains from `subject` to `target`.
///
/// Each branch binds `rank_var` to its chain length, so the minimum over a
/// subject's rows is its hop distance. Built as explicit alternatives rather
/// than a property path so the distance stays computable.
pub fn chain_union(subject: &str, predicate: &str, target: &str, max_hops: u8, rank_var: &str) -> String {
    (1..=max_hops)
        .map(|hops| {
            let path = vec![predicate; hops as usize].join("/");
            format!("{{ {subject} {path} {target} . BIND({hops} AS ?{rank_var}) }}")
        })
        .collect::<Vec<_>>()
        .join("\n  UNION\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_literal_pattern_escapes_regex_and_quotes() {
        assert_eq!(literal_pattern("St. John's"), "St\\\\. John's");
        assert_eq!(literal_pattern("Springfield (IL)"), "Springfield \\\\(IL\\\\)");
        assert_eq!(literal_pattern("a\"b"), "a\\\"b");
        assert_eq!(literal_pattern("Fresno"), "Fresno");
    }

    #[test]
    fn test_iri_rejects_injection() {
        assert_eq!(iri(" http://vocab.getty.edu/tgn/1 ").unwrap(), "<http://vocab.getty.edu/tgn/1>");
        assert!(iri("http://x/> } DROP ALL {").is_err());
        assert!(iri("").is_err());
    }

    #[test]
    fn test_chain_union_enumerates_each_length() {
        let clause = chain_union("?place", "gvp:broaderPreferred", "<http://x/1>", 3, "d");
        assert!(clause.contains("{ ?place gvp:broaderPreferred <http://x/1> . BIND(1 AS ?d) }"));
        assert!(clause.contains(
            "{ ?place gvp:broaderPreferred/gvp:broaderPreferred/gvp:broaderPreferred <http://x/1> . BIND(3 AS ?d) }"
        ));
        assert_eq!(clause.matches("UNION").count(), 2);
    }

    #[test]
    fn test_binding_treats_null_and_empty_as_absent() {
        let json = r#"{"a": {"type": "literal", "value": "x"}, "b": null, "c": {"type": "literal", "value": ""}}"#;
        let binding: Binding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.value("a"), "x");
        assert_eq!(binding.get("b"), None);
        assert_eq!(binding.get("c"), None);
        assert_eq!(binding.value("missing"), "");
    }

    #[test]
    fn test_binding_rank_parses_typed_literal() {
        let json = r#"{"r": {"type": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer", "value": "2"}}"#;
        let binding: Binding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.rank("r"), Some(2));
    }

    #[tokio::test]
    async fn test_select_decodes_bindings() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/sparql")
                    .header("accept", RESULTS_MEDIA_TYPE);
                then.status(200)
                    .header("content-type", RESULTS_MEDIA_TYPE)
                    .body(
                        r#"{"head": {"vars": ["place"]},
                            "results": {"bindings": [
                                {"place": {"type": "uri", "value": "http://vocab.getty.edu/tgn/7013962"}},
                                {"place": {"type": "uri", "value": "http://vocab.getty.edu/tgn/1000080"}}
                            ]}}"#,
                    );
            })
            .await;

        let client = SparqlClient::new(&server.url("/sparql"), Duration::from_secs(5)).unwrap();
        let rows = client.select("SELECT ?place WHERE { ?place ?p ?o }").await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value("place"), "http://vocab.getty.edu/tgn/7013962");
    }

    #[tokio::test]
    async fn test_select_reports_http_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparql");
                then.status(503).body("overloaded");
            })
            .await;

        let client = SparqlClient::new(&server.url("/sparql"), Duration::from_secs(5)).unwrap();
        let err = client.select("SELECT * WHERE {}").await.unwrap_err();
        assert!(matches!(err, KbError::Api { status: 503, .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_select_rejects_non_result_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparql");
                then.status(200).body("<html>login</html>");
            })
            .await;

        let client = SparqlClient::new(&server.url("/sparql"), Duration::from_secs(5)).unwrap();
        let err = client.select("SELECT * WHERE {}").await.unwrap_err();
        assert!(matches!(err, KbError::Decode(_)), "got {:?}", err);
    }

    #[test]
    fn test_blank_endpoint_is_not_configured() {
        assert!(matches!(
            SparqlClient::new("  ", Duration::from_secs(1)),
            Err(KbError::NotConfigured(_))
        ));
        let client = SparqlClient::new("https://query.wikidata.org/sparql", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "https://query.wikidata.org/sparql");
    }
}
