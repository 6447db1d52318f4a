/// Gazetteer trait and supporting types
///
/// The gazetteer is the primary, hierarchical place-name knowledge base.
/// Candidate search returns rank keys only; details are fetched separately
/// for the single winning entity.

pub mod sparql;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::KbError;

/// Where a label search is allowed to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope<'a> {
    /// Entities 1 to 5 "broader" hops below the given context URI
    Within(&'a str),
    /// No containment filter
    Global,
}

/// A gazetteer entity whose label matched, with its rank keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub uri: String,
    /// Numeric gazetteer identifier, when the service exposes it
    pub identifier: Option<String>,
    /// Semantic-type rank, lower is better
    pub type_rank: u8,
    /// Minimum hop count to the context; None for global searches
    pub distance_rank: Option<u8>,
}

impl Candidate {
    /// Lexicographic selection key: type first, then distance.
    pub fn rank_key(&self) -> (u8, u8) {
        (self.type_rank, self.distance_rank.unwrap_or(u8::MAX))
    }

    /// Identifier for cross-referencing, falling back to the URI's numeric tail.
    pub fn gazetteer_id(&self) -> Option<String> {
        self.identifier.clone().or_else(|| gazetteer_id(&self.uri))
    }
}

/// Descriptive fields of one gazetteer entity. Absent values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceDetails {
    /// URI the details were read from (after any supersession)
    pub uri: String,
    pub identifier: String,
    /// Preferred display label
    pub label: String,
    pub label_en: String,
    pub label_it: String,
    pub label_de: String,
    pub label_fr: String,
    /// Display label of the preferred place type
    pub place_type: String,
    pub scope_note: String,
}

/// A sovereign state matched by label in country mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMatch {
    /// The label literal that matched the search text
    pub matched_label: String,
    pub details: PlaceDetails,
}

/// Core trait for querying the gazetteer.
///
/// Implementations must be Send + Sync so a single instance can be shared
/// by the driver (e.g., Arc<dyn Gazetteer>).
#[async_trait]
pub trait Gazetteer: Send + Sync {
    /// Entities with a label equal to `text` (case-insensitive), with rank keys.
    ///
    /// Contextual searches use the 4-level type ranking and compute
    /// `distance_rank`; global searches use the 3-level ranking.
    async fn search(&self, text: &str, scope: SearchScope<'_>) -> Result<Vec<Candidate>, KbError>;

    /// Direct lookup of one entity by URI.
    ///
    /// With `follow_replacement`, a superseded entity is replaced by its
    /// successor once before reading.
    async fn describe(&self, uri: &str, follow_replacement: bool) -> Result<Option<PlaceDetails>, KbError>;

    /// Sovereign states with a label equal to `text`. Every match is returned.
    async fn search_countries(&self, text: &str) -> Result<Vec<CountryMatch>, KbError>;
}

fn id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d+)(?:-place)?$").expect("static regex"))
}

/// Numeric identifier at the end of a gazetteer URI.
///
/// Accepts ".../tgn/7011781" and ".../tgn/7011781-place"; anything else is None.
pub fn gazetteer_id(uri: &str) -> Option<String> {
    id_pattern()
        .captures(uri.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
