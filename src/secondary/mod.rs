/// Secondary knowledge base trait and supporting types
///
/// The secondary base is a general-purpose knowledge graph linked to the
/// gazetteer through a cross-reference property holding gazetteer ids.
/// It is consulted for enrichment and for the fallback stages only.

pub mod sparql;

use async_trait::async_trait;

use crate::errors::KbError;

/// An entity of the secondary base with its display fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryEntity {
    pub uri: String,
    pub label: String,
    pub description: String,
}

/// Label match that may carry a cross-reference back to the gazetteer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntity {
    pub uri: String,
    /// Gazetteer id held by the cross-reference property, if any
    pub gazetteer_id: Option<String>,
    pub description: String,
    /// Located-in hops to the context entity; None for unconstrained searches
    pub hops: Option<u8>,
}

/// Label match accepted on the secondary base's own record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedEntity {
    pub entity: SecondaryEntity,
    pub hops: u8,
}

/// Core trait for querying the secondary knowledge base.
///
/// Parents are identified by the gazetteer id the secondary base records
/// for them, never by a secondary URI.
#[async_trait]
pub trait SecondaryKb: Send + Sync {
    /// Entity carrying `gazetteer_id` as its cross-reference.
    async fn cross_reference(&self, gazetteer_id: &str) -> Result<Option<SecondaryEntity>, KbError>;

    /// Label matches located 1 to 3 hops inside the entity linked to
    /// `parent_id`, or anywhere when `parent_id` is None.
    async fn find_linked(&self, text: &str, parent_id: Option<&str>) -> Result<Vec<LinkedEntity>, KbError>;

    /// Label matches located 1 to 4 hops inside the entity linked to
    /// `parent_id`, without requiring a cross-reference of their own.
    async fn find_unlinked(&self, text: &str, parent_id: &str) -> Result<Vec<UnlinkedEntity>, KbError>;
}
