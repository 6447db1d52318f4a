/// Reconciliation engine: ranking, cross-base fallback and the per-item cascade.

pub mod driver;
pub mod fallback;
pub mod ranker;

use std::fmt;

use crate::gazetteer::PlaceDetails;

/// Accepted outcome for one input row, in a fixed shape whichever stage
/// produced it. Fields the producing stage cannot supply are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub label: String,
    pub label_en: String,
    pub label_it: String,
    pub label_de: String,
    pub label_fr: String,
    pub place_type: String,
    pub scope_note: String,
    pub secondary_description: String,
    pub gazetteer_uri: String,
    pub secondary_uri: String,
}

impl MatchResult {
    /// Gazetteer fields from `details`, emitted under `gazetteer_uri`.
    pub fn from_details(details: PlaceDetails, gazetteer_uri: String) -> Self {
        MatchResult {
            label: details.label,
            label_en: details.label_en,
            label_it: details.label_it,
            label_de: details.label_de,
            label_fr: details.label_fr,
            place_type: details.place_type,
            scope_note: details.scope_note,
            gazetteer_uri,
            ..Default::default()
        }
    }
}

/// One step kind of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Gazetteer search constrained to a context
    Contextual,
    /// Secondary match with a gazetteer cross-reference, under a context
    LinkedFallback,
    /// Secondary match accepted on its own record, under a context
    SecondaryOnly,
    /// Unconstrained gazetteer search
    Global,
    /// Unconstrained secondary match with a gazetteer cross-reference
    GlobalLinkedFallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Contextual => "contextual",
            Stage::LinkedFallback => "linked-fallback",
            Stage::SecondaryOnly => "secondary-only",
            Stage::Global => "global",
            Stage::GlobalLinkedFallback => "global-linked-fallback",
        };
        f.write_str(name)
    }
}
