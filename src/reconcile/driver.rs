/// Reconciliation Driver
///
/// Each item gets an explicit, ordered attempt plan: for every context
/// (most specific first) the contextual search, the linked fallback and the
/// secondary-only fallback, then the global search and the global linked
/// fallback. Attempts run strictly in order and the first success ends the
/// item. Stage errors are logged and count as "no result".

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{fallback, ranker, MatchResult, Stage};
use crate::context::{ContextCandidate, ReconciliationItem};
use crate::errors::KbError;
use crate::gazetteer::{gazetteer_id, Gazetteer, SearchScope};
use crate::secondary::SecondaryKb;

/// One step of an item's cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<'a> {
    Contextual(&'a ContextCandidate),
    LinkedFallback(&'a ContextCandidate),
    SecondaryOnly(&'a ContextCandidate),
    Global,
    GlobalLinkedFallback,
}

impl Attempt<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            Attempt::Contextual(_) => Stage::Contextual,
            Attempt::LinkedFallback(_) => Stage::LinkedFallback,
            Attempt::SecondaryOnly(_) => Stage::SecondaryOnly,
            Attempt::Global => Stage::Global,
            Attempt::GlobalLinkedFallback => Stage::GlobalLinkedFallback,
        }
    }

    fn context(&self) -> Option<&ContextCandidate> {
        match self {
            Attempt::Contextual(c) | Attempt::LinkedFallback(c) | Attempt::SecondaryOnly(c) => Some(*c),
            Attempt::Global | Attempt::GlobalLinkedFallback => None,
        }
    }
}

/// Ordered attempts for `item`.
pub fn plan(item: &ReconciliationItem) -> Vec<Attempt<'_>> {
    let mut attempts = Vec::with_capacity(item.contexts.len() * 3 + 2);
    for context in &item.contexts {
        attempts.push(Attempt::Contextual(context));
        attempts.push(Attempt::LinkedFallback(context));
        attempts.push(Attempt::SecondaryOnly(context));
    }
    attempts.push(Attempt::Global);
    attempts.push(Attempt::GlobalLinkedFallback);
    attempts
}

/// Runs the cascade for each item against a pair of knowledge bases.
pub struct Reconciler {
    gazetteer: Arc<dyn Gazetteer>,
    secondary: Arc<dyn SecondaryKb>,
    entity_uri_base: String,
}

impl Reconciler {
    /// - `entity_uri_base`: prefix that turns a gazetteer id into its URI.
    pub fn new(gazetteer: Arc<dyn Gazetteer>, secondary: Arc<dyn SecondaryKb>, entity_uri_base: String) -> Self {
        Reconciler {
            gazetteer,
            secondary,
            entity_uri_base,
        }
    }

    /// Reconcile every item, recording at most one result per row.
    pub async fn reconcile_all(&self, items: &[ReconciliationItem], results: &mut BTreeMap<usize, MatchResult>) {
        let total = items.len();
        tracing::info!(items = total, "Starting reconciliation");

        for (idx, item) in items.iter().enumerate() {
            tracing::info!(
                row = item.row + 2,
                search = %item.search_text,
                contexts = item.contexts.len(),
                "Processing item {}/{}",
                idx + 1,
                total
            );
            let Some(result) = self.reconcile_item(item).await else {
                continue;
            };
            if results.contains_key(&item.row) {
                tracing::warn!(row = item.row + 2, "Row already reconciled, keeping the earlier result");
                continue;
            }
            results.insert(item.row, result);
        }

        tracing::info!(items = total, matched = results.len(), "Finished reconciliation");
    }

    /// Walk the attempt plan until one attempt yields a result.
    pub async fn reconcile_item(&self, item: &ReconciliationItem) -> Option<MatchResult> {
        let file_row = item.row + 2;
        for attempt in plan(item) {
            let stage = attempt.stage();
            let context = attempt.context().map(|c| c.id.as_str()).unwrap_or("");
            match self.run(&attempt, &item.search_text).await {
                Ok(Some(result)) => {
                    tracing::info!(
                        row = file_row,
                        search = %item.search_text,
                        stage = %stage,
                        context = %context,
                        source = attempt.context().map(|c| c.source.as_str()).unwrap_or(""),
                        specificity = attempt.context().map(|c| c.specificity).unwrap_or(0),
                        gazetteer_uri = %result.gazetteer_uri,
                        secondary_uri = %result.secondary_uri,
                        "Match found"
                    );
                    return Some(result);
                }
                Ok(None) => {
                    tracing::debug!(row = file_row, search = %item.search_text, stage = %stage, context = %context, "No result");
                }
                Err(e) => {
                    tracing::warn!(
                        row = file_row,
                        search = %item.search_text,
                        stage = %stage,
                        context = %context,
                        error = %e,
                        "Stage failed, continuing"
                    );
                }
            }
        }

        tracing::info!(row = file_row, search = %item.search_text, "Exhausted all stages, no match");
        None
    }

    async fn run(&self, attempt: &Attempt<'_>, text: &str) -> Result<Option<MatchResult>, KbError> {
        let gazetteer = self.gazetteer.as_ref();
        let secondary = self.secondary.as_ref();
        match attempt {
            Attempt::Contextual(context) => {
                ranker::rank(gazetteer, secondary, text, SearchScope::Within(&context.id)).await
            }
            Attempt::LinkedFallback(context) => {
                let Some(parent_id) = parent_id(context) else {
                    return Ok(None);
                };
                fallback::linked(gazetteer, secondary, &self.entity_uri_base, text, Some(parent_id.as_str())).await
            }
            Attempt::SecondaryOnly(context) => {
                let Some(parent_id) = parent_id(context) else {
                    return Ok(None);
                };
                fallback::secondary_only(secondary, text, &parent_id).await
            }
            Attempt::Global => ranker::rank(gazetteer, secondary, text, SearchScope::Global).await,
            Attempt::GlobalLinkedFallback => {
                fallback::linked(gazetteer, secondary, &self.entity_uri_base, text, None).await
            }
        }
    }
}

/// Gazetteer id of a context, or None (logged) when the URI has no numeric tail.
fn parent_id(context: &ContextCandidate) -> Option<String> {
    let id = gazetteer_id(&context.id);
    if id.is_none() {
        tracing::info!(context = %context.id, source = %context.source, "No gazetteer id derivable from context, skipping fallback");
    }
    id
}
