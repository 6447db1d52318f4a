/// Candidate Ranker: picks the best gazetteer candidate and enriches it.
///
/// Selection is lexicographic on `(type_rank, distance_rank)`; the first
/// candidate in service order wins a tie. Enrichment never disqualifies
/// the winner, failed lookups leave their fields empty.

use super::MatchResult;
use crate::errors::KbError;
use crate::gazetteer::{Candidate, Gazetteer, SearchScope};
use crate::secondary::SecondaryKb;

/// Lowest rank key, first on ties.
pub fn select_best(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by_key(|c| c.rank_key())
}

/// Search the gazetteer for `text` and return the enriched winner.
///
/// # Errors
/// Only the candidate search itself can fail; enrichment failures are
/// logged and absorbed.
pub async fn rank(
    gazetteer: &dyn Gazetteer,
    secondary: &dyn SecondaryKb,
    text: &str,
    scope: SearchScope<'_>,
) -> Result<Option<MatchResult>, KbError> {
    let candidates = gazetteer.search(text, scope).await?;
    let Some(best) = select_best(&candidates) else {
        return Ok(None);
    };
    if candidates.len() > 1 {
        tracing::debug!(
            search = %text,
            candidates = candidates.len(),
            winner = %best.uri,
            type_rank = best.type_rank,
            distance_rank = ?best.distance_rank,
            "Selected best of several candidates"
        );
    }

    let details = match gazetteer.describe(&best.uri, false).await {
        Ok(Some(details)) => details,
        Ok(None) => {
            tracing::warn!(uri = %best.uri, "No details for winning candidate");
            Default::default()
        }
        Err(e) => {
            tracing::warn!(uri = %best.uri, error = %e, "Detail lookup failed, keeping candidate");
            Default::default()
        }
    };
    let mut result = MatchResult::from_details(details, best.uri.clone());

    match best.gazetteer_id() {
        Some(id) => match secondary.cross_reference(&id).await {
            Ok(Some(entity)) => {
                result.secondary_description = entity.description;
                result.secondary_uri = entity.uri;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(gazetteer_id = %id, error = %e, "Cross-reference lookup failed, keeping candidate");
            }
        },
        None => {
            tracing::debug!(uri = %best.uri, "Winning candidate has no numeric identifier, skipping cross-reference");
        }
    }

    Ok(Some(result))
}
