/// Cross-Base Fallback Chain
///
/// The linked stage finds a secondary-base entity with a cross-reference and
/// re-fetches the referenced gazetteer entity directly. The secondary-only
/// stage accepts the secondary record itself with gazetteer fields empty.

use super::MatchResult;
use crate::errors::KbError;
use crate::gazetteer::Gazetteer;
use crate::secondary::{LinkedEntity, SecondaryKb, UnlinkedEntity};

/// Cross-referenced match with the fewest located-in hops, first on ties.
/// Matches without a gazetteer id are never selected; unconstrained matches
/// sort last.
fn closest_linked(matches: &[LinkedEntity]) -> Option<(&LinkedEntity, &str)> {
    matches
        .iter()
        .filter_map(|m| {
            let id = m.gazetteer_id.as_deref().filter(|id| !id.is_empty())?;
            Some((m, id))
        })
        .min_by_key(|(m, _)| m.hops.unwrap_or(u8::MAX))
}

fn closest_unlinked(matches: &[UnlinkedEntity]) -> Option<&UnlinkedEntity> {
    matches.iter().min_by_key(|m| m.hops)
}

/// Secondary match linked back to the gazetteer.
///
/// `parent_id` is the gazetteer id of the context, or None for the
/// unconstrained variant. The emitted gazetteer URI is always the one built
/// from `entity_uri_base` and the cross-referenced id, even when the
/// gazetteer redirects the detail lookup to a replacement entity.
pub async fn linked(
    gazetteer: &dyn Gazetteer,
    secondary: &dyn SecondaryKb,
    entity_uri_base: &str,
    text: &str,
    parent_id: Option<&str>,
) -> Result<Option<MatchResult>, KbError> {
    let matches = secondary.find_linked(text, parent_id).await?;
    let Some((found, gazetteer_id)) = closest_linked(&matches) else {
        if !matches.is_empty() {
            tracing::info!(
                search = %text,
                matches = matches.len(),
                "No secondary match carries a gazetteer cross-reference"
            );
        }
        return Ok(None);
    };

    let gazetteer_uri = format!("{}{}", entity_uri_base, gazetteer_id);
    tracing::debug!(item = %found.uri, gazetteer_uri = %gazetteer_uri, "Fetching cross-referenced gazetteer entity");
    let Some(details) = gazetteer.describe(&gazetteer_uri, true).await? else {
        tracing::info!(gazetteer_uri = %gazetteer_uri, "Cross-referenced gazetteer entity has no details");
        return Ok(None);
    };

    let mut result = MatchResult::from_details(details, gazetteer_uri);
    result.secondary_description = found.description.clone();
    result.secondary_uri = found.uri.clone();
    Ok(Some(result))
}

/// Secondary match under the context, accepted without a cross-reference.
pub async fn secondary_only(
    secondary: &dyn SecondaryKb,
    text: &str,
    parent_id: &str,
) -> Result<Option<MatchResult>, KbError> {
    let matches = secondary.find_unlinked(text, parent_id).await?;
    let Some(found) = closest_unlinked(&matches) else {
        return Ok(None);
    };
    if found.entity.label.is_empty() {
        tracing::info!(item = %found.entity.uri, "Secondary match has no label, not accepting it");
        return Ok(None);
    }

    Ok(Some(MatchResult {
        label: found.entity.label.clone(),
        secondary_description: found.entity.description.clone(),
        secondary_uri: found.entity.uri.clone(),
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary::SecondaryEntity;

    fn linked_match(uri: &str, hops: Option<u8>) -> LinkedEntity {
        LinkedEntity {
            uri: uri.to_string(),
            gazetteer_id: Some("1".to_string()),
            description: String::new(),
            hops,
        }
    }

    fn unlinked_match(uri: &str, hops: Option<u8>) -> LinkedEntity {
        LinkedEntity {
            gazetteer_id: None,
            ..linked_match(uri, hops)
        }
    }

    #[test]
    fn test_closest_linked_prefers_fewer_hops() {
        let matches = vec![linked_match("a", Some(3)), linked_match("b", Some(1)), linked_match("c", Some(1))];
        assert_eq!(closest_linked(&matches).unwrap().0.uri, "b");
    }

    #[test]
    fn test_closest_linked_unconstrained_keeps_service_order() {
        let matches = vec![linked_match("a", None), linked_match("b", None)];
        assert_eq!(closest_linked(&matches).unwrap().0.uri, "a");
    }

    #[test]
    fn test_closest_linked_skips_matches_without_cross_reference() {
        let mut empty_id = linked_match("c", Some(1));
        empty_id.gazetteer_id = Some(String::new());
        let matches = vec![unlinked_match("a", Some(1)), empty_id, linked_match("b", Some(2))];
        let (found, id) = closest_linked(&matches).unwrap();
        assert_eq!(found.uri, "b");
        assert_eq!(id, "1");

        let global = vec![unlinked_match("a", None), linked_match("b", None)];
        assert_eq!(closest_linked(&global).unwrap().0.uri, "b");

        assert!(closest_linked(&[unlinked_match("a", Some(1))]).is_none());
    }

    #[test]
    fn test_closest_unlinked() {
        let entity = |uri: &str| SecondaryEntity {
            uri: uri.to_string(),
            label: "x".to_string(),
            description: String::new(),
        };
        let matches = vec![
            UnlinkedEntity { entity: entity("a"), hops: 4 },
            UnlinkedEntity { entity: entity("b"), hops: 2 },
        ];
        assert_eq!(closest_unlinked(&matches).unwrap().entity.uri, "b");
        assert!(closest_unlinked(&[]).is_none());
    }
}
