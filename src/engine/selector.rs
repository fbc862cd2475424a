//! SDK-aware result selection.
//!
//! Documentation pages often exist in several SDK flavors sharing one
//! canonical base URL. When a caller names a target SDK, at most one
//! variant per page survives retrieval: the variant written for that SDK
//! when it exists, otherwise the best-scoring variant of the page.

use std::collections::HashMap;

use super::retriever::ScoredChunk;

/// SDK identifiers accepted by the search endpoints.
/// Data, not code. New SDKs = new entries.
pub const KNOWN_SDKS: &[&str] = &[
    "nextjs",
    "react",
    "remix",
    "expo",
    "javascript",
    "nodejs",
    "express",
    "vue",
    "nuxt",
    "ruby",
    "python",
    "go",
    "android",
    "ios",
];

/// Normalize a caller-supplied SDK name against the known list.
/// Unknown names yield None and are treated as "no SDK requested".
pub fn validate_sdk(candidate: &str) -> Option<&'static str> {
    let wanted = candidate.trim().to_lowercase();
    KNOWN_SDKS.iter().copied().find(|known| *known == wanted)
}

struct GroupPick<'a> {
    sdk_match: Option<ScoredChunk<'a>>,
    best: ScoredChunk<'a>,
}

/// Collapse scored chunks to one survivor per documentation page.
///
/// Without a target SDK the input passes through unchanged. With one,
/// chunks are grouped by their canonical page URL; each group keeps the
/// matching-SDK chunk when present, else its highest-scoring chunk.
/// Equal scores resolve to the first occurrence.
pub fn select_for_sdk<'a>(
    scored: Vec<ScoredChunk<'a>>,
    target_sdk: Option<&str>,
) -> Vec<ScoredChunk<'a>> {
    let Some(target) = target_sdk else {
        return scored;
    };

    let mut order: Vec<&'a str> = Vec::new();
    let mut picks: HashMap<&'a str, GroupPick<'a>> = HashMap::new();

    for chunk in scored {
        let key = chunk.chunk.page_key();
        let matches_target = chunk.chunk.sdk.as_deref() == Some(target);

        match picks.get_mut(key) {
            None => {
                order.push(key);
                picks.insert(
                    key,
                    GroupPick {
                        sdk_match: matches_target.then_some(chunk),
                        best: chunk,
                    },
                );
            }
            Some(pick) => {
                if matches_target && pick.sdk_match.is_none_or(|held| chunk.score > held.score) {
                    pick.sdk_match = Some(chunk);
                }
                if chunk.score > pick.best.score {
                    pick.best = chunk;
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| picks.remove(key))
        .map(|pick| pick.sdk_match.unwrap_or(pick.best))
        .collect()
}
