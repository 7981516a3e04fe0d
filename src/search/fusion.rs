//! Result fusion: id deduplication and stable descending score order.

use std::collections::HashSet;

use crate::models::SearchResult;

/// Sort by descending score. Stable, so ties keep their incoming order.
pub fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Drop later duplicates of an id, then sort by descending score.
///
/// The first occurrence wins, so keyword hits take priority over supplement
/// hits that carry the same id.
pub fn fuse(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::with_capacity(results.len());
    let mut fused: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    sort_by_score(&mut fused);
    fused
}
