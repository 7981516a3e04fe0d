//! Matched-keyword annotation for lexical hits.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::engine::EngineHit;

fn em_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<em>(.*?)</em>").expect("valid highlight pattern"))
}

/// Terms that occur (case-insensitively) in the title, keywords or abstract.
pub fn substring_matches(terms: &[String], hit: &EngineHit) -> Vec<String> {
    let title = hit.title.to_lowercase();
    let keywords = hit.keywords.join(" ").to_lowercase();
    let abstract_text = hit.abstract_text.to_lowercase();

    terms
        .iter()
        .filter(|term| {
            let needle = term.to_lowercase();
            title.contains(&needle) || keywords.contains(&needle) || abstract_text.contains(&needle)
        })
        .cloned()
        .collect()
}

/// Fragments wrapped in `<em>` by the engine's highlighter.
pub fn highlighted_terms(highlight: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    highlight
        .values()
        .flatten()
        .flat_map(|fragment| {
            em_pattern()
                .captures_iter(fragment)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Substring matches followed by highlight matches, without duplicates.
pub fn matched_keywords(terms: &[String], hit: &EngineHit) -> Vec<String> {
    let mut seen = HashSet::new();
    substring_matches(terms, hit)
        .into_iter()
        .chain(highlighted_terms(&hit.highlight))
        .filter(|term| !term.is_empty() && seen.insert(term.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> EngineHit {
        EngineHit {
            id: "d1".to_string(),
            title: "Primary open-angle Glaucoma".to_string(),
            abstract_text: "Intraocular pressure in GLC patients".to_string(),
            keywords: vec!["eye".to_string(), "optic nerve".to_string()],
            score: 1.0,
            highlight: BTreeMap::from([
                (
                    "title".to_string(),
                    vec!["Primary open-angle <em>Glaucoma</em>".to_string()],
                ),
                (
                    "abstract".to_string(),
                    vec!["in <em>GLC</em> patients".to_string()],
                ),
            ]),
        }
    }

    #[test]
    fn test_substring_matches_case_insensitive() {
        let terms = vec!["glaucoma".to_string(), "nerve".to_string(), "青光眼".to_string()];
        assert_eq!(substring_matches(&terms, &hit()), vec!["glaucoma", "nerve"]);
    }

    #[test]
    fn test_highlighted_terms() {
        let mut found = highlighted_terms(&hit().highlight);
        found.sort();
        assert_eq!(found, vec!["GLC", "Glaucoma"]);
    }

    #[test]
    fn test_matched_keywords_is_a_set() {
        let terms = vec!["GLC".to_string(), "glaucoma".to_string()];
        let matched = matched_keywords(&terms, &hit());
        assert_eq!(matched, vec!["GLC", "glaucoma", "Glaucoma"]);

        let unique: HashSet<_> = matched.iter().collect();
        assert_eq!(unique.len(), matched.len());
    }
}
