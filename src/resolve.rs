use crate::similarity::Similarity;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The catalog key a query resolved to, with its score and payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMatch<T> {
    pub matched_key: String,
    pub score: f64,
    pub payload: T,
}

/// Returns the candidate scoring highest against `query`, provided the score
/// is strictly above `threshold`. Ties keep the first candidate seen.
pub fn resolve<'a, I>(
    query: &str,
    candidates: I,
    threshold: f64,
    scorer: &dyn Similarity,
) -> Option<(String, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let processed = process(query);

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = scorer.score(&processed, &process(candidate));
        debug!(query, candidate, score, "candidate scored");
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }

    best.filter(|(_, score)| *score > threshold)
        .map(|(key, score)| (key.to_string(), score))
}

/// [`resolve`] over the keys of a catalog, carrying the matched value along.
pub fn resolve_entry<'a, T>(
    query: &str,
    catalog: &'a BTreeMap<String, T>,
    threshold: f64,
    scorer: &dyn Similarity,
) -> Option<ResolvedMatch<&'a T>> {
    let (matched_key, score) = resolve(query, catalog.keys().map(String::as_str), threshold, scorer)?;
    let payload = catalog.get(&matched_key)?;
    Some(ResolvedMatch {
        matched_key,
        score,
        payload,
    })
}

fn process(value: &str) -> String {
    value.trim().to_lowercase()
}
