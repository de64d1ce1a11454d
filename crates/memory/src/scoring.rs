//! Keyword relevance shared by the backends.

use chimera_core::memory::{MemoryEntry, MemoryQuery};

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms found in the entry, in `[0, 1]`.
pub(crate) fn score(entry: &MemoryEntry, query_terms: &[String]) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content = entry.content.to_lowercase();
    let hits = query_terms.iter().filter(|t| content.contains(t.as_str())).count();
    hits as f32 / query_terms.len() as f32
}

/// Rank `entries` against `query`, best first, newest first on ties.
pub(crate) fn rank<'a>(entries: impl Iterator<Item = &'a MemoryEntry>, query: &MemoryQuery) -> Vec<MemoryEntry> {
    let query_terms = terms(&query.text);
    let mut results: Vec<MemoryEntry> = entries
        .filter_map(|e| {
            let s = score(e, &query_terms);
            (s > 0.0 && s >= query.min_score).then(|| {
                let mut hit = e.clone();
                hit.score = s;
                hit
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    results.truncate(query.limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_term_overlap_scores_proportionally() {
        let entry = MemoryEntry::new("The project deadline is Friday");
        let s = score(&entry, &terms("project deadline moved?"));
        assert!((s - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn rank_orders_and_truncates() {
        let entries = vec![
            MemoryEntry::new("rust compiler"),
            MemoryEntry::new("python"),
            MemoryEntry::new("rust compiler errors are friendly"),
        ];
        let results = rank(entries.iter(), &MemoryQuery::new("rust compiler errors", 1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "rust compiler errors are friendly");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let entries = [MemoryEntry::new("anything")];
        assert!(rank(entries.iter(), &MemoryQuery::new("?", 5)).is_empty());
    }
}
