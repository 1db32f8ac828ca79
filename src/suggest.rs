use std::collections::HashSet;

use crate::types::ContentItem;

/// Title lookup for answer autocomplete. Not used by the game itself.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    /// (original title, lowercased title), first occurrence wins
    titles: Vec<(String, String)>,
}

impl TitleIndex {
    pub fn new(items: &[ContentItem]) -> Self {
        let mut seen = HashSet::new();
        let titles = items
            .iter()
            .map(|item| item.title.trim())
            .filter(|title| !title.is_empty() && seen.insert(title.to_string()))
            .map(|title| (title.to_string(), title.to_lowercase()))
            .collect();
        Self { titles }
    }

    /// Prefix matches first, then substring matches. Case-insensitive.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let prefix = self.titles.iter().filter(|(_, lower)| lower.starts_with(&query));
        let partial = self
            .titles
            .iter()
            .filter(|(_, lower)| !lower.starts_with(&query) && lower.contains(&query));

        prefix
            .chain(partial)
            .take(limit)
            .map(|(title, _)| title.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(titles: &[&str]) -> TitleIndex {
        let items: Vec<ContentItem> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| ContentItem {
                content_id: i.to_string(),
                title: t.to_string(),
                cover_reference: String::new(),
                popularity: 0.0,
                rating: 0.0,
                genres: vec![],
            })
            .collect();
        TitleIndex::new(&items)
    }

    #[test]
    fn test_prefix_matches_rank_first() {
        let idx = index(&["The Tower", "Tower of God", "Solo Leveling", "Tower Dungeon"]);
        assert_eq!(
            idx.suggest("tower", 10),
            vec!["Tower of God", "Tower Dungeon", "The Tower"]
        );
    }

    #[test]
    fn test_dedup_and_limit() {
        let idx = index(&["Tower of God", "Tower of God", " ", "Tower Dungeon"]);
        assert_eq!(idx.suggest("TOWER", 1), vec!["Tower of God"]);
        assert_eq!(idx.suggest("tower", 10).len(), 2);
    }

    #[test]
    fn test_blank_query_is_empty() {
        let idx = index(&["Tower of God"]);
        assert!(idx.suggest("   ", 10).is_empty());
    }
}
