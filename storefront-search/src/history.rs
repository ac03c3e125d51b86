use crate::error::Result;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub const RECENT_SEARCHES_FILENAME: &str = "recent-searches.json";

/// Backing storage for the recent-search list: a single JSON array of
/// strings. Saving an empty list removes the stored value.
pub trait RecentSearchStore: Send {
    fn load(&self) -> Result<Vec<String>>;

    fn save(&mut self, terms: &[String]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RecentSearchStore for JsonFileStore {
    fn load(&self) -> Result<Vec<String>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, terms: &[String]) -> Result<()> {
        if terms.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(terms)?)?;
        Ok(())
    }
}

/// In-process store. `None` means nothing is stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    terms: Option<Vec<String>>,
}

impl MemoryStore {
    pub fn with_terms(terms: Vec<String>) -> Self {
        Self { terms: Some(terms) }
    }

    pub fn stored(&self) -> Option<&[String]> {
        self.terms.as_deref()
    }
}

impl RecentSearchStore for MemoryStore {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self.terms.clone().unwrap_or_default())
    }

    fn save(&mut self, terms: &[String]) -> Result<()> {
        self.terms = (!terms.is_empty()).then(|| terms.to_vec());
        Ok(())
    }
}

/// Capped, duplicate-free, most-recent-first list of search terms.
pub struct RecentSearches {
    terms: Vec<String>,
    max: usize,
    store: Box<dyn RecentSearchStore>,
}

impl std::fmt::Debug for RecentSearches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecentSearches")
            .field("terms", &self.terms)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl RecentSearches {
    /// Load from `store`. Unreadable data yields an empty list.
    pub fn load(store: Box<dyn RecentSearchStore>, max: usize) -> Self {
        let loaded = store.load().unwrap_or_else(|err| {
            warn!(%err, "ignoring unreadable recent searches");
            Vec::new()
        });
        let mut terms: Vec<String> = Vec::with_capacity(max);
        for term in loaded {
            let term = term.trim();
            if !term.is_empty() && !terms.iter().any(|existing| existing == term) {
                terms.push(term.to_string());
            }
        }
        terms.truncate(max);
        Self { terms, max, store }
    }

    pub fn in_memory(max: usize) -> Self {
        Self::load(Box::new(MemoryStore::default()), max)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Move `term` to the front, dropping the oldest entry past the cap.
    pub fn record(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        self.terms.retain(|existing| existing != term);
        self.terms.insert(0, term.to_string());
        self.terms.truncate(self.max);
        self.persist();
    }

    pub fn remove(&mut self, term: &str) -> bool {
        let before = self.terms.len();
        self.terms.retain(|existing| existing != term);
        let removed = self.terms.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.terms) {
            warn!(%err, "failed to persist recent searches");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn letters(range: std::ops::RangeInclusive<char>) -> Vec<String> {
        range.map(|c| c.to_string()).collect()
    }

    #[test]
    fn eleventh_entry_drops_the_oldest() {
        let mut recent = RecentSearches::load(
            Box::new(MemoryStore::with_terms(letters('a'..='j'))),
            10,
        );
        recent.record("k");

        let mut expected = vec!["k".to_string()];
        expected.extend(letters('a'..='i'));
        assert_eq!(recent.terms(), expected.as_slice());
    }

    #[test]
    fn recording_existing_term_moves_it_to_front() {
        let mut recent = RecentSearches::in_memory(10);
        recent.record("shirt");
        recent.record("socks");
        recent.record("  shirt ");
        recent.record("   ");
        assert_eq!(recent.terms(), &["shirt".to_string(), "socks".to_string()]);
    }

    #[test]
    fn never_exceeds_cap_or_duplicates() {
        let mut recent = RecentSearches::in_memory(10);
        for i in 0..25 {
            recent.record(&format!("term {}", i % 13));
        }
        let terms = recent.terms();
        assert_eq!(terms.len(), 10);
        let mut unique = terms.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert_eq!(terms[0], "term 11");
    }

    #[test]
    fn json_file_round_trip_and_removal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(RECENT_SEARCHES_FILENAME);

        let mut recent = RecentSearches::load(Box::new(JsonFileStore::new(path.clone())), 10);
        assert!(recent.terms().is_empty());
        recent.record("shirt");
        recent.record("hat");

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"["hat","shirt"]"#);

        let reloaded = RecentSearches::load(Box::new(JsonFileStore::new(path.clone())), 10);
        assert_eq!(reloaded.terms(), &["hat".to_string(), "shirt".to_string()]);

        recent.remove("hat");
        recent.remove("shirt");
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RECENT_SEARCHES_FILENAME);
        fs::write(&path, "{not json").unwrap();

        let recent = RecentSearches::load(Box::new(JsonFileStore::new(path)), 10);
        assert!(recent.terms().is_empty());
    }

    #[test]
    fn loaded_lists_are_normalized() {
        let stored = vec![
            "a".to_string(),
            " a ".to_string(),
            String::new(),
            "b".to_string(),
            "c".to_string(),
        ];
        let recent = RecentSearches::load(Box::new(MemoryStore::with_terms(stored)), 2);
        assert_eq!(recent.terms(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clearing_removes_stored_value() {
        let mut store = MemoryStore::with_terms(vec!["a".to_string()]);
        store.save(&[]).unwrap();
        assert_eq!(store.stored(), None);

        let mut recent = RecentSearches::in_memory(10);
        recent.record("a");
        recent.clear();
        assert!(recent.terms().is_empty());
    }
}
