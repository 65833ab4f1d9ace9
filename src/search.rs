//! Recently searched job titles, kept only for the current session.

use std::collections::HashSet;
use std::rc::Rc;
use tracing::warn;

use crate::codec;
use crate::store::MemoryStore;

pub const SEARCHED_TITLES_KEY: &str = "searchedTitles";

/// Always offered, after anything searched this session.
pub const DEFAULT_TITLES: &[&str] = &[
    "Software Engineer",
    "Frontend Developer",
    "Backend Developer",
    "Full Stack Developer",
    "Data Scientist",
    "Data Analyst",
    "DevOps Engineer",
    "Product Manager",
    "UI/UX Designer",
    "QA Engineer",
    "Business Analyst",
    "HR Executive",
];

const FUZZY_THRESHOLD: f64 = 0.85;

pub struct SearchHistory {
    store: Rc<MemoryStore>,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchHistory {
    pub fn new() -> Self {
        Self {
            store: Rc::new(MemoryStore::new()),
        }
    }

    pub fn terms(&self) -> Vec<String> {
        codec::read(&*self.store, SEARCHED_TITLES_KEY, Vec::new())
    }

    /// Remembers a searched title. Blank terms and repeats are ignored.
    pub fn record(&self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let mut terms = self.terms();
        let lowered = term.to_lowercase();
        if terms.iter().any(|t| t.to_lowercase() == lowered) {
            return;
        }
        terms.push(term.to_string());
        if let Err(e) = codec::write(&*self.store, SEARCHED_TITLES_KEY, &terms) {
            warn!(error = %e, "failed to record search term");
        }
    }

    /// Session terms followed by the defaults, without repeats, narrowed to
    /// those containing `prefix`. When nothing contains it, titles that are
    /// close to it are offered instead.
    pub fn suggestions(&self, prefix: &str, limit: usize) -> Vec<String> {
        let candidates = self.candidates();
        let needle = prefix.trim().to_lowercase();
        if needle.is_empty() {
            return candidates.into_iter().take(limit).collect();
        }

        let containing: Vec<String> = candidates
            .iter()
            .filter(|c| c.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        if !containing.is_empty() {
            return containing.into_iter().take(limit).collect();
        }

        let mut close: Vec<(f64, String)> = candidates
            .into_iter()
            .map(|c| (strsim::jaro_winkler(&c.to_lowercase(), &needle), c))
            .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
            .collect();
        close.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        close.into_iter().take(limit).map(|(_, c)| c).collect()
    }

    fn candidates(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.terms()
            .into_iter()
            .chain(DEFAULT_TITLES.iter().map(|t| t.to_string()))
            .filter(|t| seen.insert(t.to_lowercase()))
            .collect()
    }

    /// Ends the session's history.
    pub fn clear(&self) {
        self.store.clear();
    }

    #[cfg(test)]
    fn raw_store(&self) -> &MemoryStore {
        &self.store
    }
}
