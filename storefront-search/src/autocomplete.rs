//! Fuzzy suggestion ranking plus the debounce and staleness bookkeeping
//! around autocomplete requests.

use crate::error::Result;
use crate::proto::AutocompletePayload;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

pub const EXACT_SCORE: u32 = 100;
pub const PREFIX_SCORE: u32 = 90;
pub const SUBSTRING_SCORE: u32 = 70;
pub const SUBSEQUENCE_SCORE: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub score: u32,
}

/// Score `candidate` against `query`. Both sides are compared case-folded,
/// the query is trimmed. Zero means no match.
pub fn score_suggestion(candidate: &str, query: &str) -> u32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    let candidate = candidate.to_lowercase();
    if candidate == query {
        EXACT_SCORE
    } else if candidate.starts_with(&query) {
        PREFIX_SCORE
    } else if candidate.contains(&query) {
        SUBSTRING_SCORE
    } else if is_subsequence(&query, &candidate) {
        SUBSEQUENCE_SCORE
    } else {
        0
    }
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle.chars().all(|c| remaining.any(|h| h == c))
}

/// Keep matching candidates, best first. Equal scores keep input order.
pub fn rank_suggestions(candidates: Vec<String>, query: &str, limit: usize) -> Vec<Suggestion> {
    let mut ranked: Vec<Suggestion> = candidates
        .into_iter()
        .filter_map(|text| {
            let score = score_suggestion(&text, query);
            (score > 0).then_some(Suggestion { text, score })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Trailing-edge debounce for typed input. Time is passed in so callers and
/// tests control the clock.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending value; the quiet period restarts at `now`.
    pub fn schedule(&mut self, value: String, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let ready = matches!(&self.pending, Some((_, deadline)) if now >= *deadline);
        if !ready {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutocompleteTicket {
    pub generation: u64,
    pub query: String,
    pub store_url: String,
}

#[derive(Debug)]
pub struct Autocomplete {
    generation: u64,
    current_query: String,
    suggestions: Vec<Suggestion>,
    loading: bool,
    highlighted: Option<usize>,
    max_suggestions: usize,
}

impl Autocomplete {
    pub fn new(max_suggestions: usize) -> Self {
        Self {
            generation: 0,
            current_query: String::new(),
            suggestions: Vec::new(),
            loading: false,
            highlighted: None,
            max_suggestions,
        }
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Track the query a response must still match to be applied.
    /// An empty query clears everything immediately.
    pub fn set_query(&mut self, query: &str) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.clear();
        }
        self.current_query = trimmed.to_string();
    }

    /// Drop suggestions and the loading flag, orphaning any in-flight request.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.suggestions.clear();
        self.loading = false;
        self.highlighted = None;
    }

    pub fn begin(&mut self, query: &str, store_url: &str) -> Option<AutocompleteTicket> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.generation += 1;
        self.current_query = trimmed.to_string();
        self.loading = true;
        Some(AutocompleteTicket {
            generation: self.generation,
            query: trimmed.to_string(),
            store_url: store_url.to_string(),
        })
    }

    /// Apply a resolved request. Returns true when the suggestions changed.
    pub fn resolve(
        &mut self,
        ticket: &AutocompleteTicket,
        result: Result<AutocompletePayload>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(query = %ticket.query, "discarding superseded autocomplete response");
            return false;
        }
        self.loading = false;
        if ticket.query != self.current_query {
            debug!(query = %ticket.query, "discarding autocomplete response for stale query");
            return false;
        }
        self.highlighted = None;
        match result {
            Ok(payload) => {
                self.suggestions =
                    rank_suggestions(payload.candidates(), &ticket.query, self.max_suggestions);
            }
            Err(err) => {
                warn!(%err, query = %ticket.query, "autocomplete failed");
                self.suggestions.clear();
            }
        }
        true
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn highlighted_text(&self) -> Option<&str> {
        self.highlighted
            .and_then(|index| self.suggestions.get(index))
            .map(|s| s.text.as_str())
    }

    pub fn highlight_next(&mut self) {
        let len = self.suggestions.len();
        if len == 0 {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(index) if index + 1 < len => index + 1,
            _ => 0,
        });
    }

    pub fn highlight_previous(&mut self) {
        let len = self.suggestions.len();
        if len == 0 {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(index) if index > 0 => index - 1,
            _ => len - 1,
        });
    }

    pub fn reset_highlight(&mut self) {
        self.highlighted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::proto::Product;
    use pretty_assertions::assert_eq;

    fn payload(suggestions: &[&str]) -> AutocompletePayload {
        AutocompletePayload::Structured {
            suggestions: suggestions.iter().map(|s| (*s).to_string()).collect(),
            products: Vec::new(),
        }
    }

    #[test]
    fn score_tiers() {
        assert_eq!(score_suggestion("Shirt", " shirt "), EXACT_SCORE);
        assert_eq!(score_suggestion("Shirts", "shirt"), PREFIX_SCORE);
        assert_eq!(score_suggestion("Blue Shirt", "shirt"), SUBSTRING_SCORE);
        assert_eq!(score_suggestion("T-Shirt", "shrt"), SUBSEQUENCE_SCORE);
        assert_eq!(score_suggestion("Socks", "shrt"), 0);
        assert_eq!(score_suggestion("anything", "   "), 0);
    }

    #[test]
    fn scores_are_monotonic_for_one_candidate() {
        let candidate = "shirt";
        let exact = score_suggestion(candidate, "shirt");
        let prefix = score_suggestion(candidate, "shi");
        let substring = score_suggestion(candidate, "hir");
        let subsequence = score_suggestion(candidate, "srt");
        let miss = score_suggestion(candidate, "xyz");
        assert!(exact > prefix);
        assert!(prefix > substring);
        assert!(substring > subsequence);
        assert!(subsequence > miss);
        assert_eq!(miss, 0);
    }

    #[test]
    fn ranking_is_stable_and_capped() {
        let mut candidates: Vec<String> = (0..15).map(|i| format!("blue shirt {i}")).collect();
        candidates.insert(3, "shirt".to_string());
        candidates.insert(0, "socks".to_string());
        candidates.push("shirts".to_string());

        let ranked = rank_suggestions(candidates, "shirt", 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].text, "shirt");
        assert_eq!(ranked[1].text, "shirts");
        assert_eq!(ranked[2].text, "blue shirt 0");
        assert_eq!(ranked[9].text, "blue shirt 7");
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn debounce_keeps_only_last_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.schedule("shi".to_string(), start);
        debouncer.schedule("shirt".to_string(), start + Duration::from_millis(100));

        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(400)),
            Some("shirt".to_string())
        );
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn latest_request_wins_when_resolved_out_of_order() {
        let mut autocomplete = Autocomplete::new(10);
        autocomplete.set_query("sh");
        let first = autocomplete.begin("sh", "shop").unwrap();
        autocomplete.set_query("shirt");
        let second = autocomplete.begin("shirt", "shop").unwrap();

        assert!(autocomplete.resolve(&second, Ok(payload(&["shirt", "shorts"]))));
        assert!(!autocomplete.is_loading());
        assert!(!autocomplete.resolve(&first, Ok(payload(&["shoes"]))));

        let texts: Vec<&str> = autocomplete
            .suggestions()
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["shirt"]);
    }

    #[test]
    fn superseded_response_leaves_newer_loading_flag() {
        let mut autocomplete = Autocomplete::new(10);
        let first = autocomplete.begin("sh", "shop").unwrap();
        let _second = autocomplete.begin("shi", "shop").unwrap();
        autocomplete.resolve(&first, Ok(payload(&["shirt"])));
        assert!(autocomplete.is_loading());
        assert!(autocomplete.suggestions().is_empty());
    }

    #[test]
    fn loading_clears_on_error_and_on_query_mismatch() {
        let mut autocomplete = Autocomplete::new(10);
        let ticket = autocomplete.begin("shirt", "shop").unwrap();
        let err = SearchError::Status {
            endpoint: "/v1/autocomplete",
            status: 500,
        };
        assert!(autocomplete.resolve(&ticket, Err(err)));
        assert!(!autocomplete.is_loading());
        assert!(autocomplete.suggestions().is_empty());

        let ticket = autocomplete.begin("shirt", "shop").unwrap();
        autocomplete.set_query("shirts");
        assert!(!autocomplete.resolve(&ticket, Ok(payload(&["shirt"]))));
        assert!(!autocomplete.is_loading());
        assert!(autocomplete.suggestions().is_empty());
    }

    #[test]
    fn clearing_query_drops_in_flight_state() {
        let mut autocomplete = Autocomplete::new(10);
        let ticket = autocomplete.begin("shirt", "shop").unwrap();
        autocomplete.set_query("");
        assert!(!autocomplete.is_loading());
        assert!(!autocomplete.resolve(&ticket, Ok(payload(&["shirt"]))));
        assert!(autocomplete.suggestions().is_empty());
    }

    #[test]
    fn product_titles_are_ranked_when_no_suggestions() {
        let mut autocomplete = Autocomplete::new(10);
        let ticket = autocomplete.begin("shrt", "shop").unwrap();
        let products = vec![
            Product {
                id: "1".to_string(),
                title: "T-Shirt".to_string(),
                ..Default::default()
            },
            Product {
                id: "2".to_string(),
                title: "Hat".to_string(),
                ..Default::default()
            },
        ];
        autocomplete.resolve(&ticket, Ok(AutocompletePayload::Bare(products)));
        assert_eq!(
            autocomplete.suggestions(),
            &[Suggestion {
                text: "T-Shirt".to_string(),
                score: SUBSEQUENCE_SCORE,
            }]
        );
    }

    #[test]
    fn highlight_wraps_around() {
        let mut autocomplete = Autocomplete::new(10);
        let ticket = autocomplete.begin("s", "shop").unwrap();
        autocomplete.resolve(&ticket, Ok(payload(&["shirt", "socks", "shoes"])));

        autocomplete.highlight_previous();
        assert_eq!(autocomplete.highlighted_text(), Some("shoes"));
        autocomplete.highlight_next();
        assert_eq!(autocomplete.highlighted(), Some(0));
        autocomplete.highlight_next();
        autocomplete.highlight_next();
        autocomplete.highlight_next();
        assert_eq!(autocomplete.highlighted(), Some(0));
        autocomplete.reset_highlight();
        assert_eq!(autocomplete.highlighted_text(), None);
    }
}
