//! Candidate model resolution.
//!
//! Produces the ordered, deduplicated list of models to attempt for one
//! request: last-known-good model first, then the configured preferred
//! model, then the hard-coded defaults. Recomputed per request because both
//! the environment and the routing hint may have changed since the last one.

use std::sync::RwLock;

/// Last successful model/adapter pair, shared across requests.
///
/// Purely a heuristic to bias future attempt ordering toward what last
/// worked; never correctness-bearing, so a plain RwLock with benign races
/// is enough. Owned by the gateway state rather than a module-level global
/// so separate gateway instances (tests) don't cross-contaminate.
#[derive(Debug, Default)]
pub struct RoutingHint {
    inner: RwLock<HintInner>,
}

#[derive(Debug, Default, Clone)]
struct HintInner {
    last_model: Option<String>,
    last_adapter: Option<String>,
}

impl RoutingHint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful generation.
    pub fn record(&self, model: &str, adapter: &str) {
        let mut inner = self.inner.write().expect("routing hint lock poisoned");
        inner.last_model = Some(model.to_string());
        inner.last_adapter = Some(adapter.to_string());
    }

    pub fn last_model(&self) -> Option<String> {
        self.inner
            .read()
            .expect("routing hint lock poisoned")
            .last_model
            .clone()
    }

    pub fn last_adapter(&self) -> Option<String> {
        self.inner
            .read()
            .expect("routing hint lock poisoned")
            .last_adapter
            .clone()
    }
}

/// Build the ordered unique candidate list for one request.
///
/// Order: cached model (if any), preferred model (if set and non-empty),
/// then each default in order. Empty entries are dropped; duplicates keep
/// their first-seen position.
pub fn resolve_candidates(
    cached: Option<&str>,
    preferred: Option<&str>,
    defaults: &[&str],
) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::with_capacity(defaults.len() + 2);

    let seeds = cached
        .into_iter()
        .chain(preferred)
        .chain(defaults.iter().copied());

    for candidate in seeds {
        if candidate.is_empty() {
            continue;
        }
        if !resolved.iter().any(|m| m == candidate) {
            resolved.push(candidate.to_string());
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cached_then_preferred_then_defaults() {
        let resolved = resolve_candidates(Some("m2"), Some("m1"), &["m1", "m3"]);
        assert_eq!(resolved, vec!["m2", "m1", "m3"]);
    }

    #[test]
    fn no_hint_no_preference_yields_defaults() {
        let resolved = resolve_candidates(None, None, &["a", "b"]);
        assert_eq!(resolved, vec!["a", "b"]);
    }

    #[test]
    fn empty_strings_are_dropped() {
        let resolved = resolve_candidates(Some(""), Some(""), &["a", "", "b"]);
        assert_eq!(resolved, vec!["a", "b"]);
    }

    #[test]
    fn duplicates_keep_first_seen_position() {
        let resolved = resolve_candidates(Some("a"), Some("a"), &["b", "a", "b"]);
        assert_eq!(resolved, vec!["a", "b"]);
    }

    #[test]
    fn hint_record_overwrites() {
        let hint = RoutingHint::new();
        assert_eq!(hint.last_model(), None);

        hint.record("gemini-2.0-flash", "gemini");
        assert_eq!(hint.last_model().as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(hint.last_adapter().as_deref(), Some("gemini"));

        hint.record("gemini-1.5-flash", "openai_compat");
        assert_eq!(hint.last_model().as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(hint.last_adapter().as_deref(), Some("openai_compat"));
    }
}
