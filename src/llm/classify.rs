//! Classification of exhausted upstream failures into user-facing categories.
//!
//! Diagnostic only: the category never changes control flow, it only picks
//! the message surfaced to the caller. Rules are evaluated in order, first
//! match wins.

use serde::Serialize;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    ModelUnavailable,
    Network,
    Unknown,
}

/// A classified terminal failure.
#[derive(Debug, Clone, Serialize)]
pub struct Classified {
    pub category: ErrorCategory,
    pub message: String,
}

/// Map a raw upstream error message to a category and a stable message.
///
/// `attempted` is included verbatim in the unknown-category message so
/// operators can spot configuration drift (e.g. a decommissioned model)
/// without server log access.
pub fn classify(raw: &str, attempted: &[String]) -> Classified {
    let lower = raw.to_lowercase();

    if lower.contains("permission")
        || lower.contains("403")
        || lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("key")
    {
        return Classified {
            category: ErrorCategory::Auth,
            message: "API key rejected — enable the provider API for this key.".to_string(),
        };
    }

    if lower.contains("not found") || lower.contains("404") || lower.contains("unrecognized") {
        return Classified {
            category: ErrorCategory::ModelUnavailable,
            message: "All candidate models failed (model not found) — configure a supported model."
                .to_string(),
        };
    }

    if lower.contains("network")
        || lower.contains("fetch")
        || lower.contains("dns")
        || lower.contains("connect")
    {
        return Classified {
            category: ErrorCategory::Network,
            message: "Network error contacting the provider — check connectivity and retry."
                .to_string(),
        };
    }

    Classified {
        category: ErrorCategory::Unknown,
        message: format!("Request failed after trying: {}. {raw}", attempted.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempted() -> Vec<String> {
        vec!["m1".to_string(), "m2".to_string()]
    }

    #[test]
    fn auth_errors_match_first() {
        for raw in [
            "HTTP 403: PERMISSION_DENIED",
            "API key not valid",
            "apikey rejected",
        ] {
            let c = classify(raw, &attempted());
            assert_eq!(c.category, ErrorCategory::Auth, "raw: {raw}");
            assert!(c.message.contains("API key rejected"));
        }
    }

    #[test]
    fn model_not_found_classifies_as_unavailable() {
        let c = classify("HTTP 404: model gemini-9000 was not found", &attempted());
        assert_eq!(c.category, ErrorCategory::ModelUnavailable);
        assert!(c.message.contains("model not found"));
    }

    #[test]
    fn network_markers_classify_as_network() {
        for raw in ["dns lookup failed", "fetch failed", "network unreachable"] {
            let c = classify(raw, &attempted());
            assert_eq!(c.category, ErrorCategory::Network, "raw: {raw}");
        }
    }

    #[test]
    fn unmatched_errors_carry_attempted_list_and_raw_message() {
        let c = classify("HTTP 500: upstream exploded", &attempted());
        assert_eq!(c.category, ErrorCategory::Unknown);
        assert!(c.message.contains("m1, m2"));
        assert!(c.message.contains("upstream exploded"));
    }

    #[test]
    fn rule_order_auth_beats_not_found() {
        // A message matching several rules takes the first in table order.
        let c = classify("403 key not found", &attempted());
        assert_eq!(c.category, ErrorCategory::Auth);
    }
}
