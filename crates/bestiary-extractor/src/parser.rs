//! Recover a JSON array from untrusted model output
//!
//! Model replies are not guaranteed to be well formed: they may be wrapped in
//! markdown code fences, wrap the array in an object, or surround it with
//! prose. Recovery never fails; "nothing recoverable" is an empty vector.

use serde_json::Value;
use tracing::debug;

/// One recovery strategy: `None` (or an empty vector) means "try the next one"
pub type Strategy = fn(&str) -> Option<Vec<Value>>;

/// Ordered strategy chain that recovers the best-effort JSON array
#[derive(Debug, Clone)]
pub struct RobustJsonExtractor {
    strategies: Vec<(&'static str, Strategy)>,
}

impl RobustJsonExtractor {
    /// Extractor with the default chain: direct parse, then bracket scan
    pub fn new() -> Self {
        Self {
            strategies: vec![
                ("direct", parse_direct as Strategy),
                ("bracket_scan", largest_balanced_array as Strategy),
            ],
        }
    }

    /// Extract an array from `text`
    ///
    /// A single leading and trailing code fence is stripped first; the first
    /// strategy producing a non-empty array wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use bestiary_extractor::RobustJsonExtractor;
    ///
    /// let extractor = RobustJsonExtractor::new();
    /// let items = extractor.extract("```json\n[{\"latin\": \"Panthera leo\"}]\n```");
    /// assert_eq!(items.len(), 1);
    /// assert!(extractor.extract("no json here").is_empty());
    /// ```
    pub fn extract(&self, text: &str) -> Vec<Value> {
        let cleaned = strip_fence(text);

        for (name, strategy) in &self.strategies {
            if let Some(items) = strategy(cleaned).filter(|items| !items.is_empty()) {
                debug!("Recovered {} items via {} strategy", items.len(), name);
                return items;
            }
        }

        debug!("No JSON array recoverable from {} chars of text", text.len());
        Vec::new()
    }
}

impl Default for RobustJsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip one leading and one trailing code fence, then trim
///
/// The opening fence may carry a `json` tag (any case).
pub fn strip_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        body = rest;
    }

    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Parse the whole text; accept an array, an `items` array, or an array field
///
/// When an object holds several array-valued fields, the first one in
/// lexicographic key order is returned.
fn parse_direct(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("items") {
                return Some(items.clone());
            }

            let mut fields: Vec<_> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            fields.into_iter().find_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}

/// Try every maximal balanced `[...]` span; keep the longest that parses
///
/// Length is measured in characters; ties go to the span found first.
fn largest_balanced_array(text: &str) -> Option<Vec<Value>> {
    let mut best: Option<(usize, Vec<Value>)> = None;
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in text.char_indices() {
        match ch {
            '[' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let span = &text[start..=idx];
                    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(span) {
                        let len = span.chars().count();
                        if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
                            best = Some((len, items));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(_, items)| items)
}
