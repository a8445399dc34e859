//! Error-details leak scanning.

/// Return the configured keywords present in `body` (case-sensitive
/// substring match). An empty body yields an empty result.
#[must_use]
pub fn scan(body: &str, keywords: &[String]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    keywords
        .iter()
        .filter(|kw| !kw.is_empty() && body.contains(kw.as_str()))
        .cloned()
        .collect()
}
