//! Extraction of the SLO classification token from an instance's tags.

/// Recognized tag prefixes, in priority order. Each ends with its separator.
pub const SLO_PREFIXES: [&str; 4] = ["slo:", "SLO:", "slo=", "SLO="];

/// Splits a raw tags annotation into its tags. Tags are not trimmed.
pub fn split(raw: Option<&str>) -> Vec<&str> {
    match raw {
        None | Some("") => Vec::new(),
        Some(raw) => raw.split(',').collect(),
    }
}

/// Returns the classification token of the first tag matching a recognized
/// prefix.
///
/// Scanning stops at the first matching tag: if its value is empty no token is
/// returned, even when later tags would match.
pub fn class_token<'t>(tags: impl IntoIterator<Item = &'t str>) -> Option<&'t str> {
    for tag in tags {
        for prefix in SLO_PREFIXES {
            // Prefixes end with their separator, so the remainder is the value
            // after the first separator.
            if let Some(value) = tag.strip_prefix(prefix) {
                return (!value.is_empty()).then_some(value);
            }
        }
    }

    None
}
