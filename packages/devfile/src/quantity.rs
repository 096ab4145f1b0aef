//! Kubernetes resource quantity syntax (`128Mi`, `0.5`, `500m`, `1e3`).

use regex::Regex;
use std::sync::OnceLock;

fn quantity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)(([KMGTPE]i)|[numkMGTPE]|([eE][+-]?\d+))?$")
            .expect("valid quantity regex")
    })
}

/// Whether `value` parses as a resource quantity. Surrounding whitespace is
/// not accepted.
pub fn is_valid_quantity(value: &str) -> bool {
    quantity_pattern().is_match(value)
}
