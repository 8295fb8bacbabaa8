use lazy_regex::regex;

/// Turns arbitrary text into a lowercase identifier matching `^[a-z_][a-z0-9_]*$`.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, a leading digit gets an `_`
/// prefix, runs of `_` collapse to one and the result is lowercased. Applying it twice
/// yields the same result as applying it once.
#[must_use]
pub fn sanitize_metric_name(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let replaced = regex!(r"[^a-zA-Z0-9_]").replace_all(raw, "_");

    let prefixed = match replaced.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => replaced.into_owned(),
        _ => format!("_{replaced}"),
    };

    regex!(r"_+")
        .replace_all(&prefixed, "_")
        .to_ascii_lowercase()
}

/// Whether `name` is acceptable to a Prometheus registry as a metric name.
#[must_use]
pub fn is_valid_metric_name(name: &str) -> bool {
    regex!(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").is_match(name)
}
