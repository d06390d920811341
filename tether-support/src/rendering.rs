//! Text rendering helpers for container errors and reports.
//!
//! Everything here is plain string work so the container crate can keep
//! its `Display` impls short.

use std::time::Duration;

/// Joins a resolution path into a single arrow-separated line.
///
/// # Examples
/// ```
/// use tether_support::rendering::render_path;
///
/// let path = ["CheckoutService", "ApiClient", "CheckoutService"];
/// assert_eq!(render_path(&path), "CheckoutService → ApiClient → CheckoutService");
/// ```
pub fn render_path(path: &[impl AsRef<str>]) -> String {
    path.iter()
        .map(|segment| segment.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Strips module paths from a fully qualified type name, keeping generics.
///
/// ```
/// use tether_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("checkout::api::ApiClient"), "ApiClient");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn checkout::settings::Settings>"),
///     "Arc<dyn Settings>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut short = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                short.push_str(&segment);
                short.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    short.push_str(&segment);
    short
}

/// Returns up to `limit` candidates that look like a typo of `requested`.
///
/// Candidates are compared on their shortened, lowercased names. A substring
/// hit ranks first, then candidates within a small edit distance.
pub fn suggest_similar(requested: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let wanted = shorten_type_name(requested).to_lowercase();
    if wanted.is_empty() || limit == 0 {
        return Vec::new();
    }
    let tolerance = (wanted.chars().count() / 3).max(2);

    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .filter_map(|candidate| {
            let short = shorten_type_name(candidate).to_lowercase();
            if short.is_empty() {
                return None;
            }
            if short.contains(&wanted) || wanted.contains(&short) {
                return Some((0, candidate));
            }
            let distance = edit_distance(&wanted, &short);
            (distance <= tolerance).then_some((distance, candidate))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate.clone())
        .collect()
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Formats a ratio in `[0, 1]` as a percentage with one decimal.
///
/// ```
/// use tether_support::rendering::format_percent;
///
/// assert_eq!(format_percent(0.5), "50.0%");
/// ```
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Formats a duration as fractional milliseconds.
pub fn format_millis(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn render_cycle_path() {
        assert_eq!(render_path(&["A", "B", "A"]), "A → B → A");
    }

    #[test]
    fn render_single_and_empty_path() {
        assert_eq!(render_path(&["A"]), "A");
        assert_eq!(render_path(&[] as &[&str]), "");
    }

    #[test]
    fn shorten_plain_and_nested() {
        assert_eq!(shorten_type_name("String"), "String");
        assert_eq!(
            shorten_type_name("core::option::Option<alloc::string::String>"),
            "Option<String>"
        );
        assert_eq!(
            shorten_type_name("std::collections::hash::map::HashMap<u8, app::Thing>"),
            "HashMap<u8, Thing>"
        );
    }

    #[test]
    fn shorten_tuple_and_reference() {
        assert_eq!(shorten_type_name("(app::A, app::B)"), "(A, B)");
        assert_eq!(shorten_type_name("&app::A"), "&A");
    }

    #[test]
    fn suggests_typo() {
        let candidates = owned(&["app::PaymentService", "app::ApiClient", "app::Settings"]);
        let suggestions = suggest_similar("app::PaymentServise", &candidates, 3);
        assert_eq!(suggestions, vec!["app::PaymentService".to_string()]);
    }

    #[test]
    fn substring_ranks_before_distance() {
        let candidates = owned(&["app::Settingz", "app::SettingsStore"]);
        let suggestions = suggest_similar("app::Settings", &candidates, 3);
        assert_eq!(suggestions, owned(&["app::SettingsStore", "app::Settingz"]));
    }

    #[test]
    fn suggests_nothing_for_unrelated() {
        let candidates = owned(&["app::Database"]);
        assert!(suggest_similar("XyzAbcDef", &candidates, 3).is_empty());
    }

    #[test]
    fn suggestion_limit_respected() {
        let candidates = owned(&["a::Client1", "a::Client2", "a::Client3"]);
        assert_eq!(suggest_similar("Client", &candidates, 2).len(), 2);
        assert!(suggest_similar("Client", &candidates, 0).is_empty());
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn percent_and_millis() {
        assert_eq!(format_percent(0.666), "66.6%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_millis(Duration::from_micros(1500)), "1.500ms");
    }
}
