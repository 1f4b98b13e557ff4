//! Hashtag extraction from free-text descriptions.

use std::collections::HashSet;

/// Letters and digits of any script, plus `_`.
fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercase hashtags in first-seen order, without duplicates or the `#`.
///
/// A tag is a `#` at the start of a whitespace-separated word followed by
/// tag characters; the first other character ends it.
pub fn extract_hashtags(description: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    description
        .split(char::is_whitespace)
        .filter_map(|word| word.strip_prefix('#'))
        .map(|rest| {
            let end = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
            rest[..end].to_lowercase()
        })
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_description() {
        assert_eq!(
            extract_hashtags("trip to #paris and #france"),
            vec!["paris", "france"]
        );
    }

    #[test]
    fn test_case_and_duplicates() {
        assert_eq!(
            extract_hashtags("#Paris at night, #paris again #PARIS #eiffel_tower"),
            vec!["paris", "eiffel_tower"]
        );
    }

    #[test]
    fn test_ignores_embedded_hashes() {
        assert_eq!(extract_hashtags("issue#42 and C# and #rust"), vec!["rust"]);
        assert!(extract_hashtags("no tags here").is_empty());
        assert!(extract_hashtags("just a # sign").is_empty());
        assert!(extract_hashtags("").is_empty());
    }

    #[test]
    fn test_punctuation_ends_tag() {
        assert_eq!(
            extract_hashtags("#sunset, #beach! (#holiday)"),
            vec!["sunset", "beach"]
        );
    }

    #[test]
    fn test_non_ascii_tags() {
        assert_eq!(
            extract_hashtags("trip to #café and #東京 and #münchen"),
            vec!["café", "東京", "münchen"]
        );
        assert_eq!(extract_hashtags("#Ünïcode #ÜNÏCODE"), vec!["ünïcode"]);
    }

    #[test]
    fn test_unicode_whitespace_separates_words() {
        assert_eq!(
            extract_hashtags("#città\u{3000}#日本\u{a0}#x"),
            vec!["città", "日本", "x"]
        );
    }
}
