//! Venue-name normalisation for the literal name-match path.

/// Shortest unspaced CJK name that may match inside a longer query.
const MIN_CJK_NAME_CHARS: usize = 2;

/// Lower-case `name` and drop whitespace and punctuation.
///
/// # Examples
///
/// ```
/// use cafe_core::normalise_name;
///
/// assert_eq!(normalise_name("Fong Da  Coffee!"), "fongdacoffee");
/// assert_eq!(normalise_name("蜂大咖啡 西門店"), "蜂大咖啡西門店");
/// ```
#[must_use]
pub fn normalise_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `query` names the venue called `venue_name`.
///
/// The query must name the whole venue: either the normalised forms are
/// equal, or the venue's words appear consecutively in the query. Names
/// written in CJK script carry no word breaks, so those match when the
/// normalised name appears anywhere in the normalised query. A query that
/// holds only part of a name never matches.
///
/// # Examples
///
/// ```
/// use cafe_core::names_match;
///
/// assert!(names_match("take me to Fong Da Coffee", "Fong Da Coffee"));
/// assert!(!names_match("coffee", "Fong Da Coffee"));
/// ```
#[must_use]
pub fn names_match(query: &str, venue_name: &str) -> bool {
    let wanted = normalise_name(query);
    let candidate = normalise_name(venue_name);
    if wanted.is_empty() || candidate.is_empty() {
        return false;
    }
    if wanted == candidate {
        return true;
    }
    if candidate.chars().all(is_cjk) {
        return candidate.chars().count() >= MIN_CJK_NAME_CHARS && wanted.contains(&candidate);
    }
    let name_words = words(venue_name);
    !name_words.is_empty()
        && words(query)
            .windows(name_words.len())
            .any(|run| run == name_words.as_slice())
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

const fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30ff}'
            | '\u{3400}'..='\u{4dbf}'
            | '\u{4e00}'..='\u{9fff}'
            | '\u{ac00}'..='\u{d7af}'
            | '\u{f900}'..='\u{faff}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Fong Da Coffee", "Fong Da Coffee", true)]
    #[case("fong-da coffee", "Fong Da Coffee", true)]
    #[case("take me to Fong Da Coffee", "Fong Da Coffee", true)]
    #[case("fong da", "Fong Da Coffee", false)]
    #[case("coffee", "Fong Da Coffee", false)]
    #[case("fee", "Fong Da Coffee", false)]
    #[case("coffee near", "Fong Da Coffee", false)]
    #[case("quiet study spot", "Fong Da Coffee", false)]
    #[case("da", "Fong Da Coffee", false)]
    #[case("", "Fong Da Coffee", false)]
    fn matches_only_whole_names(
        #[case] query: &str,
        #[case] venue: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(names_match(query, venue), expected);
    }

    #[rstest]
    #[case("我想去蜂大咖啡西門店", "蜂大咖啡 西門店", true)]
    #[case("蜂大咖啡", "蜂大咖啡 西門店", false)]
    #[case("咖啡", "蜂大咖啡 西門店", false)]
    #[case("咖啡廳", "啡", false)]
    fn matches_unspaced_cjk_names_inside_queries(
        #[case] query: &str,
        #[case] venue: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(names_match(query, venue), expected);
    }

    #[rstest]
    fn words_must_line_up_on_boundaries() {
        assert!(!names_match("the moonlighters", "Moonlight"));
        assert!(names_match("is Moonlight open?", "Moonlight"));
    }
}
