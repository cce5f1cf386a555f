//! Place-name resolution against a gazetteer.
//!
//! [`Gazetteer::resolve`] turns free text such as "between Ximen and
//! Gongguan" into a search origin and a residual query. Every
//! non-overlapping gazetteer name found in the text contributes its
//! coordinate to an arithmetic mean; the matched names and common filler
//! words are then removed from the text.

use std::ops::Range;

use geo::Point;

/// Residual queries shorter than this many characters are discarded.
const MIN_RESIDUAL_CHARS: usize = 2;

/// Filler phrases removed from the residual query.
///
/// ASCII phrases only match on word boundaries; other phrases match as
/// plain substrings.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "recommendations",
    "recommendation",
    "recommend",
    "coffee shops",
    "coffee shop",
    "is there",
    "are there",
    "anything",
    "between",
    "nearby",
    "around",
    "near",
    "cafés",
    "cafes",
    "café",
    "cafe",
    "store",
    "shop",
    "please",
    "find",
    "some",
    "any",
    "and",
    "the",
    "in",
    "at",
    "a",
    "有沒有",
    "有什麼",
    "咖啡廳",
    "咖啡店",
    "咖啡館",
    "推薦",
    "附近",
    "幫我",
    "一下",
    "之間",
    "請",
    "和",
    "跟",
    "的",
];

const TRIM_CHARS: &[char] = &[
    ',', '.', '!', '?', ';', ':', '-', '，', '。', '！', '？', '、', '；', '：',
];

/// Category of a gazetteer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlaceKind {
    /// Neighbourhood or administrative district.
    #[default]
    District,
    /// Transit station; also used for the transit-proximity score.
    Station,
    /// Named landmark.
    Landmark,
}

/// A named location.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    /// Name as it appears in user text.
    pub name: String,
    /// Coordinate with `x = longitude`, `y = latitude`.
    pub location: Point<f64>,
    /// Category.
    pub kind: PlaceKind,
}

impl GazetteerEntry {
    /// Construct an entry.
    pub fn new(name: impl Into<String>, location: Point<f64>, kind: PlaceKind) -> Self {
        Self {
            name: name.into(),
            location,
            kind,
        }
    }
}

/// Outcome of [`Gazetteer::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Effective search origin.
    pub origin: Point<f64>,
    /// Query text left after removing place names and filler; `None` when
    /// nothing meaningful remains.
    pub residual: Option<String>,
    /// Gazetteer names found in the text, in order of first appearance.
    pub matched: Vec<String>,
}

impl Resolution {
    /// Whether the text named at least one known place.
    #[must_use]
    pub const fn overrides_location(&self) -> bool {
        !self.matched.is_empty()
    }
}

/// Name to coordinate lookup.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use cafe_core::{Gazetteer, GazetteerEntry, PlaceKind};
///
/// let gazetteer = Gazetteer::new(vec![
///     GazetteerEntry::new("Ximen", Point::new(121.5081, 25.0421), PlaceKind::Station),
///     GazetteerEntry::new("Gongguan", Point::new(121.5343, 25.0147), PlaceKind::Station),
/// ]);
/// let resolution = gazetteer.resolve("between Ximen and Gongguan", Point::new(0.0, 0.0));
/// assert!((resolution.origin.x() - 121.5212).abs() < 1e-9);
/// assert_eq!(resolution.residual, None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    stop_words: Vec<String>,
}

impl Gazetteer {
    /// Build a gazetteer with the default stop words.
    #[must_use]
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        let stop_words = DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_owned()).collect();
        Self::with_stop_words(entries, stop_words)
    }

    /// Build a gazetteer with an explicit stop-word list.
    #[must_use]
    pub fn with_stop_words(mut entries: Vec<GazetteerEntry>, mut stop_words: Vec<String>) -> Self {
        entries.retain(|entry| !entry.name.trim().is_empty());
        // Longer names claim their text first so "Taipei Main Station" is not
        // also counted as "Taipei".
        entries.sort_by(|a, b| b.name.chars().count().cmp(&a.name.chars().count()));
        stop_words.retain(|word| !word.trim().is_empty());
        stop_words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        Self {
            entries,
            stop_words,
        }
    }

    /// All entries, longest name first.
    #[must_use]
    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    /// Coordinates of every transit station.
    #[must_use]
    pub fn stations(&self) -> Vec<Point<f64>> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == PlaceKind::Station)
            .map(|entry| entry.location)
            .collect()
    }

    /// Resolve `query` to a search origin and residual query.
    ///
    /// With no place names in the text the origin is `fallback` and the
    /// residual is the text with filler removed.
    #[must_use]
    pub fn resolve(&self, query: &str, fallback: Point<f64>) -> Resolution {
        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut hits: Vec<(usize, &GazetteerEntry)> = Vec::new();
        let haystack = query.to_ascii_lowercase();
        for entry in &self.entries {
            let needle = entry.name.to_ascii_lowercase();
            let mut first_hit = None;
            for (start, _) in haystack.match_indices(&needle) {
                let span = start..start + needle.len();
                if claimed.iter().any(|taken| overlaps(taken, &span)) {
                    continue;
                }
                first_hit.get_or_insert(start);
                claimed.push(span);
            }
            if let Some(start) = first_hit {
                hits.push((start, entry));
            }
        }

        let origin = if hits.is_empty() {
            fallback
        } else {
            let count = f64::from(u32::try_from(hits.len()).unwrap_or(u32::MAX));
            let (sum_x, sum_y) = hits.iter().fold((0.0, 0.0), |(x, y), (_, entry)| {
                (x + entry.location.x(), y + entry.location.y())
            });
            Point::new(sum_x / count, sum_y / count)
        };
        hits.sort_by_key(|(start, _)| *start);

        let without_places = remove_spans(query, &mut claimed);
        Resolution {
            origin,
            residual: self.strip_filler(&without_places),
            matched: hits.into_iter().map(|(_, entry)| entry.name.clone()).collect(),
        }
    }

    fn strip_filler(&self, text: &str) -> Option<String> {
        let mut remaining = text.to_owned();
        for word in &self.stop_words {
            remaining = remove_phrase(&remaining, word);
        }
        let collapsed = remaining.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || TRIM_CHARS.contains(&c));
        (trimmed.chars().count() >= MIN_RESIDUAL_CHARS).then(|| trimmed.to_owned())
    }
}

const fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Replace each claimed byte span with a single space.
fn remove_spans(text: &str, spans: &mut [Range<usize>]) -> String {
    spans.sort_by_key(|span| span.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans.iter() {
        out.push_str(text.get(cursor..span.start).unwrap_or_default());
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(text.get(cursor..).unwrap_or_default());
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// Remove every occurrence of `phrase` from `text`, case-insensitively for
/// ASCII. ASCII phrases must sit on word boundaries.
fn remove_phrase(text: &str, phrase: &str) -> String {
    let needle = phrase.to_ascii_lowercase();
    let haystack = text.to_ascii_lowercase();
    let bounded = phrase.is_ascii();
    let mut spans: Vec<Range<usize>> = haystack
        .match_indices(&needle)
        .map(|(start, _)| start..start + needle.len())
        .filter(|span| {
            if !bounded {
                return true;
            }
            let before = haystack.get(..span.start).and_then(|s| s.chars().next_back());
            let after = haystack.get(span.end..).and_then(|s| s.chars().next());
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .collect();
    if spans.is_empty() {
        return text.to_owned();
    }
    remove_spans(text, &mut spans)
}
