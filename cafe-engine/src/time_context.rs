//! Resolve when candidates must be open.
//!
//! An explicit target datetime from the intent classifier always wins.
//! Otherwise a late-night request suppresses the closing-time penalty and
//! filters on the current instant only when the user asked for "open
//! now". Every other request filters on the current instant.

use cafe_core::Intent;
use chrono::NaiveDateTime;
use log::info;

/// Terms that mark a late-night request, in tags, keywords, or raw text.
pub const DEFAULT_LATE_NIGHT_TERMS: &[&str] = &[
    "深夜",
    "凌晨",
    "半夜",
    "開很晚",
    "睡不著",
    "宵夜",
    "late night",
    "late-night",
    "insomnia",
    "midnight",
    "all night",
    "night owl",
];

/// Case-insensitive late-night term matcher.
#[derive(Debug, Clone)]
pub struct LateNightVocabulary {
    terms: Vec<String>,
}

impl Default for LateNightVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_LATE_NIGHT_TERMS.iter().copied())
    }
}

impl LateNightVocabulary {
    /// Build a vocabulary from `terms`; blank terms are ignored.
    pub fn new<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let normalised = terms
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        Self { terms: normalised }
    }

    /// Whether `text` mentions any late-night term.
    #[must_use]
    pub fn mentions(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term.as_str()))
    }
}

/// The instant availability is checked at, and whether closing time
/// should count against a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeContext {
    /// Local instant candidates must be open at; `None` disables the
    /// availability filter.
    pub check_time: Option<NaiveDateTime>,
    /// Score every venue with the neutral hours-until-close value.
    pub ignore_time_penalty: bool,
}

impl TimeContext {
    /// Resolve the time context for one request.
    ///
    /// `tags` holds both button tags and classifier tags; `query` is the
    /// raw request text.
    #[must_use]
    pub fn resolve(
        intent: &Intent,
        query: Option<&str>,
        tags: &[String],
        now: NaiveDateTime,
        vocabulary: &LateNightVocabulary,
    ) -> Self {
        if let Some(target) = intent.time_filter.target {
            info!("checking availability at requested time {target}");
            return Self {
                check_time: Some(target),
                ignore_time_penalty: false,
            };
        }
        let late_night = tags
            .iter()
            .chain(&intent.extracted_keywords)
            .map(String::as_str)
            .chain(query)
            .any(|text| vocabulary.mentions(text));
        if late_night {
            let check_time = intent.time_filter.filter_open_now.then_some(now);
            info!("late-night request; time penalty suppressed, open-now check {check_time:?}");
            return Self {
                check_time,
                ignore_time_penalty: true,
            };
        }
        Self {
            check_time: Some(now),
            ignore_time_penalty: false,
        }
    }
}
