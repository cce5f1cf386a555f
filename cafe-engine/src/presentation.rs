//! Recommendation records for the chat front end.
//!
//! The canonical tag taxonomy lives here. The scorer only ever sees tag
//! sets; display labels, emoji, and the quick-reply buttons that expand
//! into several tags are presentation concerns.

use cafe_core::{Candidate, MatchType, OpeningStatus, Venue};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use url::Url;

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/";
const JUSTIFICATION_CHARS: usize = 35;
const DISPLAY_TAGS: usize = 3;
const QUERY_HIT_WEIGHT: u32 = 10;
const HIGH_VALUE_WEIGHT: u32 = 5;
const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One canonical tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    /// Tag as stored on venues.
    pub tag: String,
    /// Stable feature identifier.
    pub feature: String,
    /// Emoji shown before the tag.
    pub emoji: String,
    /// Other spellings users type for the tag.
    pub aliases: Vec<String>,
}

impl TagDefinition {
    fn new(tag: &str, feature: &str, emoji: &str, aliases: &[&str]) -> Self {
        Self {
            tag: tag.to_owned(),
            feature: feature.to_owned(),
            emoji: emoji.to_owned(),
            aliases: aliases.iter().map(|alias| (*alias).to_owned()).collect(),
        }
    }

    /// Label with its emoji.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.tag)
    }
}

const DEFINITIONS: &[(&str, &str, &str, &[&str])] = &[
    ("Wi-Fi", "has_wifi", "📶", &["wifi", "wi-fi", "網路"]),
    ("插座", "has_plug", "🔌", &["sockets", "plugs", "power", "充電"]),
    ("工作友善", "is_work_friendly", "💻", &["work", "laptop", "筆電", "讀書"]),
    ("不限時", "time_limit_free", "⏳", &["no time limit", "待整天"]),
    ("深夜", "is_midnight", "🌙", &["late night", "半夜", "凌晨"]),
    ("安靜", "is_quiet", "🤫", &["quiet", "不吵"]),
    ("熱鬧", "is_lively", "🎉", &["lively"]),
    ("甜點", "has_dessert", "🍰", &["dessert", "cake", "蛋糕"]),
    ("素食", "is_vegetarian_friendly", "🥗", &["vegetarian", "蔬食"]),
    ("簡餐", "has_meal", "🍽️", &["meal", "brunch", "早午餐"]),
    ("手沖精品", "is_specialty_coffee", "☕", &["pour over", "specialty", "手沖"]),
    ("自家烘焙", "home_roasted", "🫘", &["roastery", "烘豆"]),
    ("酒精飲料", "has_alcohol", "🍷", &["alcohol", "beer", "酒"]),
    ("寵物友善", "is_pet_friendly", "🐾", &["pet friendly", "寵物"]),
    ("店貓", "has_shop_cat", "🐱", &["cat", "貓咪"]),
    ("店狗", "has_shop_dog", "🐶", &["dog", "狗狗"]),
    ("老宅", "is_old_house", "🏚️", &["old house", "老屋"]),
    ("復古", "retro", "📻", &["retro", "vintage"]),
    ("文青", "hipster_style", "📚", &["hipster", "文藝"]),
    ("韓系風格", "is_korean_style", "🌸", &["korean", "韓系"]),
    ("日式風格", "is_japanese_style", "🎎", &["japanese", "日式"]),
    ("工業風格", "has_industrial_design", "🏭", &["industrial", "工業"]),
    ("戶外座位", "has_outdoor_seating", "🌿", &["outdoor", "露天"]),
    ("適合團體", "is_good_for_groups", "👥", &["groups", "聚會"]),
    ("兒童友善", "is_child_friendly", "🧸", &["kids", "親子"]),
    ("現場表演", "has_live_performance", "🎵", &["live music"]),
    ("可訂位", "can_reserve", "📅", &["reservations", "訂位"]),
    ("電子支付", "accept_mobile_payment", "📱", &["mobile payment", "line pay"]),
];

const BUTTONS: &[(&str, &[&str])] = &[
    ("絕對不限時", &["不限時"]),
    ("插座筆電族", &["插座", "工作友善"]),
    ("安靜好讀書", &["安靜"]),
    ("復古老宅風", &["老宅", "復古"]),
    ("質感文青風", &["文青", "韓系風格"]),
    ("個性工業風", &["工業風格"]),
    ("甜點下午茶", &["甜點"]),
    ("職人手沖店", &["手沖精品", "自家烘焙"]),
    ("深夜夜貓族", &["深夜"]),
    ("有毛孩療癒", &["寵物友善"]),
];

/// Tags never worth showing.
pub const NEGATIVE_TAGS: &[&str] = &[
    "溫度冷",
    "悶熱",
    "服務親切",
    "服務不佳",
    "服務效率不佳",
    "停車困難",
];

/// Tags that sell a venue on their own.
pub const HIGH_VALUE_TAGS: &[&str] = &[
    "工作友善", "不限時", "插座", "Wi-Fi", "深夜", "店貓", "店狗", "老宅", "甜點", "手沖精品",
];

/// Canonical tags, their display form, and the quick-reply buttons that
/// expand into them.
#[derive(Debug, Clone)]
pub struct TagTaxonomy {
    definitions: Vec<TagDefinition>,
    buttons: Vec<(String, Vec<String>)>,
}

impl Default for TagTaxonomy {
    fn default() -> Self {
        Self {
            definitions: DEFINITIONS
                .iter()
                .map(|(tag, feature, emoji, aliases)| {
                    TagDefinition::new(tag, feature, emoji, aliases)
                })
                .collect(),
            buttons: BUTTONS
                .iter()
                .map(|(label, tags)| {
                    (
                        (*label).to_owned(),
                        tags.iter().map(|tag| (*tag).to_owned()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl TagTaxonomy {
    /// Every canonical tag.
    #[must_use]
    pub fn definitions(&self) -> &[TagDefinition] {
        &self.definitions
    }

    /// Definition for a canonical tag.
    #[must_use]
    pub fn definition(&self, tag: &str) -> Option<&TagDefinition> {
        self.definitions.iter().find(|definition| definition.tag == tag)
    }

    /// Display form of `tag`; unknown tags are shown as they are.
    #[must_use]
    pub fn display(&self, tag: &str) -> String {
        self.definition(tag)
            .map_or_else(|| tag.to_owned(), TagDefinition::label)
    }

    /// Canonical tag for a user-typed word, matched on the tag itself or
    /// any alias, ignoring case.
    #[must_use]
    pub fn canonical(&self, word: &str) -> Option<&str> {
        let wanted = word.trim().to_lowercase();
        self.definitions
            .iter()
            .find(|definition| {
                definition.tag.to_lowercase() == wanted
                    || definition.aliases.iter().any(|alias| alias.to_lowercase() == wanted)
            })
            .map(|definition| definition.tag.as_str())
    }

    /// Tags a button or typed tag stands for, primary tag first.
    ///
    /// Buttons expand to their tag list. Anything else is split on commas
    /// and each part resolved through [`Self::canonical`], falling back to
    /// the part itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use cafe_engine::TagTaxonomy;
    ///
    /// let taxonomy = TagTaxonomy::default();
    /// assert_eq!(taxonomy.expand("插座筆電族"), vec!["插座", "工作友善"]);
    /// assert_eq!(taxonomy.expand("wifi, quiet"), vec!["Wi-Fi", "安靜"]);
    /// ```
    #[must_use]
    pub fn expand(&self, label: &str) -> Vec<String> {
        let trimmed = label.trim();
        if let Some((_, tags)) = self.buttons.iter().find(|(button, _)| button == trimmed) {
            return tags.clone();
        }
        trimmed
            .split([',', '，'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| self.canonical(part).unwrap_or(part).to_owned())
            .collect()
    }

    /// Up to three tags worth showing for `venue`.
    ///
    /// Negative tags are dropped. Tags the user asked for come first, then
    /// high-value tags, then the rest in their stored order.
    #[must_use]
    pub fn display_tags(
        &self,
        venue: &Venue,
        query: Option<&str>,
        requested: &[String],
    ) -> Vec<String> {
        let weight = |tag: &str| -> u32 {
            let mut total = 0;
            if query.is_some_and(|text| text.contains(tag)) {
                total += QUERY_HIT_WEIGHT;
            }
            if requested.iter().any(|wanted| wanted == tag) {
                total += QUERY_HIT_WEIGHT;
            }
            if HIGH_VALUE_TAGS.contains(&tag) {
                total += HIGH_VALUE_WEIGHT;
            }
            total
        };
        let mut tags: Vec<(u32, &str)> = venue
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| !NEGATIVE_TAGS.contains(tag))
            .map(|tag| (weight(tag), tag))
            .collect();
        tags.sort_by(|a, b| b.0.cmp(&a.0));
        tags.into_iter()
            .take(DISPLAY_TAGS)
            .map(|(_, tag)| self.display(tag))
            .collect()
    }
}

/// One recommendation, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRecord {
    /// Venue identifier.
    pub place_id: String,
    /// Cleaned display name.
    pub display_name: String,
    /// Distance from the search origin, rounded to the metre.
    pub dist_meters: f64,
    /// Average rating.
    pub rating: f64,
    /// Number of reviews behind the rating.
    pub review_count: u32,
    /// Up to three display tags.
    pub display_tags: Vec<String>,
    /// Why this venue was picked.
    pub justification: String,
    /// Opening-hours status at the checked time.
    pub opening_status: String,
    /// Map link.
    pub map_url: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Website.
    pub website: Option<String>,
    /// Path that produced the venue.
    pub match_type: MatchType,
    /// Final ranking score.
    pub score: f64,
}

/// What a record is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Raw request text.
    pub query: Option<&'a str>,
    /// Tags from buttons or flags.
    pub requested_tags: &'a [String],
    /// Local instant the opening status is described at.
    pub at: NaiveDateTime,
}

fn truncate(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_owned();
    }
    let mut short: String = trimmed.chars().take(limit).collect();
    short.push('…');
    short
}

fn justification(candidate: &Candidate) -> String {
    if let Some(review) = candidate
        .matched_review
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        return format!("“{}”", truncate(review, JUSTIFICATION_CHARS));
    }
    if let Some(summary) = candidate
        .venue
        .summary
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        return truncate(summary, JUSTIFICATION_CHARS);
    }
    match candidate.match_type {
        MatchType::Name => "The café you asked for".to_owned(),
        MatchType::Vector => "Matches what you described".to_owned(),
        MatchType::Tag => "Nearby and a good fit".to_owned(),
    }
}

fn clock_time(minute: u32) -> String {
    NaiveTime::from_num_seconds_from_midnight_opt(minute.saturating_mul(60), 0)
        .map_or_else(|| "--:--".to_owned(), |time| time.format("%H:%M").to_string())
}

/// Human-readable opening status of `venue` at `at`.
#[must_use]
pub fn opening_status(venue: &Venue, at: NaiveDateTime) -> String {
    let status = venue
        .opening_hours
        .as_ref()
        .map_or(OpeningStatus::Unknown, |hours| hours.status(at));
    match status {
        OpeningStatus::Open24Hours => "Open 24 hours".to_owned(),
        OpeningStatus::OpenUntil { close } => format!("Open until {}", clock_time(close)),
        OpeningStatus::OpensAt { day, open } => {
            let weekday = WEEKDAYS.get(usize::from(day)).copied().unwrap_or("?");
            format!("Closed; opens {weekday} {}", clock_time(open))
        }
        OpeningStatus::Unknown => "Hours unknown".to_owned(),
    }
}

/// Stored map link, or a map search for the venue's listing name.
#[must_use]
pub fn map_url(venue: &Venue) -> Option<String> {
    if let Some(stored) = venue.contact.map_url.as_ref().filter(|url| !url.is_empty()) {
        return Some(stored.clone());
    }
    Url::parse_with_params(
        MAP_SEARCH_URL,
        &[("api", "1"), ("query", venue.original_name.as_str())],
    )
    .ok()
    .map(String::from)
}

impl RecommendationRecord {
    /// Render a scored candidate.
    #[must_use]
    pub fn render(
        candidate: &Candidate,
        taxonomy: &TagTaxonomy,
        context: &RenderContext<'_>,
    ) -> Self {
        let venue = &candidate.venue;
        Self {
            place_id: venue.place_id.clone(),
            display_name: venue.display_name.clone(),
            dist_meters: candidate.dist_meters.round(),
            rating: venue.ratings.rating,
            review_count: venue.ratings.review_amount,
            display_tags: taxonomy.display_tags(venue, context.query, context.requested_tags),
            justification: justification(candidate),
            opening_status: opening_status(venue, context.at),
            map_url: map_url(venue),
            phone: venue.contact.phone.clone(),
            website: venue.contact.website.clone(),
            match_type: candidate.match_type,
            score: candidate.search_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafe_core::{Contact, OpeningHours, Period};
    use chrono::NaiveDate;
    use geo::Point;
    use rstest::{fixture, rstest};

    #[fixture]
    fn taxonomy() -> TagTaxonomy {
        TagTaxonomy::default()
    }

    #[fixture]
    fn saturday_evening() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 10)
            .and_then(|day| day.and_hms_opt(20, 0, 0))
            .expect("valid instant")
    }

    fn venue() -> Venue {
        Venue::new("p1", "Fong Da", Point::new(121.5065, 25.0433))
            .expect("valid venue")
            .with_original_name("蜂大咖啡")
    }

    #[rstest]
    fn negative_tags_are_hidden_and_requests_come_first(taxonomy: TagTaxonomy) {
        let cafe = venue().with_tags(["停車困難", "安靜", "插座", "店貓", "簡餐"]);
        let tags = taxonomy.display_tags(&cafe, Some("somewhere 安靜"), &[]);
        assert_eq!(tags, vec!["🤫 安靜", "🐱 店貓", "🔌 插座"]);
    }

    #[rstest]
    fn requested_tags_outrank_high_value_ones(taxonomy: TagTaxonomy) {
        let cafe = venue().with_tags(["Wi-Fi", "復古", "深夜", "老宅"]);
        let tags = taxonomy.display_tags(&cafe, None, &["復古".to_owned()]);
        assert_eq!(tags.first().map(String::as_str), Some("📻 復古"));
        assert_eq!(tags.len(), 3);
    }

    #[rstest]
    #[case("有毛孩療癒", &["寵物友善"])]
    #[case("Quiet", &["安靜"])]
    #[case("秘密基地", &["秘密基地"])]
    fn expands_buttons_and_aliases(
        taxonomy: TagTaxonomy,
        #[case] label: &str,
        #[case] expected: &[&str],
    ) {
        assert_eq!(taxonomy.expand(label), expected);
    }

    #[rstest]
    fn pet_button_admits_venues_without_shop_animals(taxonomy: TagTaxonomy) {
        let filter = cafe_core::TagFilter::all_of(taxonomy.expand("有毛孩療癒"));
        let cafe = venue().with_tags(["寵物友善"]);
        assert!(filter.matches(&cafe.tags));
        assert_eq!(filter.primary_only(), None);
    }

    #[rstest]
    #[case(OpeningHours::always_open(), "Open 24 hours")]
    #[case(
        OpeningHours::new(vec![Period::daytime(6, 9 * 60, 22 * 60).expect("valid period")]),
        "Open until 22:00"
    )]
    #[case(
        OpeningHours::new(vec![Period::daytime(0, 9 * 60 + 30, 17 * 60).expect("valid period")]),
        "Closed; opens Sun 09:30"
    )]
    fn describes_opening_status(
        saturday_evening: NaiveDateTime,
        #[case] hours: OpeningHours,
        #[case] expected: &str,
    ) {
        let cafe = venue().with_opening_hours(hours);
        assert_eq!(opening_status(&cafe, saturday_evening), expected);
    }

    #[rstest]
    fn unknown_hours_are_reported(saturday_evening: NaiveDateTime) {
        assert_eq!(opening_status(&venue(), saturday_evening), "Hours unknown");
    }

    #[rstest]
    fn justification_prefers_review_then_summary() {
        let review = "The back room is silent and every seat has a socket nearby";
        let from_review = Candidate::new(venue(), 120.0, MatchType::Vector, 0.7)
            .with_matched_review(Some(review.to_owned()));
        let text = justification(&from_review);
        assert!(text.starts_with("“The back room"));
        assert!(text.contains('…'));

        let from_summary = Candidate::new(
            venue().with_summary("Roastery since 1956"),
            120.0,
            MatchType::Tag,
            0.8,
        );
        assert_eq!(justification(&from_summary), "Roastery since 1956");

        let bare = Candidate::new(venue(), 120.0, MatchType::Name, 1.0);
        assert_eq!(justification(&bare), "The café you asked for");
    }

    #[rstest]
    fn map_url_falls_back_to_a_search() {
        let url = map_url(&venue()).expect("search url");
        assert!(url.starts_with("https://www.google.com/maps/search/?api=1&query="));
        assert!(!url.contains("蜂大"), "query should be percent-encoded: {url}");

        let stored = venue().with_contact(Contact {
            map_url: Some("https://maps.example/p1".to_owned()),
            ..Contact::default()
        });
        assert_eq!(map_url(&stored).as_deref(), Some("https://maps.example/p1"));
    }

    #[rstest]
    fn renders_a_record(taxonomy: TagTaxonomy, saturday_evening: NaiveDateTime) {
        let mut candidate = Candidate::new(
            venue().with_ratings(4.6, 812).with_tags(["手沖精品"]),
            412.4,
            MatchType::Tag,
            0.8,
        );
        candidate.search_score = 0.74;
        let context = RenderContext {
            query: None,
            requested_tags: &[],
            at: saturday_evening,
        };
        let record = RecommendationRecord::render(&candidate, &taxonomy, &context);
        assert_eq!(record.display_tags, vec!["☕ 手沖精品"]);
        assert_eq!(record.review_count, 812);
        assert_eq!(record.opening_status, "Hours unknown");
        let json = serde_json::to_value(&record).expect("serialise");
        assert_eq!(json["match_type"], "tag");
        assert_eq!(json["dist_meters"], 412.0);
    }
}
