//! Test-only collaborators: an in-memory ledger and scripted language
//! services.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use geo::Point;

use crate::{
    Action, BehaviorCounts, EMBEDDING_DIMENSIONS, EmbeddingError, EmbeddingTask, Embedder,
    FeedbackLedger, Intent, IntentClassifier, IntentError, Interaction, LedgerError,
    SessionState, SessionStore, UserList,
};

/// Embedding with a single non-zero axis.
#[must_use]
pub fn unit_vector(axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIMENSIONS];
    if let Some(slot) = vector.get_mut(axis) {
        *slot = 1.0;
    }
    vector
}

#[derive(Debug, Default)]
struct LedgerState {
    log: Vec<Interaction>,
    bookmarks: HashMap<String, BTreeSet<String>>,
    blacklist: HashMap<String, BTreeSet<String>>,
    locations: HashMap<String, Point<f64>>,
    impressions: Vec<(String, String, DateTime<Utc>)>,
    sessions: HashMap<String, SessionState>,
}

/// In-memory [`FeedbackLedger`] and [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state.lock().map_err(|err| LedgerError::Storage {
            operation,
            message: err.to_string(),
        })
    }

    /// Copy of the interaction log; empty if the mutex is poisoned.
    #[must_use]
    pub fn interactions(&self) -> Vec<Interaction> {
        self.state
            .lock()
            .map(|state| state.log.clone())
            .unwrap_or_default()
    }

    /// Seed an impression as if the venue had been shown at `at`.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the ledger mutex is poisoned.
    pub fn seed_impression(
        &self,
        user_id: &str,
        place_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.record_impressions(user_id, &[place_id.to_owned()], at)
    }
}

impl FeedbackLedger for MemoryLedger {
    fn record(&self, interaction: &Interaction) -> Result<(), LedgerError> {
        let mut state = self.lock("record")?;
        if let Some(place_id) = &interaction.place_id {
            let list = match interaction.action {
                Action::Keep => Some(&mut state.bookmarks),
                Action::No => Some(&mut state.blacklist),
                _ => None,
            };
            if let Some(lists) = list {
                lists
                    .entry(interaction.user_id.clone())
                    .or_default()
                    .insert(place_id.clone());
            }
        }
        state.log.push(interaction.clone());
        Ok(())
    }

    fn remove_from_list(
        &self,
        user_id: &str,
        list: UserList,
        place_id: &str,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock("remove_from_list")?;
        let lists = match list {
            UserList::Bookmarks => &mut state.bookmarks,
            UserList::Blacklist => &mut state.blacklist,
        };
        if let Some(entries) = lists.get_mut(user_id) {
            entries.remove(place_id);
        }
        let action = list.action();
        state.log.retain(|row| {
            !(row.user_id == user_id
                && row.action == action
                && row.place_id.as_deref() == Some(place_id))
        });
        Ok(())
    }

    fn blacklist(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError> {
        let state = self.lock("blacklist")?;
        let mut ids = state.blacklist.get(user_id).cloned().unwrap_or_default();
        ids.extend(
            state
                .log
                .iter()
                .filter(|row| row.user_id == user_id && row.action == Action::No)
                .filter_map(|row| row.place_id.clone()),
        );
        Ok(ids)
    }

    fn bookmarks(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError> {
        let state = self.lock("bookmarks")?;
        Ok(state.bookmarks.get(user_id).cloned().unwrap_or_default())
    }

    fn behavior_counts(&self, place_id: &str) -> Result<BehaviorCounts, LedgerError> {
        let state = self.lock("behavior_counts")?;
        let mut counts = BehaviorCounts::default();
        for row in state
            .log
            .iter()
            .filter(|row| row.place_id.as_deref() == Some(place_id))
        {
            counts.observe(row.action);
        }
        Ok(counts)
    }

    fn is_returning_user(&self, user_id: &str) -> Result<bool, LedgerError> {
        let state = self.lock("is_returning_user")?;
        Ok(state.log.iter().any(|row| row.user_id == user_id))
    }

    fn update_location(
        &self,
        user_id: &str,
        location: Point<f64>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        {
            let mut state = self.lock("update_location")?;
            state.locations.insert(user_id.to_owned(), location);
        }
        self.record(&Interaction::new(user_id, Action::UpdateLocation, at).with_location(location))
    }

    fn last_known_location(&self, user_id: &str) -> Result<Option<Point<f64>>, LedgerError> {
        let state = self.lock("last_known_location")?;
        Ok(state.locations.get(user_id).copied())
    }

    fn record_impressions(
        &self,
        user_id: &str,
        place_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock("record_impressions")?;
        state.impressions.extend(
            place_ids
                .iter()
                .map(|place_id| (user_id.to_owned(), place_id.clone(), at)),
        );
        Ok(())
    }

    fn last_shown(
        &self,
        user_id: &str,
        place_ids: &[String],
    ) -> Result<HashMap<String, DateTime<Utc>>, LedgerError> {
        let state = self.lock("last_shown")?;
        let mut latest: HashMap<String, DateTime<Utc>> = HashMap::new();
        for (user, place, at) in &state.impressions {
            if user != user_id || !place_ids.contains(place) {
                continue;
            }
            let entry = latest.entry(place.clone()).or_insert(*at);
            if *at > *entry {
                *entry = *at;
            }
        }
        Ok(latest)
    }
}

impl SessionStore for MemoryLedger {
    fn load_session(&self, user_id: &str) -> Result<SessionState, LedgerError> {
        let state = self.lock("load_session")?;
        Ok(state.sessions.get(user_id).cloned().unwrap_or_default())
    }

    fn save_session(
        &self,
        user_id: &str,
        session: &SessionState,
        _at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock("save_session")?;
        state.sessions.insert(user_id.to_owned(), session.clone());
        Ok(())
    }
}

/// Scripted [`Embedder`] that records every text it is asked to embed.
#[derive(Debug, Default)]
pub struct StubEmbedder {
    rules: Vec<(String, Vec<f32>)>,
    fallback: Option<Vec<f32>>,
    error: Option<EmbeddingError>,
    seen: Mutex<Vec<String>>,
}

impl StubEmbedder {
    /// Return `vector` for every text.
    #[must_use]
    pub fn with_vector(vector: Vec<f32>) -> Self {
        Self {
            fallback: Some(vector),
            ..Self::default()
        }
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn with_error(error: EmbeddingError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Return `vector` for texts containing `needle`; earlier rules win.
    #[must_use]
    pub fn with_rule(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        self.rules.push((needle.into(), vector));
        self
    }

    /// Texts embedded so far.
    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.to_owned());
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, vector)| vector.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| EmbeddingError::Unavailable {
                message: "no scripted vector".to_owned(),
            })
    }
}

/// Scripted [`IntentClassifier`].
#[derive(Debug, Clone)]
pub struct StubClassifier {
    outcome: Result<Intent, IntentError>,
}

impl StubClassifier {
    /// Always return `intent`.
    #[must_use]
    pub const fn with_intent(intent: Intent) -> Self {
        Self { outcome: Ok(intent) }
    }

    /// Always fail with `error`.
    #[must_use]
    pub const fn with_error(error: IntentError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

#[async_trait]
impl IntentClassifier for StubClassifier {
    async fn classify(
        &self,
        _text: &str,
        _now: DateTime<FixedOffset>,
    ) -> Result<Intent, IntentError> {
        self.outcome.clone()
    }
}
