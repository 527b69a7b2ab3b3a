//! Lifecycle of resolutions: creation, daily logging, toggling and expiration. Every operation is
//! a whole-store read-modify-write through [ResolutionStorage].

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    store::{
        entities::{DetailCode, LogDate, LogValue, Resolution, ResolutionId, ResolutionStore},
        resolution_storage::ResolutionStorage,
    },
    utils::clock::Clock,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("No such resolution `{0}`")]
    NotFound(ResolutionId),
    #[error("`{0}` already exists")]
    Duplicate(ResolutionId),
    #[error("`{0}` is not active")]
    Inactive(ResolutionId),
    #[error("Can't log {value:?} for `{id}`: {reason}")]
    InvalidEntry {
        id: ResolutionId,
        value: LogValue,
        reason: String,
    },
}

/// Everything needed to create a resolution. The creation date comes from the tracker clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResolution {
    pub id: ResolutionId,
    pub description: String,
    pub expiration: Option<NaiveDate>,
    pub is_binary: bool,
}

/// A resolution that was built but not persisted yet. Creation is two-phase: the draft is shown
/// to the user and only [Tracker::commit] writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDraft {
    pub id: ResolutionId,
    pub resolution: Resolution,
}

impl ResolutionDraft {
    pub fn preview(&self) -> String {
        let r = &self.resolution;
        format!(
            "id: {}\ndescription: {}\ncreated: {}\nexpires: {}\nactive: {}\nbinary: {}",
            self.id,
            r.description,
            r.creation_date,
            r.expiration_date
                .map(|v| v.to_string())
                .unwrap_or_else(|| "never".into()),
            r.is_active,
            r.is_binary,
        )
    }
}

/// One answer for one resolution on the logged day. `new_codes` carries descriptions of codes
/// defined while answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: ResolutionId,
    pub value: LogValue,
    pub new_codes: BTreeMap<DetailCode, String>,
}

impl LogEntry {
    pub fn new(id: ResolutionId, value: LogValue) -> Self {
        Self {
            id,
            value,
            new_codes: BTreeMap::new(),
        }
    }
}

/// Result of [Tracker::log]. Rejected entries don't stop the rest from being saved.
#[derive(Debug, Default)]
pub struct LogSummary {
    pub saved: Vec<ResolutionId>,
    pub rejected: Vec<TrackerError>,
}

pub struct Tracker<S: ResolutionStorage> {
    storage: S,
    clock: Box<dyn Clock>,
}

impl<S: ResolutionStorage> Tracker<S> {
    pub fn new(storage: S, clock: Box<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Full store, without applying expiration.
    pub async fn all(&self) -> Result<ResolutionStore> {
        self.storage.load().await
    }

    /// Active resolutions. Resolutions whose expiration date has passed are deactivated and the
    /// store is saved before returning.
    #[instrument(skip(self))]
    pub async fn active(&self) -> Result<ResolutionStore> {
        let mut store = self.storage.load().await?;
        if expire(&mut store, self.today()) {
            self.storage.save(&store).await?;
        }
        Ok(store.active())
    }

    /// First phase of creation. Nothing is written.
    pub async fn draft(&self, request: NewResolution) -> Result<ResolutionDraft> {
        let store = self.storage.load().await?;
        build_draft(&store, request, self.today())
    }

    /// Second phase of creation. The store is reloaded, so an id taken in the meantime is still
    /// reported as a duplicate.
    #[instrument(skip(self, draft), fields(id = %draft.id))]
    pub async fn commit(&self, draft: ResolutionDraft) -> Result<()> {
        let mut store = self.storage.load().await?;
        if store.contains(&draft.id) {
            return Err(TrackerError::Duplicate(draft.id).into());
        }
        store.insert(draft.id.clone(), draft.resolution);
        self.storage.save(&store).await?;
        info!("Added resolution {}", draft.id);
        Ok(())
    }

    /// Records one day. Entries are applied to the active resolutions first and the result is
    /// merged back into the full store with a single save.
    #[instrument(skip(self, entries))]
    pub async fn log(&self, date: NaiveDate, entries: Vec<LogEntry>) -> Result<LogSummary> {
        let mut store = self.storage.load().await?;
        expire(&mut store, self.today());
        let mut active = store.active();

        let mut summary = LogSummary::default();
        for entry in entries {
            let id = entry.id.clone();
            let result = match active.get_mut(&entry.id) {
                Some(resolution) => apply_entry(resolution, date, entry),
                None if store.contains(&entry.id) => Err(TrackerError::Inactive(entry.id)),
                None => Err(TrackerError::NotFound(entry.id)),
            };
            match result {
                Ok(()) => summary.saved.push(id),
                Err(e) => {
                    warn!("Skipping entry: {e}");
                    summary.rejected.push(e);
                }
            }
        }

        store.merge(active);
        self.storage.save(&store).await?;
        debug!(
            "Saved {} entries, rejected {}",
            summary.saved.len(),
            summary.rejected.len()
        );
        Ok(summary)
    }

    /// Flips `is_active` and saves right away. Returns the new state.
    #[instrument(skip(self))]
    pub async fn toggle(&self, id: &ResolutionId) -> Result<bool> {
        let mut store = self.storage.load().await?;
        let resolution = store
            .get_mut(id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))?;
        resolution.is_active = !resolution.is_active;
        let state = resolution.is_active;
        self.storage.save(&store).await?;
        info!("Toggled {id} to {state}");
        Ok(state)
    }
}

/// Deactivates every active resolution past its expiration date. Returns whether anything changed.
pub fn expire(store: &mut ResolutionStore, today: NaiveDate) -> bool {
    let mut changed = false;
    for (id, resolution) in store.iter_mut() {
        if resolution.is_active && resolution.is_expired(today) {
            info!("Resolution {id} expired");
            resolution.is_active = false;
            changed = true;
        }
    }
    changed
}

fn build_draft(
    store: &ResolutionStore,
    NewResolution {
        id,
        description,
        expiration,
        is_binary,
    }: NewResolution,
    today: NaiveDate,
) -> Result<ResolutionDraft> {
    if store.contains(&id) {
        return Err(TrackerError::Duplicate(id).into());
    }
    Ok(ResolutionDraft {
        id,
        resolution: Resolution::new(description, today, expiration, is_binary),
    })
}

/// Binary resolutions only take `Done`. Categorical ones take codes or `Done(false)` for a day
/// that was skipped, every code must be described either already or by the entry itself.
fn apply_entry(
    resolution: &mut Resolution,
    date: NaiveDate,
    LogEntry {
        id,
        value,
        new_codes,
    }: LogEntry,
) -> Result<(), TrackerError> {
    let rejection = match (&value, resolution.is_binary) {
        (LogValue::Done(_), true) | (LogValue::Done(false), false) => None,
        (LogValue::Codes(_), true) => Some("binary resolutions don't take codes"),
        (LogValue::Done(true), false) => Some("categorical resolutions need at least one code"),
        (LogValue::Codes(_), false) => {
            let codes = value.codes();
            if codes.is_empty() {
                Some("no codes were given")
            } else if codes
                .iter()
                .any(|c| !resolution.detail_codes.contains_key(c) && !new_codes.contains_key(c))
            {
                Some("a code has no description")
            } else {
                None
            }
        }
    };
    if let Some(reason) = rejection {
        return Err(TrackerError::InvalidEntry {
            id,
            value,
            reason: reason.into(),
        });
    }

    for (code, description) in new_codes {
        resolution.detail_codes.entry(code).or_insert(description);
    }
    resolution.data.insert(LogDate(date), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use anyhow::Result;
    use chrono::NaiveDate;

    use crate::{
        store::{
            entities::{DetailCode, LogValue, Resolution, ResolutionId, ResolutionStore},
            resolution_storage::MemoryResolutionStorage,
        },
        utils::{
            clock::{FixedClock, MockClock},
            logging::TEST_LOGGING,
        },
    };

    use super::{LogEntry, NewResolution, Tracker, TrackerError};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn id(value: &str) -> ResolutionId {
        ResolutionId::parse(value).unwrap()
    }

    fn tracker_at(
        store: ResolutionStore,
        today: NaiveDate,
    ) -> (Arc<MemoryResolutionStorage>, Tracker<Arc<MemoryResolutionStorage>>) {
        let storage = Arc::new(MemoryResolutionStorage::new(store));
        let tracker = Tracker::new(storage.clone(), Box::new(FixedClock(today)));
        (storage, tracker)
    }

    fn new_resolution(name: &str, is_binary: bool) -> NewResolution {
        NewResolution {
            id: id(name),
            description: format!("do {name}"),
            expiration: None,
            is_binary,
        }
    }

    #[tokio::test]
    async fn test_create_is_two_phase() -> Result<()> {
        let (storage, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        let draft = tracker.draft(new_resolution("exercise", true)).await?;
        assert!(storage.snapshot()?.is_empty());
        assert_eq!(draft.resolution.creation_date, day(1, 1).into());
        assert!(draft.resolution.is_active);
        assert!(draft.preview().contains("expires: never"));

        tracker.commit(draft).await?;
        let store = storage.snapshot()?;
        let exercise = store.get(&id("exercise")).unwrap();
        assert!(exercise.data.is_empty());
        assert!(exercise.detail_codes.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected() -> Result<()> {
        let (_, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        let draft = tracker.draft(new_resolution("exercise", true)).await?;
        tracker.commit(draft.clone()).await?;

        let error = tracker
            .draft(new_resolution("exercise", false))
            .await
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<TrackerError>(),
            Some(&TrackerError::Duplicate(id("exercise")))
        );

        let error = tracker.commit(draft).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<TrackerError>(),
            Some(TrackerError::Duplicate(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() -> Result<()> {
        let (storage, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        tracker
            .commit(tracker.draft(new_resolution("floss", true)).await?)
            .await?;

        assert!(!tracker.toggle(&id("floss")).await?);
        assert!(!storage.snapshot()?.get(&id("floss")).unwrap().is_active);
        assert!(tracker.toggle(&id("floss")).await?);
        assert!(storage.snapshot()?.get(&id("floss")).unwrap().is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_unknown() -> Result<()> {
        let (_, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        let error = tracker.toggle(&id("missing")).await.unwrap_err();
        assert_eq!(
            error.downcast_ref::<TrackerError>(),
            Some(&TrackerError::NotFound(id("missing")))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_active_expires_and_persists() -> Result<()> {
        let mut store = ResolutionStore::new();
        store.insert(
            id("dry_january"),
            Resolution::new("no drinks".into(), day(1, 1), Some(day(1, 31)), true),
        );
        store.insert(
            id("floss"),
            Resolution::new("floss".into(), day(1, 1), None, true),
        );

        let storage = Arc::new(MemoryResolutionStorage::new(store));
        let mut clock = MockClock::new();
        let mut days = vec![day(1, 31), day(2, 1)].into_iter();
        clock
            .expect_today()
            .returning(move || days.next().unwrap_or(day(2, 1)));
        let tracker = Tracker::new(storage.clone(), Box::new(clock));

        assert_eq!(tracker.active().await?.len(), 2);
        let active = tracker.active().await?;
        assert_eq!(active.len(), 1);
        assert!(active.contains(&id("floss")));
        assert!(!storage.snapshot()?.get(&id("dry_january")).unwrap().is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_log_binary_and_categorical() -> Result<()> {
        *TEST_LOGGING;
        let (storage, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        tracker
            .commit(tracker.draft(new_resolution("exercise", true)).await?)
            .await?;
        tracker
            .commit(tracker.draft(new_resolution("writing", false)).await?)
            .await?;

        let r = DetailCode::new('r').unwrap();
        let mut writing = LogEntry::new(id("writing"), LogValue::from_codes(&[r]));
        writing.new_codes.insert(r, "research".into());

        let summary = tracker
            .log(
                day(1, 1),
                vec![LogEntry::new(id("exercise"), LogValue::Done(true)), writing],
            )
            .await?;
        assert_eq!(summary.saved.len(), 2);
        assert!(summary.rejected.is_empty());

        tracker
            .log(
                day(1, 2),
                vec![
                    LogEntry::new(id("exercise"), LogValue::Done(false)),
                    LogEntry::new(id("writing"), LogValue::Done(false)),
                ],
            )
            .await?;

        let store = storage.snapshot()?;
        let writing = store.get(&id("writing")).unwrap();
        assert_eq!(writing.value_on(day(1, 1)), Some(&LogValue::Codes("R".into())));
        assert_eq!(writing.value_on(day(1, 2)), Some(&LogValue::Done(false)));
        assert_eq!(
            writing.detail_codes,
            BTreeMap::from([(r, "research".to_string())])
        );
        let exercise = store.get(&id("exercise")).unwrap();
        assert_eq!(exercise.value_on(day(1, 2)), Some(&LogValue::Done(false)));
        Ok(())
    }

    #[tokio::test]
    async fn test_log_rejects_bad_entries_and_keeps_good_ones() -> Result<()> {
        let (storage, tracker) = tracker_at(ResolutionStore::new(), day(1, 1));
        tracker
            .commit(tracker.draft(new_resolution("exercise", true)).await?)
            .await?;
        tracker
            .commit(tracker.draft(new_resolution("writing", false)).await?)
            .await?;
        tracker
            .commit(tracker.draft(new_resolution("floss", true)).await?)
            .await?;
        tracker.toggle(&id("floss")).await?;

        let summary = tracker
            .log(
                day(1, 1),
                vec![
                    LogEntry::new(id("exercise"), LogValue::Codes("R".into())),
                    LogEntry::new(id("writing"), LogValue::Codes("X".into())),
                    LogEntry::new(id("floss"), LogValue::Done(true)),
                    LogEntry::new(id("unknown"), LogValue::Done(true)),
                    LogEntry::new(id("writing"), LogValue::Done(false)),
                ],
            )
            .await?;

        assert_eq!(summary.saved, vec![id("writing")]);
        assert_eq!(summary.rejected.len(), 4);
        assert!(summary.rejected.contains(&TrackerError::Inactive(id("floss"))));
        assert!(summary.rejected.contains(&TrackerError::NotFound(id("unknown"))));

        let store = storage.snapshot()?;
        assert!(store.get(&id("exercise")).unwrap().data.is_empty());
        assert!(store.get(&id("floss")).unwrap().data.is_empty());
        Ok(())
    }
}
