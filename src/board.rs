//! Canonical post list of an admin session and its publish transitions.
//!
//! # Invariants
//! - `published_at` is set iff the status is `published`; both fields change
//!   together, synchronously, before the persistence call is issued.
//! - At most one outstanding transition per post id.
//! - A failed persistence call restores the list saved when the transition
//!   began.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use spdlog::{debug, info, warn};

use crate::meta::MetadataDeriver;
use crate::optimistic::{lock, Begin, InFlight, Keyed, OptimisticList};
use crate::persistence::{Collection, PersistError, PersistenceEndpoint, StatusChange};
use crate::record::{assign_ids, ContentRecord, PublishStatus, RawRecord, RecordId, StatusCounts, StatusFilter};
use crate::text_utils::{days_before, parse_timestamp, strip_tags};

impl Keyed for ContentRecord {
    fn key(&self) -> &RecordId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Committed(ContentRecord),
    /// A toggle for the same post is still outstanding; nothing changed
    Busy,
    /// No post with that id; nothing changed
    NotFound,
    /// The endpoint refused the change and the list was restored
    RolledBack(PersistError),
}

fn normalize(raw: &RawRecord, id: RecordId, idx: usize, deriver: &MetadataDeriver, now: DateTime<Utc>) -> ContentRecord {
    let position = idx + 1;

    let title = strip_tags(raw.title.as_deref().unwrap_or_default()).trim().to_string();
    let title = if title.is_empty() { format!("Untitled #{}", position) } else { title };

    let status = PublishStatus::from_label(raw.status.as_deref());

    let author = strip_tags(raw.author.as_deref().unwrap_or_default()).trim().to_string();
    let author = if author.is_empty() {
        let key = match raw.identity() {
            Some(key) => key.to_string(),
            None => title.clone(),
        };
        deriver.derive_author(&key)
    } else {
        author
    };

    let published_at = match status {
        PublishStatus::Draft => None,
        PublishStatus::Published => {
            let source_date = raw.date.as_deref().and_then(|date| match parse_timestamp(date) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    warn!("Post {}: ignoring publish date: {}", id, e);
                    None
                }
            });
            let spacing = deriver.settings().publish_seed_spacing_days as i64;
            Some(source_date.unwrap_or_else(|| days_before(now, (idx as i64).saturating_mul(spacing).saturating_add(1))))
        }
    };

    ContentRecord {
        id,
        title,
        status,
        author,
        published_at,
    }
}

/// Normalizes raw repository records. Later duplicates of an explicit id are
/// dropped; records without an id never displace one that has it.
pub fn load(raw_records: &[RawRecord], deriver: &MetadataDeriver, now: DateTime<Utc>) -> Vec<ContentRecord> {
    let explicit: Vec<_> = raw_records.iter().map(|raw| raw.id.clone()).collect();
    let mut records = Vec::with_capacity(raw_records.len());

    for (idx, (raw, id)) in raw_records.iter().zip(assign_ids(&explicit)).enumerate() {
        match (id, &raw.id) {
            (Some(id), _) => records.push(normalize(raw, id, idx, deriver, now)),
            (None, Some(taken)) => warn!("Dropping post #{}: id {} is already taken", idx + 1, taken),
            (None, None) => {}
        }
    }

    records
}

pub fn filter(list: &[ContentRecord], status_filter: StatusFilter) -> Vec<ContentRecord> {
    list.iter()
        .filter(|record| status_filter.accepts(record.status))
        .cloned()
        .collect()
}

pub fn search(list: &[ContentRecord], query: &str) -> Vec<ContentRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return list.to_vec();
    }

    list.iter()
        .filter(|record| {
            record.title.to_lowercase().contains(&needle)
                || record.author.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn count_by_status(list: &[ContentRecord]) -> StatusCounts {
    let published = list.iter().filter(|record| record.is_published()).count();
    StatusCounts {
        all: list.len(),
        published,
        draft: list.len() - published,
    }
}

#[derive(Debug, Default)]
pub struct PublishBoard {
    records: OptimisticList<ContentRecord>,
}

impl AsMut<OptimisticList<ContentRecord>> for PublishBoard {
    fn as_mut(&mut self) -> &mut OptimisticList<ContentRecord> {
        &mut self.records
    }
}

impl PublishBoard {
    pub fn new(records: Vec<ContentRecord>) -> Self {
        PublishBoard {
            records: OptimisticList::new(records),
        }
    }

    pub fn from_raw(raw_records: &[RawRecord], deriver: &MetadataDeriver, now: DateTime<Utc>) -> Self {
        Self::new(load(raw_records, deriver, now))
    }

    pub fn records(&self) -> &[ContentRecord] {
        self.records.items()
    }

    pub fn get(&self, id: &RecordId) -> Option<&ContentRecord> {
        self.records.get(id)
    }

    /// Id named by a url path segment. Unknown segments still map to an id,
    /// which the transition then reports as not found.
    pub fn resolve_id(&self, segment: &str) -> RecordId {
        self.records.resolve(segment).unwrap_or_else(|| RecordId::from_path(segment))
    }

    pub fn is_working(&self, id: &RecordId) -> bool {
        self.records.is_working(id)
    }

    pub fn counts(&self) -> StatusCounts {
        count_by_status(self.records())
    }

    /// Filtered, searched copy of the list for a view.
    pub fn view(&self, status_filter: StatusFilter, query: &str) -> Vec<ContentRecord> {
        search(&filter(self.records(), status_filter), query)
    }

    pub fn add(&mut self, record: ContentRecord) -> bool {
        let id = record.id.clone();
        let added = self.records.push(record);
        if !added {
            warn!("Post {} is already on the board", id);
        }
        added
    }

    /// Synchronous half of a toggle: flips the post and marks it working.
    pub fn begin_toggle(&mut self, id: &RecordId, now: DateTime<Utc>) -> Begin<ContentRecord> {
        let begin = self.records.begin(id, |record| record.flip(now));
        match begin {
            Begin::Started(ref record) => debug!("Toggling post {} to {}", id, record.status.as_str()),
            Begin::Busy => debug!("Post {} is already being toggled", id),
            Begin::NotFound => debug!("Toggle for unknown post {}", id),
        }
        begin
    }

    pub fn finish_toggle(&mut self, id: &RecordId, result: Result<(), PersistError>) -> ToggleOutcome {
        match result {
            Ok(()) => match self.records.commit(id) {
                Some(record) => ToggleOutcome::Committed(record),
                None => ToggleOutcome::NotFound,
            },
            Err(e) => {
                self.records.rollback(id);
                ToggleOutcome::RolledBack(e)
            }
        }
    }
}

/// Flips a post between draft and published and confirms it with `endpoint`.
///
/// The board lock is only held before and after the persistence call.
pub async fn toggle<P>(board: &Mutex<PublishBoard>, endpoint: &P, id: &RecordId) -> ToggleOutcome
    where
        P: PersistenceEndpoint,
{
    let status = match lock(board).begin_toggle(id, Utc::now()) {
        Begin::Started(record) => record.status,
        Begin::Busy => return ToggleOutcome::Busy,
        Begin::NotFound => return ToggleOutcome::NotFound,
    };
    let in_flight: InFlight<'_, PublishBoard, ContentRecord> = InFlight::new(board, id.clone());

    let change = StatusChange {
        collection: Collection::Posts,
        id,
        status: status.as_str(),
    };

    match endpoint.persist_status(change).await {
        Ok(()) => match in_flight.commit() {
            Some(record) => {
                info!("Post {} is now {}", id, record.status.as_str());
                ToggleOutcome::Committed(record)
            }
            None => ToggleOutcome::NotFound,
        },
        Err(e) => {
            warn!("Post {} restored after failed toggle: {}", id, e);
            in_flight.rollback();
            ToggleOutcome::RolledBack(e)
        }
    }
}
