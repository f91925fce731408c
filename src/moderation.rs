use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spdlog::{debug, info, warn};

use crate::optimistic::{lock, Begin, InFlight, Keyed, OptimisticList};
use crate::persistence::{Collection, PersistError, PersistenceEndpoint, StatusChange};
use crate::record::{assign_ids, lenient_string, serialize_timestamp, RecordId};
use crate::text_utils::{parse_timestamp, strip_tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Approved,
    Pending,
    Rejected,
}

impl ModerationStatus {
    pub fn from_label(label: &str) -> Option<ModerationStatus> {
        match label.trim().to_lowercase().as_str() {
            "approved" | "approve" => Some(ModerationStatus::Approved),
            "pending" => Some(ModerationStatus::Pending),
            "rejected" | "reject" => Some(ModerationStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Approved => "approved",
            ModerationStatus::Pending => "pending",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationFilter {
    #[default]
    All,
    Only(ModerationStatus),
}

impl ModerationFilter {
    pub fn from_label(label: &str) -> ModerationFilter {
        match ModerationStatus::from_label(label) {
            Some(status) => ModerationFilter::Only(status),
            None => ModerationFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationFilter::All => "all",
            ModerationFilter::Only(status) => status.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub blog_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: RecordId,
    pub blog_title: String,
    pub author: String,
    pub content: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub date: Option<DateTime<Utc>>,
    pub status: ModerationStatus,
}

impl Keyed for CommentRecord {
    fn key(&self) -> &RecordId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModerationCounts {
    pub all: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    Committed(CommentRecord),
    Busy,
    NotFound,
    RolledBack(PersistError),
}

fn plain(value: &Option<String>) -> String {
    strip_tags(value.as_deref().unwrap_or_default()).trim().to_string()
}

pub fn load(raw_comments: &[RawComment]) -> Vec<CommentRecord> {
    let explicit: Vec<_> = raw_comments.iter().map(|raw| raw.id.clone()).collect();
    let mut comments = Vec::with_capacity(raw_comments.len());

    for (idx, (raw, id)) in raw_comments.iter().zip(assign_ids(&explicit)).enumerate() {
        let id = match (id, &raw.id) {
            (Some(id), _) => id,
            (None, taken) => {
                if let Some(taken) = taken {
                    warn!("Dropping comment #{}: id {} is already taken", idx + 1, taken);
                }
                continue;
            }
        };

        let status = raw.status.as_deref()
            .and_then(ModerationStatus::from_label)
            .unwrap_or(ModerationStatus::Pending);

        let date = raw.date.as_deref().and_then(|date| match parse_timestamp(date) {
            Ok(dt) => Some(dt),
            Err(e) => {
                warn!("Comment {}: ignoring date: {}", id, e);
                None
            }
        });

        let author = plain(&raw.author);
        comments.push(CommentRecord {
            id,
            blog_title: plain(&raw.blog_title),
            author: if author.is_empty() { "Anonymous".to_string() } else { author },
            content: plain(&raw.content),
            date,
            status,
        });
    }

    comments
}

pub fn filter(list: &[CommentRecord], status_filter: ModerationFilter) -> Vec<CommentRecord> {
    list.iter()
        .filter(|comment| match status_filter {
            ModerationFilter::All => true,
            ModerationFilter::Only(status) => comment.status == status,
        })
        .cloned()
        .collect()
}

pub fn search(list: &[CommentRecord], query: &str) -> Vec<CommentRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return list.to_vec();
    }

    list.iter()
        .filter(|comment| {
            comment.author.to_lowercase().contains(&needle)
                || comment.content.to_lowercase().contains(&needle)
                || comment.blog_title.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn count_by_status(list: &[CommentRecord]) -> ModerationCounts {
    let count = |status: ModerationStatus| list.iter().filter(|c| c.status == status).count();
    ModerationCounts {
        all: list.len(),
        approved: count(ModerationStatus::Approved),
        pending: count(ModerationStatus::Pending),
        rejected: count(ModerationStatus::Rejected),
    }
}

#[derive(Debug, Default)]
pub struct ModerationQueue {
    comments: OptimisticList<CommentRecord>,
}

impl AsMut<OptimisticList<CommentRecord>> for ModerationQueue {
    fn as_mut(&mut self) -> &mut OptimisticList<CommentRecord> {
        &mut self.comments
    }
}

impl ModerationQueue {
    pub fn from_raw(raw_comments: &[RawComment]) -> Self {
        ModerationQueue {
            comments: OptimisticList::new(load(raw_comments)),
        }
    }

    pub fn comments(&self) -> &[CommentRecord] {
        self.comments.items()
    }

    pub fn get(&self, id: &RecordId) -> Option<&CommentRecord> {
        self.comments.get(id)
    }

    /// Id named by a url path segment. Unknown segments still map to an id,
    /// which the transition then reports as not found.
    pub fn resolve_id(&self, segment: &str) -> RecordId {
        self.comments.resolve(segment).unwrap_or_else(|| RecordId::from_path(segment))
    }

    pub fn is_working(&self, id: &RecordId) -> bool {
        self.comments.is_working(id)
    }

    pub fn counts(&self) -> ModerationCounts {
        count_by_status(self.comments())
    }

    pub fn view(&self, status_filter: ModerationFilter, query: &str) -> Vec<CommentRecord> {
        search(&filter(self.comments(), status_filter), query)
    }

    pub fn begin_update(&mut self, id: &RecordId, status: ModerationStatus) -> Begin<CommentRecord> {
        let begin = self.comments.begin(id, |comment| comment.status = status);
        if let Begin::Busy = begin {
            debug!("Comment {} is already being moderated", id);
        }
        begin
    }
}

/// Moves a comment to `status`, optimistically, and confirms it with `endpoint`.
pub async fn set_status<P>(queue: &Mutex<ModerationQueue>, endpoint: &P, id: &RecordId, status: ModerationStatus) -> ModerationOutcome
    where
        P: PersistenceEndpoint,
{
    match lock(queue).begin_update(id, status) {
        Begin::Started(_) => {}
        Begin::Busy => return ModerationOutcome::Busy,
        Begin::NotFound => return ModerationOutcome::NotFound,
    }
    let in_flight: InFlight<'_, ModerationQueue, CommentRecord> = InFlight::new(queue, id.clone());

    let change = StatusChange {
        collection: Collection::Comments,
        id,
        status: status.as_str(),
    };

    match endpoint.persist_status(change).await {
        Ok(()) => match in_flight.commit() {
            Some(comment) => {
                info!("Comment {} is now {}", id, comment.status.as_str());
                ModerationOutcome::Committed(comment)
            }
            None => ModerationOutcome::NotFound,
        },
        Err(e) => {
            warn!("Comment {} restored after failed moderation: {}", id, e);
            in_flight.rollback();
            ModerationOutcome::RolledBack(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Persistence;
    use crate::persistence::SimulatedEndpoint;
    use crate::test_data::raw_comments;

    use super::*;

    #[test]
    fn test_load_defaults_to_pending() {
        let comments = load(&raw_comments());
        assert_eq!(comments.len(), 4);
        assert_eq!(comments[3].status, ModerationStatus::Pending);
        assert_eq!(comments[3].date, None);
        assert!(comments[0].date.is_some());

        let anonymous = load(&[RawComment::default()]);
        assert_eq!(anonymous[0].id, RecordId::Num(1));
        assert_eq!(anonymous[0].author, "Anonymous");
    }

    #[test]
    fn test_load_keeps_explicit_id_over_position() {
        let raw: Vec<RawComment> = serde_json::from_str(r#"[
            {"author": "Eve", "content": "no id"},
            {"id": 1, "author": "Finn", "content": "explicit one"},
            {"id": 1, "author": "Gus", "content": "repeated"}
        ]"#).unwrap();
        let comments = load(&raw);

        let loaded: Vec<_> = comments.iter().map(|c| (c.id.clone(), c.author.as_str())).collect();
        assert_eq!(loaded, vec![(RecordId::Num(2), "Eve"), (RecordId::Num(1), "Finn")]);
    }

    #[test]
    fn test_filter_search_counts() {
        let comments = load(&raw_comments());

        let pending = filter(&comments, ModerationFilter::from_label("pending"));
        let ids: Vec<_> = pending.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![RecordId::Num(2), RecordId::Num(4)]);

        // author, body and post title are all searched
        assert_eq!(search(&comments, "bob").len(), 1);
        assert_eq!(search(&comments, "AI TOOLS").len(), 1);
        assert_eq!(search(&comments, "code review")[0].id, RecordId::Num(4));
        assert_eq!(search(&comments, "").len(), 4);

        let counts = count_by_status(&comments);
        assert_eq!(counts, ModerationCounts { all: 4, approved: 1, pending: 2, rejected: 1 });
        assert_eq!(counts.approved + counts.pending + counts.rejected, counts.all);
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = ModerationQueue::default();
        assert!(queue.comments().is_empty());
        assert_eq!(queue.counts(), ModerationCounts::default());
        assert_eq!(queue.begin_update(&RecordId::Num(1), ModerationStatus::Approved), Begin::NotFound);
    }

    #[test]
    fn test_begin_update_single_flight() {
        let mut queue = ModerationQueue::from_raw(&raw_comments());
        let id = RecordId::Num(2);

        assert!(matches!(queue.begin_update(&id, ModerationStatus::Approved), Begin::Started(_)));
        assert_eq!(queue.get(&id).unwrap().status, ModerationStatus::Approved);
        assert_eq!(queue.begin_update(&id, ModerationStatus::Rejected), Begin::Busy);
        assert_eq!(queue.get(&id).unwrap().status, ModerationStatus::Approved);
    }

    #[tokio::test]
    async fn test_set_status_commits() {
        let queue = Mutex::new(ModerationQueue::from_raw(&raw_comments()));
        let endpoint = SimulatedEndpoint::default();
        let id = RecordId::Num(2);

        let outcome = set_status(&queue, &endpoint, &id, ModerationStatus::Approved).await;
        let ModerationOutcome::Committed(comment) = outcome else {
            panic!("moderation should commit");
        };
        assert_eq!(comment.status, ModerationStatus::Approved);
        assert_eq!(lock(&queue).counts().approved, 2);
        assert!(!lock(&queue).is_working(&id));
    }

    #[tokio::test]
    async fn test_set_status_rolls_back() {
        let queue = Mutex::new(ModerationQueue::from_raw(&raw_comments()));
        let before = lock(&queue).comments().to_vec();
        let endpoint = SimulatedEndpoint::new(&Persistence {
            latency_ms: 0,
            failing_ids: vec!["3".to_string()],
        });
        let id = RecordId::Num(3);

        let outcome = set_status(&queue, &endpoint, &id, ModerationStatus::Approved).await;
        assert!(matches!(outcome, ModerationOutcome::RolledBack(_)));
        assert_eq!(lock(&queue).comments(), before.as_slice());

        let outcome = set_status(&queue, &endpoint, &RecordId::Num(42), ModerationStatus::Approved).await;
        assert_eq!(outcome, ModerationOutcome::NotFound);
    }
}
