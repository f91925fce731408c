use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::text_utils::format_timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Num(i64),
    Text(String),
}

impl RecordId {
    /// Ids coming from a url path. All-digit segments are numeric ids.
    pub fn from_path(segment: &str) -> RecordId {
        match segment.parse::<i64>() {
            Ok(n) => RecordId::Num(n),
            Err(_) => RecordId::Text(segment.to_string()),
        }
    }
}

/// Ids for a loaded batch. Explicit ids are kept, a repeated explicit id
/// yields `None` so the caller can drop it. Records without an id get their
/// 1-based position, or the next free number when that one is taken.
pub(crate) fn assign_ids(explicit: &[Option<RecordId>]) -> Vec<Option<RecordId>> {
    let mut taken: HashSet<RecordId> = explicit.iter().flatten().cloned().collect();
    let mut seen = HashSet::new();

    explicit.iter()
        .enumerate()
        .map(|(idx, id)| match id {
            Some(id) => seen.insert(id.clone()).then(|| id.clone()),
            None => {
                let mut n = idx as i64 + 1;
                while taken.contains(&RecordId::Num(n)) {
                    n += 1;
                }
                let id = RecordId::Num(n);
                taken.insert(id.clone());
                Some(id)
            }
        })
        .collect()
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Num(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Fields such as `tags` arrive either as a single label or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn first(&self) -> Option<&str> {
        match self {
            OneOrMany::One(s) => Some(s.as_str()),
            OneOrMany::Many(v) => v.first().map(|s| s.as_str()),
        }
    }
}

/// Record as handed over by the content repository. Nothing is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    pub id: Option<RecordId>,
    #[serde(rename = "_id")]
    pub legacy_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    pub category: Option<OneOrMany>,
    pub categories: Option<OneOrMany>,
    pub tag: Option<OneOrMany>,
    pub tags: Option<OneOrMany>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub topic: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub section: Option<String>,
}

// Wrong-typed values (`"status": true`) are dropped instead of failing the whole batch
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl RawRecord {
    /// `_id` wins over `id`, matching how the public site keys its cards.
    pub fn identity(&self) -> Option<&RecordId> {
        self.legacy_id.as_ref().or(self.id.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
}

impl PublishStatus {
    /// Anything but the exact `published` label is a draft.
    pub fn from_label(label: Option<&str>) -> PublishStatus {
        match label {
            Some("published") => PublishStatus::Published,
            _ => PublishStatus::Draft,
        }
    }

    pub fn flipped(self) -> PublishStatus {
        match self {
            PublishStatus::Draft => PublishStatus::Published,
            PublishStatus::Published => PublishStatus::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
        }
    }
}

pub(crate) fn serialize_timestamp<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_some(&format_timestamp(dt)),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: RecordId,
    pub title: String,
    pub status: PublishStatus,
    pub author: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }

    /// Flips the status and stamps or clears the publish date in one step.
    pub fn flip(&mut self, now: DateTime<Utc>) {
        self.status = self.status.flipped();
        self.published_at = match self.status {
            PublishStatus::Published => Some(now),
            PublishStatus::Draft => None,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Published,
    Draft,
}

impl StatusFilter {
    pub fn from_label(label: &str) -> StatusFilter {
        match label.trim().to_lowercase().as_str() {
            "published" => StatusFilter::Published,
            "draft" | "drafts" => StatusFilter::Draft,
            _ => StatusFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Published => "published",
            StatusFilter::Draft => "draft",
        }
    }

    pub fn accepts(&self, status: PublishStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Published => status == PublishStatus::Published,
            StatusFilter::Draft => status == PublishStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub published: usize,
    pub draft: usize,
}
