use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spdlog::{info, warn};
use uuid::Uuid;

use crate::persistence::{PersistError, PersistenceEndpoint};
use crate::record::{serialize_timestamp, ContentRecord, PublishStatus, RecordId};
use crate::text_utils::{clean, collapse_whitespace, slugify, word_count};

pub const CATEGORIES: [&str; 6] = ["Productivity", "AI", "Tech", "Lifestyle", "Career", "Startups"];

const MIN_TITLE_CHARS: usize = 4;
const MIN_PUBLISH_WORDS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum DraftError {
    NotReady(String),
    Persist(PersistError),
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DraftError::NotReady(reason) => write!(f, "draft is not ready to publish: {}", reason),
            DraftError::Persist(e) => write!(f, "{}", e),
        }
    }
}

impl Error for DraftError {}

impl From<PersistError> for DraftError {
    fn from(e: PersistError) -> Self {
        DraftError::Persist(e)
    }
}

/// A post being written. The slug follows the title until it is edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub slug: String,
    #[serde(skip)]
    slug_edited: bool,
    pub category: String,
    pub tags: Vec<String>,
    pub status: PublishStatus,
    #[serde(serialize_with = "serialize_timestamp")]
    pub publish_at: Option<DateTime<Utc>>,
    pub content: String,
    #[serde(skip)]
    dirty: bool,
}

impl Default for PostDraft {
    fn default() -> Self {
        PostDraft::new()
    }
}

impl PostDraft {
    pub fn new() -> Self {
        PostDraft {
            id: Uuid::new_v4(),
            title: String::new(),
            subtitle: String::new(),
            slug: String::new(),
            slug_edited: false,
            category: CATEGORIES[0].to_string(),
            tags: vec![],
            status: PublishStatus::Draft,
            publish_at: None,
            content: String::new(),
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        if !self.slug_edited {
            self.slug = slugify(title);
        }
        self.dirty = true;
    }

    pub fn set_subtitle(&mut self, subtitle: &str) {
        self.subtitle = subtitle.to_string();
        self.dirty = true;
    }

    /// A hand-written slug sticks: later title changes leave it alone.
    pub fn set_slug(&mut self, slug: &str) {
        self.slug = slugify(slug);
        self.slug_edited = true;
        self.dirty = true;
    }

    pub fn set_category(&mut self, category: &str) {
        self.category = category.trim().to_string();
        self.dirty = true;
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = collapse_whitespace(tag).trim().to_string();
        if tag.is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        self.dirty = true;
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        let removed = self.tags.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.dirty = true;
    }

    pub fn schedule(&mut self, publish_at: Option<DateTime<Utc>>) {
        self.publish_at = publish_at;
        self.dirty = true;
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.content)
    }

    fn readiness(&self) -> Result<(), String> {
        if clean(&self.title).chars().count() < MIN_TITLE_CHARS {
            return Err(format!("title needs at least {} characters", MIN_TITLE_CHARS));
        }
        let words = self.word_count();
        if words < MIN_PUBLISH_WORDS {
            return Err(format!("content has {} words, {} needed", words, MIN_PUBLISH_WORDS));
        }
        Ok(())
    }

    pub fn can_publish(&self) -> bool {
        self.readiness().is_ok()
    }

    pub async fn save_draft<P: PersistenceEndpoint>(&mut self, endpoint: &P) -> Result<(), DraftError> {
        endpoint.persist_draft(self).await?;
        self.dirty = false;
        info!("Draft {} saved", self.id);
        Ok(())
    }

    /// Publishes the draft now, or at the scheduled date when one is set.
    /// A refused publish leaves the draft as it was.
    pub async fn publish<P: PersistenceEndpoint>(&mut self, endpoint: &P, now: DateTime<Utc>) -> Result<(), DraftError> {
        self.readiness().map_err(DraftError::NotReady)?;

        let previous = (self.status, self.publish_at);
        self.status = PublishStatus::Published;
        self.publish_at = Some(self.publish_at.unwrap_or(now));

        if let Err(e) = endpoint.persist_draft(self).await {
            warn!("Draft {} was not published: {}", self.id, e);
            (self.status, self.publish_at) = previous;
            return Err(e.into());
        }

        self.dirty = false;
        info!("Draft {} published as {}", self.id, self.slug);
        Ok(())
    }

    pub fn to_record(&self, author: &str) -> ContentRecord {
        ContentRecord {
            id: RecordId::Text(self.id.to_string()),
            title: clean(&self.title),
            status: self.status,
            author: author.to_string(),
            published_at: match self.status {
                PublishStatus::Published => self.publish_at,
                PublishStatus::Draft => None,
            },
        }
    }
}
