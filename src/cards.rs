use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::meta::{EngagementMeta, MetadataDeriver};
use crate::record::{RawRecord, RecordId};
use crate::text_utils::{clean, slugify, truncate_preview};

pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: Option<RecordId>,
    pub title: String,
    pub slug: String,
    pub preview: String,
    pub image: Option<String>,
    pub category: String,
    pub meta: EngagementMeta,
}

impl CardView {
    /// Card for a public blog entry. Entries without a title or a description
    /// are not shown.
    pub fn from_raw(raw: &RawRecord, deriver: &MetadataDeriver, now: DateTime<Utc>) -> Option<CardView> {
        let title = clean(raw.title.as_deref().unwrap_or_default());
        let description = clean(raw.description.as_deref().unwrap_or_default());
        if title.is_empty() || description.is_empty() {
            return None;
        }

        let key = match raw.identity() {
            Some(id) => id.to_string(),
            None => title.clone(),
        };

        Some(CardView {
            id: raw.identity().cloned(),
            slug: slugify(&title),
            preview: truncate_preview(&description, deriver.settings().preview_chars),
            image: raw.image.clone().filter(|image| !image.trim().is_empty()),
            category: deriver.derive_category(raw),
            meta: deriver.derive_engagement_meta(&key, &description, now),
            title,
        })
    }
}

pub fn build_cards(raw_blogs: &[RawRecord], deriver: &MetadataDeriver, now: DateTime<Utc>) -> Vec<CardView> {
    raw_blogs.iter()
        .filter_map(|raw| CardView::from_raw(raw, deriver, now))
        .collect()
}

fn norm(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Cards of one category, `All` keeps everything.
pub fn in_category(cards: &[CardView], category: &str) -> Vec<CardView> {
    let wanted = norm(category);
    if wanted.is_empty() || wanted == norm(ALL_CATEGORIES) {
        return cards.to_vec();
    }

    cards.iter()
        .filter(|card| norm(&card.category) == wanted)
        .cloned()
        .collect()
}

/// Categories present in `cards`, in first-seen order, after `All`.
pub fn category_labels(cards: &[CardView]) -> Vec<String> {
    let mut labels = vec![ALL_CATEGORIES.to_string()];
    for card in cards {
        if !labels.iter().any(|label| norm(label) == norm(&card.category)) {
            labels.push(card.category.clone());
        }
    }
    labels
}
