use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Derive;
use crate::record::{serialize_timestamp, RawRecord};
use crate::text_utils::{days_before, word_count};

pub mod category;
pub mod seed;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMeta {
    #[serde(serialize_with = "serialize_timestamp")]
    pub date: Option<DateTime<Utc>>,
    pub reading_time_minutes: u32,
    pub rating: f32,
    pub read_count: u64,
}

/// Fills display fields the content repository does not provide.
///
/// Every value is a function of the record identity, its text and the `now`
/// passed in. Nothing here fails: missing input degrades to a default.
#[derive(Debug, Clone, Default)]
pub struct MetadataDeriver {
    settings: Derive,
}

impl MetadataDeriver {
    pub fn new(settings: Derive) -> Self {
        MetadataDeriver { settings }
    }

    pub fn settings(&self) -> &Derive {
        &self.settings
    }

    pub fn derive_author(&self, key: &str) -> String {
        let authors = &self.settings.fallback_authors;
        match authors.get(seed::bucket(key, authors.len())) {
            Some(author) => author.clone(),
            None => "Unknown".to_string(),
        }
    }

    pub fn derive_category(&self, record: &RawRecord) -> String {
        category::derive_category(record, &self.settings.fallback_category)
    }

    pub fn reading_time(&self, text: &str) -> u32 {
        let wpm = self.settings.words_per_minute.max(1) as f64;
        let minutes = (word_count(text) as f64 / wpm).round() as u32;
        minutes.max(1)
    }

    pub fn derive_engagement_meta(&self, key: &str, text: &str, now: DateTime<Utc>) -> EngagementMeta {
        let window = self.settings.backdate_window_days as f64;
        let days_back = (seed::seed01(key, "date") * window).floor() as i64;
        let date = days_before(now, days_back);

        let steps = &self.settings.rating_steps;
        let step = (seed::seed01(key, "star") * steps.len() as f64).floor() as usize;
        let rating = steps.get(step).or(steps.last()).copied().unwrap_or(5.0);

        let ceiling = self.settings.read_count_ceiling as f64;
        let read_count = self.settings.read_count_base.saturating_add((seed::seed01(key, "reads") * ceiling).floor() as u64);

        EngagementMeta {
            date: Some(date),
            reading_time_minutes: self.reading_time(text),
            rating,
            read_count,
        }
    }
}
