use lazy_static::lazy_static;
use regex::Regex;

use crate::record::RawRecord;
use crate::text_utils::clean;

lazy_static! {
    // Checked in order, first match wins
    static ref KEYWORD_CATEGORIES: Vec<(Regex, &'static str)> = vec![
        (r"\b(ai|ml|model|gpt|llm|gemini|openai|midjourney)\b", "AI"),
        (r"\b(startup|founder|mvp|launch|growth|pitch|seed|series)\b", "Startup"),
        (r"\b(finance|money|pricing|revenue|profit|invest|budget)\b", "Finance"),
        (r"\b(app|tool|software|code|tech|framework|stack)\b", "Technology"),
        (r"\b(life|habit|health|routine|wellbeing|lifestyle|productivity)\b", "Lifestyle"),
    ].into_iter()
        .map(|(patt, label)| (Regex::new(&format!("(?i){}", patt)).unwrap(), label))
        .collect();
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Category the source declared, looking at the fields in priority order.
pub fn declared_category(record: &RawRecord) -> Option<String> {
    let candidates = [
        record.category.as_ref().and_then(|c| c.first()),
        record.categories.as_ref().and_then(|c| c.first()),
        record.tag.as_ref().and_then(|c| c.first()),
        record.tags.as_ref().and_then(|c| c.first()),
        record.topic.as_deref(),
        record.section.as_deref(),
    ];

    candidates.into_iter()
        .find_map(non_blank)
        .map(|s| s.to_string())
}

pub fn keyword_category(text: &str) -> Option<&'static str> {
    KEYWORD_CATEGORIES.iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, label)| *label)
}

pub fn derive_category(record: &RawRecord, fallback: &str) -> String {
    if let Some(declared) = declared_category(record) {
        return declared;
    }

    let text = format!(
        "{} {}",
        clean(record.title.as_deref().unwrap_or_default()),
        clean(record.description.as_deref().unwrap_or_default()),
    );

    match keyword_category(&text) {
        Some(label) => label.to_string(),
        None => fallback.to_string(),
    }
}
