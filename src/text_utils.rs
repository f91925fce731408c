use std::ops::Index;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"</?[^>]+(>|$)").unwrap();
    static ref SPACES_REGEX: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_SLUG_REGEX: Regex = Regex::new(r"[^A-Za-z0-9_\s-]").unwrap();
    static ref HYPHENS_REGEX: Regex = Regex::new(r"-+").unwrap();
    static ref DATE_TIME_REGEX: Regex = Regex::new(
        r#"^(\d{4})-(\d{1,2})-(\d{1,2})[ T](\d{1,2}):(\d{1,2}):(\d{1,2})(\.\d{0,3})?$"#
    ).unwrap();
}

pub const NO_DATE: &str = "—";

pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    SPACES_REGEX.replace_all(text, " ").trim().to_string()
}

/// Plain text of an html fragment, on a single line.
pub fn clean(html: &str) -> String {
    collapse_whitespace(&strip_tags(html))
}

pub fn word_count(html: &str) -> usize {
    // Tags become separators, so "<p>a</p><p>b</p>" counts two words
    let text = TAG_REGEX.replace_all(html, " ");
    let text = collapse_whitespace(&text);
    if text.is_empty() {
        return 0;
    }
    text.split(' ').count()
}

pub fn slugify(title: &str) -> String {
    let stripped = strip_tags(title.trim());
    let ascii = unidecode::unidecode(stripped.trim()).to_lowercase();
    let slug = NON_SLUG_REGEX.replace_all(&ascii, "");
    let slug = SPACES_REGEX.replace_all(&slug, "-");
    HYPHENS_REGEX.replace_all(&slug, "-").to_string()
}

pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}…", head)
}

fn to_int<T: std::str::FromStr>(num_str: &str, date_str: &str) -> Result<T, String> {
    match num_str.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => Err(format!("Error parsing {} from the date {}", num_str, date_str)),
    }
}

pub fn parse_date_time(buf: &str) -> Result<NaiveDateTime, String> {
    let Some(caps) = DATE_TIME_REGEX.captures(buf) else {
        return Err(format!("Unable to parse date time {}", buf));
    };

    let to_i32 = |num_str: &str| to_int::<i32>(num_str, buf);
    let to_u32 = |num_str: &str| to_int::<u32>(num_str, buf);

    let y: i32 = to_i32(caps.index(1))?;
    let m: u32 = to_u32(caps.index(2))?;
    let d: u32 = to_u32(caps.index(3))?;
    let h: u32 = to_u32(caps.index(4))?;
    let mn: u32 = to_u32(caps.index(5))?;
    let s: u32 = to_u32(caps.index(6))?;

    let date = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| format!("Invalid date in {}", buf))?;
    let time = NaiveTime::from_hms_opt(h, mn, s)
        .ok_or_else(|| format!("Invalid time in {}", buf))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Accepts RFC 3339 (`2024-01-01T00:00:00.000Z`), a naive `2024-01-01 10:00:00`
/// read as UTC, or a bare `2024-01-01`.
pub fn parse_timestamp(buf: &str) -> Result<DateTime<Utc>, String> {
    let buf = buf.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(buf) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(buf, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    parse_date_time(buf).map(|naive| naive.and_utc())
}

/// `now` moved `days` back, clamped to the earliest instant chrono can hold.
pub fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn format_timestamp(date_time: &DateTime<Utc>) -> String {
    date_time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_short_date(date_time: Option<&DateTime<Utc>>) -> String {
    match date_time {
        Some(dt) => dt.format("%d %b %Y").to_string(),
        None => NO_DATE.to_string(),
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// "19th September, 2025"
pub fn format_ordinal_date(date_time: Option<&DateTime<Utc>>) -> String {
    match date_time {
        Some(dt) => format!("{} {}, {}", ordinal(dt.day()), dt.format("%B"), dt.year()),
        None => NO_DATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_strip_and_clean() {
        assert_eq!(strip_tags("<b>Hi</b> there"), "Hi there");
        assert_eq!(strip_tags("open <i"), "open ");
        assert_eq!(clean("  <p>one\n\n two</p>  three "), "one two three");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("<p></p>"), 0);
        assert_eq!(word_count("<p>one</p><p>two</p>"), 2);
        assert_eq!(word_count("a  b\tc\nd"), 4);

        let text = "<h2>Quick outline</h2> some words here";
        assert_eq!(word_count(text), word_count(text));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!  Foo"), "hello-world-foo");
        assert_eq!(slugify("<b>Rust</b> -- in   production"), "rust-in-production");
        assert_eq!(slugify("Café à la carte"), "cafe-a-la-carte");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 130), "short");
        let long = "x".repeat(131);
        let preview = truncate_preview(&long, 130);
        assert_eq!(preview.chars().count(), 131);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.000Z"), Ok(expected));
        assert_eq!(parse_timestamp("2024-01-01"), Ok(expected));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00.000"), Ok(expected));
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-13-01 00:00:00").is_err());
        assert!(parse_timestamp("x2024-01-01 10:00:00garbage").is_err());
        assert!(parse_timestamp("2024-01-01 10:00:00 and more").is_err());
    }

    #[test]
    fn test_days_before() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(days_before(now, 0), now);
        assert_eq!(days_before(now, 31), Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(days_before(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(days_before(now, 4_000_000_000), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_format_dates() {
        let dt = Utc.with_ymd_and_hms(2025, 9, 19, 8, 30, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "2025-09-19T08:30:00.000Z");
        assert_eq!(format_short_date(Some(&dt)), "19 Sep 2025");
        assert_eq!(format_ordinal_date(Some(&dt)), "19th September, 2025");
        assert_eq!(format_ordinal_date(None), "—");

        let dt = Utc.with_ymd_and_hms(2025, 3, 22, 0, 0, 0).unwrap();
        assert_eq!(format_ordinal_date(Some(&dt)), "22nd March, 2025");
        let dt = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(format_ordinal_date(Some(&dt)), "11th March, 2025");
    }
}
