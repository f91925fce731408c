#![cfg(test)]

use crate::moderation::RawComment;
use crate::record::RawRecord;

pub const POSTS_JSON: &str = r#"[
    {"id": 1, "title": "<b>Hi</b> there"},
    {"id": 2, "title": "X", "status": "published", "date": "2024-01-01T00:00:00.000Z"}
]"#;

pub const DASHBOARD_POSTS_JSON: &str = r#"[
    {"id": 1, "title": "A detailed step by step guide to manage your lifestyle", "author": "Thiago Guedes", "status": "draft"},
    {"id": 2, "title": "How to write a Code Review", "author": "Thiago Guedes", "status": "published", "date": "2020-05-22T10:54:25.000Z"},
    {"id": 3, "title": "How to create an effective startup roadmap", "author": "Ana Lima", "status": "published"},
    {"id": 4, "title": "Learning new technology to boost your career", "status": "pending"},
    {"id": 5, "title": "Tips for getting started with <i>Rust</i>", "author": "Ana Lima", "status": "published", "date": "2024-02-27 06:20:53.000"}
]"#;

pub const COMMENTS_JSON: &str = r#"[
    {"id": 1, "blogTitle": "A detailed step by step guide to manage your lifestyle", "author": "Alice", "content": "Great article! Helped me a lot.", "date": "2025-05-30T10:00:00.000Z", "status": "approved"},
    {"id": 2, "blogTitle": "Learning new technology to boost your career in software", "author": "Bob", "content": "Can you also cover AI tools in the next blog?", "date": "2025-05-29T10:00:00.000Z", "status": "pending"},
    {"id": 3, "blogTitle": "How to create an effective startup roadmap or ideas", "author": "Charlie", "content": "Not sure I agree with point 3.", "date": "2025-05-28T10:00:00.000Z", "status": "rejected"},
    {"id": 4, "blogTitle": "How to write a Code Review", "author": "Dana", "content": "Bookmarked.", "status": "spam"}
]"#;

pub const BLOGS_JSON: &str = r#"[
    {"_id": "6805f9", "title": "A detailed step by step guide to manage your lifestyle", "description": "<p>Small changes to your daily routine add up over the years.</p>", "image": "blog_pic_1.png", "category": "Lifestyle"},
    {"_id": "6805fa", "title": "Learning new technology to boost your career in software", "description": "<p>Picking a new framework every year is a habit worth keeping.</p>", "image": "blog_pic_2.png"},
    {"_id": "6805fb", "title": "Untold ideas", "description": "<p>Thoughts on writing.</p>"},
    {"_id": "6805fc", "title": "<p></p>", "description": "<p>No title at all</p>"},
    {"_id": "6805fd", "title": "Nothing to say", "description": "   "}
]"#;

pub fn raw_posts() -> Vec<RawRecord> {
    serde_json::from_str(POSTS_JSON).unwrap()
}

pub fn raw_dashboard_posts() -> Vec<RawRecord> {
    serde_json::from_str(DASHBOARD_POSTS_JSON).unwrap()
}

pub fn raw_comments() -> Vec<RawComment> {
    serde_json::from_str(COMMENTS_JSON).unwrap()
}

pub fn raw_blogs() -> Vec<RawRecord> {
    serde_json::from_str(BLOGS_JSON).unwrap()
}
