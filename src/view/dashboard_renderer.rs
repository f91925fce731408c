use std::io;
use std::io::ErrorKind;

use ramhorns::Template;

use crate::moderation::ModerationCounts;
use crate::record::{ContentRecord, PublishStatus, StatusCounts, StatusFilter};
use crate::text_utils::format_ordinal_date;

pub const DASHBOARD_TEMPLATE: &str = include_str!("../../res/dashboard.tpl");

#[derive(ramhorns::Content)]
struct ViewTab {
    title: &'static str,
    href: String,
    count: usize,
    active: bool,
}

#[derive(ramhorns::Content)]
struct ViewRow<'a> {
    position: usize,
    id: String,
    title: &'a str,
    author: &'a str,
    date: String,
    status: &'static str,
    action: &'static str,
    working: bool,
}

#[derive(ramhorns::Content)]
struct DashboardPage<'a> {
    filter: &'static str,
    query: &'a str,
    tabs: Vec<ViewTab>,
    rows: Vec<ViewRow<'a>>,
    approved: usize,
    pending: usize,
    rejected: usize,
}

/// One post on the dashboard and whether a toggle is in flight for it.
pub struct DashboardRow<'a> {
    pub record: &'a ContentRecord,
    pub working: bool,
}

pub struct DashboardRenderer<'a> {
    pub template: Template<'a>,
}

fn tab_href(filter: StatusFilter, query: &str) -> String {
    let params = [("filter", filter.as_str()), ("q", query)];
    match serde_urlencoded::to_string(params) {
        Ok(encoded) => format!("/?{}", encoded),
        Err(_) => format!("/?filter={}", filter.as_str()),
    }
}

impl DashboardRenderer<'_> {
    pub fn new(tpl_src: &str) -> io::Result<DashboardRenderer> {
        let template = match Template::new(tpl_src) {
            Ok(x) => x,
            Err(e) => {
                return Err(io::Error::new(ErrorKind::InvalidInput, format!("Error parsing dashboard template: {}", e)));
            }
        };

        Ok(DashboardRenderer {
            template,
        })
    }

    pub fn render(&self,
                  rows: &[DashboardRow],
                  counts: StatusCounts,
                  comments: ModerationCounts,
                  active: StatusFilter,
                  query: &str) -> String {
        let tabs = [
            (StatusFilter::All, "All", counts.all),
            (StatusFilter::Published, "Published", counts.published),
            (StatusFilter::Draft, "Drafts", counts.draft),
        ].into_iter()
            .map(|(filter, title, count)| ViewTab {
                title,
                href: tab_href(filter, query),
                count,
                active: filter == active,
            })
            .collect();

        let rows = rows.iter()
            .enumerate()
            .map(|(idx, row)| ViewRow {
                position: idx + 1,
                id: row.record.id.to_string(),
                title: row.record.title.as_str(),
                author: row.record.author.as_str(),
                date: format_ordinal_date(row.record.published_at.as_ref()),
                status: row.record.status.as_str(),
                action: match row.record.status {
                    PublishStatus::Published => "Unpublish",
                    PublishStatus::Draft => "Publish",
                },
                working: row.working,
            })
            .collect();

        self.template.render(&DashboardPage {
            filter: active.as_str(),
            query,
            tabs,
            rows,
            approved: comments.approved,
            pending: comments.pending,
            rejected: comments.rejected,
        })
    }
}
