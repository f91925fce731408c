use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::{fs, io};

use chrono::Utc;
use ntex::web;
use ntex::web::HttpRequest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spdlog::{error, info};

use crate::board::{toggle, PublishBoard, ToggleOutcome};
use crate::cards::{build_cards, category_labels, in_category, CardView};
use crate::config::{Config, Derive, Persistence};
use crate::editor::{DraftError, PostDraft};
use crate::meta::MetadataDeriver;
use crate::moderation::{set_status, ModerationFilter, ModerationOutcome, ModerationQueue, ModerationStatus, RawComment};
use crate::optimistic::lock;
use crate::persistence::SimulatedEndpoint;
use crate::query_string::QueryString;
use crate::record::{ContentRecord, RawRecord, StatusFilter};
use crate::text_utils::parse_timestamp;
use crate::view::dashboard_renderer::{DashboardRenderer, DashboardRow, DASHBOARD_TEMPLATE};

struct AppState {
    board: Mutex<PublishBoard>,
    comments: Mutex<ModerationQueue>,
    cards: Vec<CardView>,
    deriver: MetadataDeriver,
    endpoint: SimulatedEndpoint,
}

#[derive(Serialize)]
struct PostRow<'a> {
    #[serde(flatten)]
    record: &'a ContentRecord,
    working: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRequest {
    title: String,
    #[serde(default)]
    subtitle: String,
    slug: Option<String>,
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    content: String,
    publish_at: Option<String>,
    author: Option<String>,
    #[serde(default)]
    publish: bool,
}

fn query_of(req: &HttpRequest) -> QueryString {
    QueryString::from_opt(req.uri().query())
}

fn error_body(message: impl ToString) -> serde_json::Value {
    json!({ "error": message.to_string() })
}

#[web::get("/")]
async fn index(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let qs = query_of(&req);
    let status_filter = StatusFilter::from_label(qs.get_filter());
    let query = qs.get_query();

    let renderer = match DashboardRenderer::new(DASHBOARD_TEMPLATE) {
        Ok(renderer) => renderer,
        Err(e) => return web::HttpResponse::InternalServerError()
            .body(format!("Error rendering dashboard: {}", e)),
    };

    let comment_counts = lock(&state.comments).counts();
    let board = lock(&state.board);
    let posts = board.view(status_filter, query);
    let rows: Vec<_> = posts.iter()
        .map(|record| DashboardRow { record, working: board.is_working(&record.id) })
        .collect();
    let rendered = renderer.render(&rows, board.counts(), comment_counts, status_filter, query);

    web::HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(rendered)
}

#[web::get("/api/posts")]
async fn list_posts(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let qs = query_of(&req);
    let board = lock(&state.board);
    let posts = board.view(StatusFilter::from_label(qs.get_filter()), qs.get_query());
    let rows: Vec<_> = posts.iter()
        .map(|record| PostRow { record, working: board.is_working(&record.id) })
        .collect();

    web::HttpResponse::Ok().json(&json!({
        "posts": rows,
        "counts": board.counts(),
    }))
}

#[web::post("/api/posts/{id}/toggle")]
async fn toggle_post(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let id = lock(&state.board).resolve_id(&path.into_inner());

    match toggle(&state.board, &state.endpoint, &id).await {
        ToggleOutcome::Committed(record) => web::HttpResponse::Ok().json(&record),
        ToggleOutcome::Busy => web::HttpResponse::Conflict()
            .json(&error_body(format!("post {} is already being updated", id))),
        ToggleOutcome::NotFound => web::HttpResponse::NotFound()
            .json(&error_body(format!("post {} not found", id))),
        ToggleOutcome::RolledBack(e) => web::HttpResponse::BadGateway().json(&error_body(e)),
    }
}

#[web::get("/api/comments")]
async fn list_comments(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let qs = query_of(&req);
    let queue = lock(&state.comments);
    let comments = queue.view(ModerationFilter::from_label(qs.get_filter()), qs.get_query());

    web::HttpResponse::Ok().json(&json!({
        "comments": comments,
        "counts": queue.counts(),
    }))
}

#[web::post("/api/comments/{id}/{status}")]
async fn moderate_comment(path: web::types::Path<(String, String)>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let (id, status) = path.into_inner();
    let id = lock(&state.comments).resolve_id(&id);
    let status = match ModerationStatus::from_label(&status) {
        Some(status) => status,
        None => return web::HttpResponse::BadRequest()
            .json(&error_body(format!("unknown moderation status {}", status))),
    };

    match set_status(&state.comments, &state.endpoint, &id, status).await {
        ModerationOutcome::Committed(comment) => web::HttpResponse::Ok().json(&comment),
        ModerationOutcome::Busy => web::HttpResponse::Conflict()
            .json(&error_body(format!("comment {} is already being moderated", id))),
        ModerationOutcome::NotFound => web::HttpResponse::NotFound()
            .json(&error_body(format!("comment {} not found", id))),
        ModerationOutcome::RolledBack(e) => web::HttpResponse::BadGateway().json(&error_body(e)),
    }
}

#[web::get("/api/cards")]
async fn list_cards(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let qs = query_of(&req);
    web::HttpResponse::Ok().json(&json!({
        "categories": category_labels(&state.cards),
        "cards": in_category(&state.cards, qs.get("category")),
    }))
}

fn compose_draft(request: &DraftRequest) -> Result<PostDraft, String> {
    let mut draft = PostDraft::new();
    draft.set_title(&request.title);
    draft.set_subtitle(&request.subtitle);
    if let Some(slug) = request.slug.as_deref().filter(|slug| !slug.trim().is_empty()) {
        draft.set_slug(slug);
    }
    if let Some(category) = &request.category {
        draft.set_category(category);
    }
    for tag in request.tags.iter() {
        draft.add_tag(tag);
    }
    draft.set_content(&request.content);
    if let Some(publish_at) = &request.publish_at {
        draft.schedule(Some(parse_timestamp(publish_at)?));
    }
    Ok(draft)
}

#[web::post("/api/drafts")]
async fn save_draft(body: web::types::Json<DraftRequest>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let request = body.into_inner();
    let mut draft = match compose_draft(&request) {
        Ok(draft) => draft,
        Err(e) => return web::HttpResponse::BadRequest().json(&error_body(e)),
    };

    let result = if request.publish {
        draft.publish(&state.endpoint, Utc::now()).await
    } else {
        draft.save_draft(&state.endpoint).await
    };

    match result {
        Ok(()) => {
            let author = match request.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
                Some(author) => author.to_string(),
                None => state.deriver.derive_author(&draft.id.to_string()),
            };
            lock(&state.board).add(draft.to_record(&author));
            web::HttpResponse::Created().json(&draft)
        }
        Err(e @ DraftError::NotReady(_)) => web::HttpResponse::UnprocessableEntity().json(&error_body(e)),
        Err(e @ DraftError::Persist(_)) => web::HttpResponse::BadGateway().json(&error_body(e)),
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening {}: {}", path.display(), e))),
    };

    match serde_json::from_str(&content) {
        Ok(items) => Ok(items),
        Err(e) => Err(io::Error::new(ErrorKind::InvalidData, format!("Error parsing {}: {}", path.display(), e))),
    }
}

fn load_optional<T: DeserializeOwned>(path: Option<&Path>) -> io::Result<Vec<T>> {
    match path {
        Some(path) => load_json(path),
        None => Ok(vec![]),
    }
}

fn build_state(raw_posts: &[RawRecord],
               raw_comments: &[RawComment],
               raw_blogs: &[RawRecord],
               derive: Derive,
               persistence: &Persistence) -> AppState {
    let deriver = MetadataDeriver::new(derive);
    let now = Utc::now();

    let board = PublishBoard::from_raw(raw_posts, &deriver, now);
    let comments = ModerationQueue::from_raw(raw_comments);
    let cards = build_cards(raw_blogs, &deriver, now);
    info!("Loaded {} posts, {} comments and {} cards", board.records().len(), comments.comments().len(), cards.len());

    AppState {
        board: Mutex::new(board),
        comments: Mutex::new(comments),
        cards,
        endpoint: SimulatedEndpoint::new(persistence),
        deriver,
    }
}

pub async fn server_run(config: Config) -> io::Result<()> {
    let raw_posts: Vec<RawRecord> = load_json(&config.paths.posts_file)?;
    let raw_comments: Vec<RawComment> = load_optional(config.paths.comments_file.as_deref())?;
    let raw_blogs: Vec<RawRecord> = load_optional(config.paths.blogs_file.as_deref())?;

    let app_state = Arc::new(build_state(&raw_posts, &raw_comments, &raw_blogs, config.derive.clone(), &config.persistence));
    if lock(&app_state.board).records().is_empty() {
        error!("No posts found in {}", config.paths.posts_file.display());
    }

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .service(index)
            .service(list_posts)
            .service(toggle_post)
            .service(list_comments)
            .service(moderate_comment)
            .service(list_cards)
            .service(save_draft)
    })
        .bind((bind_addr, bind_port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use ntex::http::StatusCode;
    use ntex::web::test;
    use serde_json::Value;

    use crate::optimistic::Begin;
    use crate::record::RecordId;
    use crate::test_data::{raw_comments, raw_posts};

    use super::*;

    fn state_with(raw_posts: &[RawRecord], failing_ids: &[&str]) -> Arc<AppState> {
        let persistence = Persistence {
            latency_ms: 0,
            failing_ids: failing_ids.iter().map(|id| id.to_string()).collect(),
        };
        Arc::new(build_state(raw_posts, &raw_comments(), &[], Derive::default(), &persistence))
    }

    fn fixture_state(failing_ids: &[&str]) -> Arc<AppState> {
        state_with(&raw_posts(), failing_ids)
    }

    async fn post(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(
            web::App::new()
                .state(state.clone())
                .service(toggle_post)
                .service(moderate_comment)
        ).await;
        let resp = test::call_service(&app, test::TestRequest::post().uri(uri).to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn status_of(state: &AppState, id: &RecordId) -> &'static str {
        lock(&state.board).get(id).map(|record| record.status.as_str()).unwrap_or("missing")
    }

    #[ntex::test]
    async fn test_toggle_committed() {
        let state = fixture_state(&[]);
        let (status, body) = post(&state, "/api/posts/1/toggle").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["status"], "published");
        assert_eq!(status_of(&state, &RecordId::Num(1)), "published");
        assert!(!lock(&state.board).is_working(&RecordId::Num(1)));
    }

    #[ntex::test]
    async fn test_toggle_busy() {
        let state = fixture_state(&[]);
        let id = RecordId::Num(1);
        assert!(matches!(lock(&state.board).begin_toggle(&id, Utc::now()), Begin::Started(_)));

        let (status, body) = post(&state, "/api/posts/1/toggle").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "post 1 is already being updated");
        assert_eq!(status_of(&state, &id), "published");
    }

    #[ntex::test]
    async fn test_toggle_unknown_id() {
        let state = fixture_state(&[]);
        let (status, body) = post(&state, "/api/posts/99/toggle").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "post 99 not found");
        assert!(!lock(&state.board).is_working(&RecordId::Num(99)));
    }

    #[ntex::test]
    async fn test_toggle_rolled_back() {
        let state = fixture_state(&["2"]);
        let before = lock(&state.board).records().to_vec();

        let (status, body) = post(&state, "/api/posts/2/toggle").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap_or("").contains("could not be set to draft"));

        let board = lock(&state.board);
        assert_eq!(board.records(), &before[..]);
        assert!(!board.is_working(&RecordId::Num(2)));
    }

    #[ntex::test]
    async fn test_toggle_text_id_made_of_digits() {
        let raw_posts: Vec<RawRecord> = serde_json::from_str(r#"[{"id": "7", "title": "Seven"}, {"id": 8, "title": "Eight"}]"#).unwrap();
        let state = state_with(&raw_posts, &[]);

        let (status, body) = post(&state, "/api/posts/7/toggle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "7");
        assert_eq!(body["status"], "published");
        assert_eq!(status_of(&state, &RecordId::Text("7".to_string())), "published");

        let (status, body) = post(&state, "/api/posts/8/toggle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 8);
    }

    #[ntex::test]
    async fn test_moderate_comment() {
        let state = fixture_state(&[]);

        let (status, body) = post(&state, "/api/comments/2/approve").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");

        let (status, body) = post(&state, "/api/comments/2/maybe").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown moderation status maybe");
    }

    fn request(json: &str) -> DraftRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_compose_draft() {
        let draft = compose_draft(&request(r#"{
            "title": "Hello, World",
            "tags": ["rust", " rust ", "web"],
            "category": "Tech",
            "content": "<p>Body</p>",
            "publishAt": "2025-07-01T10:00:00.000Z"
        }"#)).unwrap();

        assert_eq!(draft.slug, "hello-world");
        assert_eq!(draft.tags, vec!["rust", "web"]);
        assert_eq!(draft.category, "Tech");
        assert_eq!(draft.word_count(), 1);
        assert!(draft.publish_at.is_some());
    }

    #[test]
    fn test_compose_draft_keeps_given_slug() {
        let draft = compose_draft(&request(r#"{"title": "Hello", "slug": "custom path"}"#)).unwrap();
        assert_eq!(draft.slug, "custom-path");

        let err = compose_draft(&request(r#"{"title": "Hello", "publishAt": "someday"}"#));
        assert!(err.is_err());
    }

    #[test]
    fn test_post_row_is_flat() {
        let record = ContentRecord {
            id: RecordId::Num(7),
            title: "Seven".to_string(),
            status: crate::record::PublishStatus::Draft,
            author: "Ava Kapoor".to_string(),
            published_at: None,
        };
        let value = serde_json::to_value(PostRow { record: &record, working: true }).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["status"], "draft");
        assert_eq!(value["publishedAt"], serde_json::Value::Null);
        assert_eq!(value["working"], true);
    }
}
