use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Form, Path as UrlPath, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use colored::*;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::discussion_rest::{CreateDiscussion, DiscussionRest, LivetableQuery, LivetableResponse};
use super::message_request::DiscussionMessageRequestCreator;
use crate::config::Config;
use crate::error::{DiscussionServerError, ServerResult};
use crate::events::EventBus;
use crate::model::{Discussion, DiscussionContext, Message};
use crate::reference::{DefaultReferenceResolver, ReferenceResolver};
use crate::storage;
use crate::store::Stores;

/// Header carrying the name of the user posting a message
pub const AUTHOR_HEADER: &str = "x-discussions-author";
pub const GUEST_AUTHOR: &str = "guest";

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub rest: Arc<DiscussionRest>,
    pub messages: Arc<DiscussionMessageRequestCreator>,
}

impl AppState {
    pub fn new(stores: Stores) -> Self {
        Self {
            rest: Arc::new(DiscussionRest::new(stores.clone())),
            messages: Arc::new(DiscussionMessageRequestCreator::new(stores.clone())),
            stores,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Discussions Server" }))
        .route("/health", get(|| async { Json("OK") }))
        .route("/discussions", post(create_discussion))
        .route("/discussions/livetable", get(livetable))
        .route("/discussions/{reference}", get(get_discussion))
        .route("/discussions/{reference}/messages", get(list_messages))
        .route("/discussions/{reference}/contexts", get(list_contexts))
        .route("/messages", post(post_message))
        .route("/messages/{reference}", get(get_message))
        .route("/contexts/{reference}", get(get_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, data_dir: &Path) -> Result<()> {
    let db = Arc::new(storage::open(data_dir)?);
    let addr = format!("{}:{}", config.bind_address, config.port);
    let stores = Stores::new(db, Arc::new(config), EventBus::new());
    let app = router(AppState::new(stores));

    println!(
        "{} Server running at {}",
        "✓".green(),
        format!("http://{}", addr).bright_blue()
    );
    info!(%addr, data_dir = %data_dir.display(), "discussions server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_discussion(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
) -> ServerResult<Json<Discussion>> {
    state.rest.get(&reference).map(Json)
}

async fn create_discussion(
    State(state): State<AppState>,
    Json(request): Json<CreateDiscussion>,
) -> ServerResult<Json<Discussion>> {
    state.rest.create(&request).map(Json)
}

async fn livetable(
    State(state): State<AppState>,
    Query(query): Query<LivetableQuery>,
) -> ServerResult<Json<LivetableResponse>> {
    state.rest.livetable(&query).map(Json)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MessagePage {
    total: usize,
    offset: usize,
    messages: Vec<Message>,
}

async fn list_messages(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<MessagePage>> {
    let discussion = state.rest.get(&reference)?;
    let limit = query
        .limit
        .unwrap_or(state.stores.config.livetable_page_size);
    let messages = &state.stores.messages;

    let total = messages
        .count_by_discussion(&discussion.reference)
        .map_err(storage_failure)?;
    let page = messages
        .find_by_discussion(&discussion.reference, query.offset, limit)
        .map_err(storage_failure)?;

    Ok(Json(MessagePage {
        total,
        offset: query.offset,
        messages: page,
    }))
}

async fn list_contexts(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
) -> ServerResult<Json<Vec<DiscussionContext>>> {
    let discussion = state.rest.get(&reference)?;
    state
        .stores
        .contexts
        .find_by_discussion(&discussion.reference)
        .map(Json)
        .map_err(storage_failure)
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(parameters): Form<HashMap<String, String>>,
) -> ServerResult<Json<Message>> {
    let author = headers
        .get(AUTHOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(GUEST_AUTHOR);

    state.messages.create(&parameters, author).map(Json)
}

async fn get_message(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
) -> ServerResult<Json<Message>> {
    let message_reference = DefaultReferenceResolver.resolve_message(&reference)?;
    state
        .stores
        .messages
        .get(&message_reference)
        .map_err(storage_failure)?
        .map(Json)
        .ok_or_else(|| {
            DiscussionServerError::not_found(format!(
                "Message with reference=[{}] not found.",
                reference
            ))
        })
}

async fn get_context(
    State(state): State<AppState>,
    UrlPath(reference): UrlPath<String>,
) -> ServerResult<Json<DiscussionContext>> {
    let context_reference = DefaultReferenceResolver.resolve_context(&reference)?;
    state
        .stores
        .contexts
        .get(&context_reference)
        .map_err(storage_failure)?
        .map(Json)
        .ok_or_else(|| {
            DiscussionServerError::not_found(format!(
                "Discussion context with reference=[{}] not found.",
                reference
            ))
        })
}

fn storage_failure(err: anyhow::Error) -> DiscussionServerError {
    error!(error = %err, "storage failure");
    DiscussionServerError::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::server::discussion_rest::encode_segment;

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::json!(null));
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn router_with_stores() -> (Router, Stores) {
        let stores = Stores::in_memory().unwrap();
        (router(AppState::new(stores.clone())), stores)
    }

    #[tokio::test]
    async fn test_unknown_discussion_is_json_404() {
        let (router, _) = router_with_stores();
        let (status, body) = call(&router, get("/discussions/forum%2Fmissing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(
            body["message"],
            "Discussion with reference=[forum/missing] not found."
        );
    }

    #[tokio::test]
    async fn test_create_post_and_list() {
        let (router, _) = router_with_stores();

        let create = Request::builder()
            .method("POST")
            .uri("/discussions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Roadmap","description":"Q3"}"#))
            .unwrap();
        let (status, discussion) = call(&router, create).await;
        assert_eq!(status, StatusCode::OK);
        let reference = discussion["reference"].as_str().unwrap().to_string();

        let form = format!(
            "discussionReference={}&content=Hello%20there&storeConfiguration_location=Sandbox",
            encode_segment(&reference)
        );
        let post = Request::builder()
            .method("POST")
            .uri("/messages")
            .header("content-type", "application/x-www-form-urlencoded")
            .header(AUTHOR_HEADER, "alice")
            .body(Body::from(form))
            .unwrap();
        let (status, message) = call(&router, post).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["author"], "alice");
        assert_eq!(message["content"], "Hello there");

        let uri = format!("/discussions/{}/messages", encode_segment(&reference));
        let (status, page) = call(&router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["messages"][0]["reference"], message["reference"]);

        let uri = format!(
            "/messages/{}",
            encode_segment(message["reference"].as_str().unwrap())
        );
        let (status, fetched) = call(&router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, message);
    }

    #[tokio::test]
    async fn test_create_without_title_is_json_error() {
        let (router, _) = router_with_stores();
        let create = Request::builder()
            .method("POST")
            .uri("/discussions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"description":"d"}"#))
            .unwrap();
        let (status, body) = call(&router, create).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
        assert_eq!(
            body["message"],
            "Fail to create a discussion with title=[], description=[d]"
        );
    }

    #[tokio::test]
    async fn test_post_without_author_header_is_guest() {
        let (router, stores) = router_with_stores();
        let reference = stores
            .discussions
            .create("forum", "Thread", "", &Default::default())
            .unwrap()
            .unwrap();

        let post = Request::builder()
            .method("POST")
            .uri("/messages")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "discussionReference={}&content=hi",
                encode_segment(&reference.to_string())
            )))
            .unwrap();
        let (status, message) = call(&router, post).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["author"], GUEST_AUTHOR);
    }

    #[tokio::test]
    async fn test_post_errors_keep_status() {
        let (router, _) = router_with_stores();
        let post = |body: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/messages")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap()
        };

        let (status, _) = call(&router, post("content=hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&router, post("discussionReference=forum%2Fnope&content=hi")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Discussion with reference=[forum/nope] not found.");
    }

    #[tokio::test]
    async fn test_contexts_of_discussion() {
        let (router, stores) = router_with_stores();
        let discussion = stores
            .discussions
            .create("forum", "Thread", "", &Default::default())
            .unwrap()
            .unwrap();
        let context = stores
            .contexts
            .get_or_create("forum", "Alice", "", &crate::model::EntityReference::new("user", "alice"))
            .unwrap()
            .unwrap();
        stores.discussions.link(&discussion, &context.reference).unwrap();

        let uri = format!("/discussions/{}/contexts", encode_segment(&discussion.to_string()));
        let (status, contexts) = call(&router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(contexts[0]["reference"], context.reference.to_string());

        let uri = format!("/contexts/{}", encode_segment(&context.reference.to_string()));
        let (status, fetched) = call(&router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Alice");

        let (status, _) = call(&router, get("/contexts/forum%2Fnope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
