//! Test helpers for integration tests.
//!
//! Provides local HTTP stubs for the feed source and the webhook, plus
//! helpers to build feeds and pipelines.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use feedhook::{Database, FeedFetcher, Pipeline, WebhookNotifier};

/// Chunk size used when streaming a feed without a Content-Length.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Bind a router to an ephemeral local port and serve it in the background.
async fn spawn_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug)]
struct FeedResponse {
    status: StatusCode,
    body: String,
    chunked: bool,
    user_agents: Vec<String>,
}

/// Feed source stub serving a replaceable body at `/feed`.
#[derive(Clone)]
pub struct FeedStub {
    addr: SocketAddr,
    state: Arc<Mutex<FeedResponse>>,
}

impl FeedStub {
    pub async fn start(body: impl Into<String>) -> Self {
        let state = Arc::new(Mutex::new(FeedResponse {
            status: StatusCode::OK,
            body: body.into(),
            chunked: false,
            user_agents: Vec::new(),
        }));
        let app = Router::new()
            .route("/feed", get(serve_feed))
            .with_state(state.clone());
        let addr = spawn_router(app).await;
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/feed", self.addr)
    }

    pub fn set_body(&self, body: impl Into<String>) {
        self.state.lock().unwrap().body = body.into();
    }

    pub fn set_status(&self, status: u16) {
        self.state.lock().unwrap().status = StatusCode::from_u16(status).unwrap();
    }

    /// Stream the body in chunks with no Content-Length header.
    pub fn set_chunked(&self, chunked: bool) {
        self.state.lock().unwrap().chunked = chunked;
    }

    /// User-Agent of every request received so far.
    pub fn user_agents(&self) -> Vec<String> {
        self.state.lock().unwrap().user_agents.clone()
    }
}

async fn serve_feed(
    State(state): State<Arc<Mutex<FeedResponse>>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.user_agents.push(user_agent(&headers));

    let body = if state.chunked {
        let chunks: Vec<Result<String, std::io::Error>> = state
            .body
            .as_bytes()
            .chunks(STREAM_CHUNK_SIZE)
            .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
            .collect();
        Body::from_stream(futures::stream::iter(chunks))
    } else {
        Body::from(state.body.clone())
    };

    (
        state.status,
        [(header::CONTENT_TYPE, "application/atom+xml")],
        body,
    )
        .into_response()
}

#[derive(Debug)]
struct WebhookState {
    status: StatusCode,
    received: Vec<String>,
    user_agents: Vec<String>,
}

/// Webhook stub recording the `content` of every POST to `/hook`.
#[derive(Clone)]
pub struct WebhookStub {
    addr: SocketAddr,
    state: Arc<Mutex<WebhookState>>,
}

impl WebhookStub {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(WebhookState {
            status: StatusCode::NO_CONTENT,
            received: Vec::new(),
            user_agents: Vec::new(),
        }));
        let app = Router::new()
            .route("/hook", post(record_message))
            .with_state(state.clone());
        let addr = spawn_router(app).await;
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    /// Status returned for subsequent requests. Requests are recorded either way.
    pub fn set_status(&self, status: u16) {
        self.state.lock().unwrap().status = StatusCode::from_u16(status).unwrap();
    }

    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().received.len()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.state.lock().unwrap().user_agents.clone()
    }
}

async fn record_message(
    State(state): State<Arc<Mutex<WebhookState>>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    let content = body["content"].as_str().unwrap_or_default().to_string();
    state.received.push(content);
    state.user_agents.push(user_agent(&headers));
    state.status
}

/// One Atom entry: title, link and RFC 3339 published time.
pub struct AtomEntry<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub published: &'a str,
}

pub fn entry<'a>(title: &'a str, link: &'a str, published: &'a str) -> AtomEntry<'a> {
    AtomEntry {
        title,
        link,
        published,
    }
}

/// Render an Atom document.
pub fn atom_feed(entries: &[AtomEntry<'_>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Test News</title>
  <id>urn:test:feed</id>
  <updated>2025-01-01T00:00:00Z</updated>
"#,
    );
    for e in entries {
        xml.push_str(&format!(
            r#"  <entry>
    <title>{}</title>
    <link rel="alternate" href="{}"/>
    <id>{}</id>
    <published>{}</published>
    <updated>{}</updated>
    <author><name>tester</name></author>
    <content type="html">body of {}</content>
  </entry>
"#,
            e.title, e.link, e.link, e.published, e.published, e.title
        ));
    }
    xml.push_str("</feed>\n");
    xml
}

/// Create an in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

/// Build a pipeline against the stubs.
pub fn pipeline(db: &Database, feed_url: &str, webhook_url: &str) -> Pipeline {
    Pipeline::new(
        db.pool().clone(),
        FeedFetcher::new().unwrap(),
        WebhookNotifier::new(webhook_url).unwrap(),
        feed_url,
    )
}
