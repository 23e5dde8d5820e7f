//! Throwaway local HTTP server for fetch tests
//!
//! Serves fixed bodies under `/files/:name` on an ephemeral 127.0.0.1 port.
//! `/status/:code` answers with that status, `/slow/:name` waits before serving.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delay applied by `/slow/:name`
pub const SLOW_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServedFile {
    pub name: String,
    /// `None` omits the Content-Type header
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ServedFile {
    pub fn new(name: &str, content_type: Option<&str>, body: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            body,
        }
    }

    pub fn wav(name: &str, body: Vec<u8>) -> Self {
        Self::new(name, Some("audio/wav"), body)
    }
}

type Files = Arc<HashMap<String, ServedFile>>;

pub struct TestFileServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestFileServer {
    pub async fn start(files: Vec<ServedFile>) -> Self {
        let files: Files = Arc::new(files.into_iter().map(|f| (f.name.clone(), f)).collect());

        let app = Router::new()
            .route("/files/:name", get(serve_file))
            .route("/slow/:name", get(serve_slow))
            .route("/status/:code", get(serve_status))
            .with_state(files);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", address),
            handle,
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url, name)
    }

    pub fn slow_url(&self, name: &str) -> String {
        format!("{}/slow/{}", self.base_url, name)
    }

    pub fn status_url(&self, code: u16) -> String {
        format!("{}/status/{}", self.base_url, code)
    }
}

impl Drop for TestFileServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_file(State(files): State<Files>, Path(name): Path<String>) -> Response {
    match files.get(&name) {
        Some(file) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            if let Some(content_type) = &file.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder.body(Body::from(file.body.clone())).unwrap()
        }
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap(),
    }
}

async fn serve_slow(state: State<Files>, name: Path<String>) -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    serve_file(state, name).await
}

async fn serve_status(Path(code): Path<u16>) -> Response {
    Response::builder()
        .status(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .body(Body::from("status fixture"))
        .unwrap()
}
