use crate::handler::{ApiError, Artifact, RequestHandler, Upload};
use multipart::server::Multipart;
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Upload cap applied unless [`HttpServer::with_max_upload_bytes`] says otherwise.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("start http server: {0}")]
    Start(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub struct HttpServer {
    server: Arc<tiny_http::Server>,
    addr: SocketAddr,
    max_upload_bytes: u64,
}

/// Stops a running [`HttpServer::serve`] loop from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Arc<tiny_http::Server>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.server.unblock();
    }
}

impl HttpServer {
    /// Binds `addr` (`host:port`); port 0 picks a free port.
    pub fn bind(addr: &str) -> Result<Self, HttpError> {
        let bind_err = |source| HttpError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;
        let server = tiny_http::Server::from_listener(listener, None).map_err(HttpError::Start)?;
        Ok(Self {
            server: Arc::new(server),
            addr,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    /// Total size allowed for the form fields of one upload.
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: Arc::clone(&self.server),
        }
    }

    /// Accepts requests until shut down, one thread per request.
    pub fn serve(self, handler: RequestHandler) {
        info!(addr = %self.addr, max_upload_bytes = self.max_upload_bytes, "listening");
        let limit = self.max_upload_bytes;
        for request in self.server.incoming_requests() {
            let handler = handler.clone();
            thread::spawn(move || handle_request(&handler, request, limit));
        }
        info!(addr = %self.addr, "server stopped");
    }
}

enum Reply {
    Json(u16, Vec<u8>),
    Html(&'static str),
    File(Artifact),
    Empty(u16),
}

impl Reply {
    fn error(status: u16, message: &str) -> Self {
        Reply::Json(status, serde_json::json!({ "error": message }).to_string().into_bytes())
    }

    fn from_api_error(err: &ApiError) -> Self {
        Reply::error(err.status(), &err.to_string())
    }

    fn json(value: &impl serde::Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Reply::Json(200, body),
            Err(err) => Reply::error(500, &err.to_string()),
        }
    }
}

fn handle_request(handler: &RequestHandler, mut request: Request, upload_limit: u64) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = route(handler, &mut request, &method, &url, upload_limit);
    let status = respond(request, reply);
    debug!(
        %method,
        %url,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
}

fn route(
    handler: &RequestHandler,
    request: &mut Request,
    method: &Method,
    url: &str,
    upload_limit: u64,
) -> Reply {
    if *method == Method::Options {
        return Reply::Empty(204);
    }
    let path = url.split(['?', '#']).next().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::Get, []) => Reply::Html(INDEX_HTML),
        (Method::Post, ["api", "process"]) => {
            let upload = read_upload(request, upload_limit);
            match upload.and_then(|upload| handler.process(upload)) {
                Ok(response) => Reply::json(&response),
                Err(err) => Reply::from_api_error(&err),
            }
        }
        (Method::Get, ["api", "results", id, "video"]) => match handler.video(id) {
            Ok(artifact) => Reply::File(artifact),
            Err(err) => Reply::from_api_error(&err),
        },
        (Method::Get, ["api", "results", id, "model3d"]) => match handler.model(id) {
            Ok(artifact) => Reply::File(artifact),
            Err(err) => Reply::from_api_error(&err),
        },
        (Method::Get, ["api", "capabilities"]) => Reply::json(&threedai_core::capabilities()),
        (_, [] | ["api", "process"] | ["api", "capabilities"])
        | (_, ["api", "results", _, "video" | "model3d"]) => {
            Reply::error(405, "Method not allowed")
        }
        _ => Reply::error(404, "Not found"),
    }
}

fn read_upload(request: &mut Request, limit: u64) -> Result<Upload, ApiError> {
    let Some(boundary) = content_type(request).and_then(|ct| multipart_boundary(&ct)) else {
        debug!("process request without a multipart body");
        return Ok(Upload::default());
    };

    let result = read_form(request.as_reader(), boundary, limit);
    if let Err(ApiError::PayloadTooLarge { .. }) = &result {
        // Discard the rest of the body so the client can read the 413.
        if let Err(err) = std::io::copy(request.as_reader(), &mut std::io::sink()) {
            debug!("drain oversized upload: {err}");
        }
    }
    result
}

fn read_form(body: &mut dyn Read, boundary: String, limit: u64) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    let malformed = |err: std::io::Error| ApiError::BadRequest(format!("malformed form data: {err}"));
    let mut form = Multipart::with_body(body, boundary);
    let mut remaining = limit;
    while let Some(mut field) = form.read_entry().map_err(malformed)? {
        let mut data = Vec::new();
        let read = (&mut field.data)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(malformed)? as u64;
        if read > remaining {
            warn!(limit, field = %field.headers.name, "upload too large");
            return Err(ApiError::PayloadTooLarge { limit });
        }
        remaining -= read;
        match &*field.headers.name {
            "image" => upload.image = Some(data),
            "prompt" => upload.prompt = Some(String::from_utf8_lossy(&data).into_owned()),
            "backend" => upload.backend = Some(String::from_utf8_lossy(&data).into_owned()),
            other => debug!(field = other, "ignoring form field"),
        }
    }
    Ok(upload)
}

fn content_type(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string())
}

/// Extracts the boundary from a `multipart/form-data` content type.
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';').map(str::trim);
    let mime = parts.next()?;
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    parts
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn with_headers<R: Read>(mut response: Response<R>, headers: &[(&str, &str)]) -> Response<R> {
    for (name, value) in headers {
        match header(name, value) {
            Some(h) => response.add_header(h),
            None => warn!(name, value, "skipping invalid header"),
        }
    }
    response
}

const CORS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
];

/// Sends `reply` and returns the status code actually used.
fn respond(request: Request, reply: Reply) -> u16 {
    let (status, response) = match reply {
        Reply::Json(status, body) => {
            let response = Response::from_data(body).with_status_code(StatusCode(status));
            let response = with_headers(response, &[("Content-Type", "application/json")]);
            (status, response.boxed())
        }
        Reply::Html(page) => {
            let response = Response::from_data(page.as_bytes().to_vec());
            let response = with_headers(response, &[("Content-Type", "text/html; charset=utf-8")]);
            (200, response.boxed())
        }
        Reply::Empty(status) => (status, Response::empty(StatusCode(status)).boxed()),
        Reply::File(artifact) => match std::fs::File::open(&artifact.path) {
            Ok(file) => {
                let response = with_headers(
                    Response::from_file(file),
                    &[("Content-Type", artifact.content_type)],
                );
                let response = match &artifact.download_name {
                    Some(name) => {
                        let disposition = format!("attachment; filename=\"{name}\"");
                        with_headers(response, &[("Content-Disposition", disposition.as_str())])
                    }
                    None => response,
                };
                (200, response.boxed())
            }
            Err(err) => {
                warn!(path = %artifact.path.display(), "open artifact: {err}");
                return respond(request, Reply::error(404, "File not found"));
            }
        },
    };

    let response = with_headers(response, &CORS);
    if let Err(err) = request.respond(response) {
        debug!("client went away: {err}");
    }
    status
}
