// src/server/http.rs

//! Minimal HTTP/1.1 static file server on a Tokio `TcpListener`.
//!
//! Every connection serves a single request and is then closed, except the
//! event stream, which stays open until the browser goes away or the hub is
//! dropped.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::model::ServerConfig;
use crate::errors::Result;
use crate::server::reload::ReloadHub;

pub const EVENTS_PATH: &str = "/__assetflow/events";
pub const CLIENT_PATH: &str = "/__assetflow/client.js";

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__assetflow/events");
  source.onmessage = function (event) {
    var msg;
    try { msg = JSON.parse(event.data); } catch (e) { return; }
    if (msg.kind === "styles") {
      var links = document.querySelectorAll('link[rel="stylesheet"]');
      for (var i = 0; i < links.length; i++) {
        var url = links[i].href.replace(/[?&]assetflow=\d+/, "");
        links[i].href = url + (url.indexOf("?") < 0 ? "?" : "&") + "assetflow=" + Date.now();
      }
    } else {
      window.location.reload();
    }
  };
})();
"#;

const MAX_HEADER_BYTES: usize = 16 * 1024;

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub task: JoinHandle<()>,
}

/// Bind `host:port` from the config and serve `root` in the background.
pub async fn start(cfg: &ServerConfig, root: PathBuf, hub: ReloadHub) -> Result<ServerHandle> {
    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("binding dev server to {}:{}", cfg.host, cfg.port))?;
    let addr = listener.local_addr()?;
    info!(url = %format!("http://{addr}/"), root = %root.display(), "dev server listening");

    let task = tokio::spawn(serve(listener, root, hub));
    Ok(ServerHandle { addr, task })
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, root: PathBuf, hub: ReloadHub) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "accept failed; dev server stopping");
                return;
            }
        };
        let root = root.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &root, &hub).await {
                debug!(%peer, error = %err, "connection ended with error");
            }
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Decoded path without query string.
    pub path: String,
}

/// Parse `GET /a%20b.css?x=1 HTTP/1.1`.
pub fn parse_request_line(line: &str) -> Option<RequestLine> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let raw_path = target.split(['?', '#']).next().unwrap_or("/");
    Some(RequestLine {
        method,
        path: percent_decode(raw_path)?,
    })
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Map a request path onto a file below `root`. `None` for anything that
/// would escape the root. A trailing `/` resolves to `index.html`; this
/// never touches the filesystem.
pub fn resolve_request_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if request_path.ends_with('/') {
        resolved.push("index.html");
    }
    Some(resolved)
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Add the reload client to an HTML page, before `</body>` when present.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
    match html.rfind("</body>") {
        Some(idx) => format!("{}{}\n{}", &html[..idx], tag, &html[idx..]),
        None => format!("{html}\n{tag}\n"),
    }
}

async fn handle_connection(
    stream: TcpStream,
    root: &Path,
    hub: &ReloadHub,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut first = String::new();
    reader.read_line(&mut first).await?;
    let mut header_bytes = first.len();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        header_bytes += n;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if header_bytes > MAX_HEADER_BYTES {
            let mut stream = reader.into_inner();
            return write_response(
                &mut stream,
                "431 Request Header Fields Too Large",
                "text/plain",
                b"",
                true,
            )
            .await;
        }
    }

    let mut stream = reader.into_inner();
    let Some(request) = parse_request_line(first.trim_end()) else {
        return write_response(&mut stream, "400 Bad Request", "text/plain", b"bad request", true)
            .await;
    };
    let head_only = match request.method.as_str() {
        "GET" => false,
        "HEAD" => true,
        _ => {
            return write_response(
                &mut stream,
                "405 Method Not Allowed",
                "text/plain",
                b"method not allowed",
                true,
            )
            .await;
        }
    };

    match request.path.as_str() {
        EVENTS_PATH => stream_events(stream, hub).await,
        CLIENT_PATH => {
            write_response(
                &mut stream,
                "200 OK",
                content_type(Path::new("client.js")),
                CLIENT_JS.as_bytes(),
                !head_only,
            )
            .await
        }
        path => serve_file(&mut stream, root, path, head_only).await,
    }
}

async fn serve_file(
    stream: &mut TcpStream,
    root: &Path,
    request_path: &str,
    head_only: bool,
) -> anyhow::Result<()> {
    let Some(mut file) = resolve_request_path(root, request_path) else {
        return write_response(stream, "403 Forbidden", "text/plain", b"forbidden", !head_only)
            .await;
    };
    if tokio::fs::metadata(&file).await.is_ok_and(|m| m.is_dir()) {
        file.push("index.html");
    }

    let body = match tokio::fs::read(&file).await {
        Ok(body) => body,
        Err(_) => {
            debug!(path = %request_path, "not found");
            return write_response(stream, "404 Not Found", "text/plain", b"not found", !head_only)
                .await;
        }
    };

    let ctype = content_type(&file);
    let body = if ctype.starts_with("text/html") {
        inject_client(&String::from_utf8_lossy(&body)).into_bytes()
    } else {
        body
    };
    debug!(path = %request_path, bytes = body.len(), "200");
    write_response(stream, "200 OK", ctype, &body, !head_only).await
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    ctype: &str,
    body: &[u8],
    include_body: bool,
) -> anyhow::Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {ctype}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if include_body {
        stream.write_all(body).await?;
    }
    stream.flush().await?;
    Ok(())
}

async fn stream_events(mut stream: TcpStream, hub: &ReloadHub) -> anyhow::Result<()> {
    let mut rx = hub.subscribe();
    stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n: connected\n\n",
        )
        .await?;
    stream.flush().await?;
    debug!(clients = hub.client_count(), "browser connected to reload stream");

    loop {
        let kind = match rx.recv().await {
            Ok(kind) => kind,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "reload client lagged");
                continue;
            }
            Err(RecvError::Closed) => return Ok(()),
        };
        let frame = format!("data: {}\n\n", kind.to_json());
        stream.write_all(frame.as_bytes()).await?;
        stream.flush().await?;
    }
}
