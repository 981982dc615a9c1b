//! File serving with fixed CORS and cache-control headers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Configuration for the preview server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory the site is served from
    pub root_dir: PathBuf,

    /// Address to listen on
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
        }
    }
}

struct ServerState {
    root: PathBuf,
}

/// Build the router: a single fallback handler serving the site tree, with
/// the fixed response headers stamped onto everything it produces.
pub fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(ServerState {
        root: config.root_dir.clone(),
    });

    Router::new()
        .fallback(serve_path)
        .layer(middleware::from_fn(fixed_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        "serving {} at http://{}",
        config.root_dir.display(),
        config.addr
    );

    axum::serve(listener, router(&config)).await?;
    Ok(())
}

/// Every response carries these three headers, whatever the path or status.
async fn fixed_headers(req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    res
}

enum Resolution {
    File(PathBuf),
    Directory(PathBuf),
    NotFound,
    Forbidden,
}

/// Map a request path to a filesystem path beneath the root.
///
/// Canonicalizes both sides so that traversal sequences (raw or
/// percent-encoded) can never escape the served directory.
fn resolve_request_path(root: &Path, raw: &str) -> Resolution {
    let decoded = match urlencoding::decode(raw) {
        Ok(d) => d.into_owned(),
        Err(_) => return Resolution::NotFound,
    };
    if decoded.contains('\0') {
        return Resolution::NotFound;
    }
    let rel = decoded.trim_start_matches('/');

    let Ok(canon_root) = root.canonicalize() else {
        return Resolution::NotFound;
    };
    let Ok(canon) = canon_root.join(rel).canonicalize() else {
        return Resolution::NotFound;
    };
    if !canon.starts_with(&canon_root) {
        return Resolution::Forbidden;
    }

    if canon.is_dir() {
        Resolution::Directory(canon)
    } else {
        Resolution::File(canon)
    }
}

async fn serve_path(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "Unsupported method").into_response();
    }

    let raw = req.uri().path().to_string();

    match resolve_request_path(&state.root, &raw) {
        Resolution::File(path) => serve_file(&path).await,
        Resolution::Directory(dir) => {
            if !raw.ends_with('/') {
                // Directories are addressed with a trailing slash so that
                // relative links inside listings and index pages resolve.
                return (
                    StatusCode::MOVED_PERMANENTLY,
                    [(header::LOCATION, format!("{}/", raw))],
                )
                    .into_response();
            }
            let index = dir.join("index.html");
            if index.is_file() {
                serve_file(&index).await
            } else {
                directory_listing(&dir, &raw).await
            }
        }
        Resolution::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        Resolution::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

async fn serve_file(path: &Path) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    match tokio::fs::read(path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.essence_str().to_string())],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response(),
    }
}

async fn directory_listing(dir: &Path, request_path: &str) -> Response {
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list directory").into_response()
        }
    };

    let mut entries = Vec::new();
    while let Ok(Some(entry)) = rd.next_entry().await {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false)
        {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();

    Html(listing_html(request_path, &entries)).into_response()
}

fn listing_html(request_path: &str, entries: &[String]) -> String {
    let title = format!("Directory listing for {}", request_path);

    let mut page = String::new();
    page.push_str("<!DOCTYPE HTML>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", html_escape(&title)));
    page.push_str(&format!("<h1>{}</h1>\n<hr>\n<ul>\n", html_escape(&title)));
    for name in entries {
        let (stem, slash) = match name.strip_suffix('/') {
            Some(s) => (s, "/"),
            None => (name.as_str(), ""),
        };
        page.push_str(&format!(
            "<li><a href=\"{}{}\">{}</a></li>\n",
            urlencoding::encode(stem),
            slash,
            html_escape(name)
        ));
    }
    page.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    page
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn demo_site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.html"),
            "<html><body><h2>Pepper Chicken</h2>\
             <span class=\"menu-item-price\">₹120</span></body></html>",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css").join("style.css"), "body { margin: 0; }").unwrap();
        dir
    }

    async fn spawn_site(root: PathBuf) -> SocketAddr {
        let app = router(&ServerConfig {
            root_dir: root,
            ..Default::default()
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn assert_fixed_headers(headers: &reqwest::header::HeaderMap) {
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET");
        assert_eq!(
            headers["cache-control"],
            "no-store, no-cache, must-revalidate"
        );
    }

    #[test]
    fn resolves_files_within_root() {
        let site = demo_site();
        match resolve_request_path(site.path(), "/index.html") {
            Resolution::File(p) => assert!(p.ends_with("index.html")),
            _ => panic!("expected a file resolution"),
        }
        match resolve_request_path(site.path(), "/css/") {
            Resolution::Directory(_) => {}
            _ => panic!("expected a directory resolution"),
        }
    }

    #[test]
    fn missing_paths_do_not_resolve() {
        let site = demo_site();
        assert!(matches!(
            resolve_request_path(site.path(), "/menu.json"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn traversal_cannot_escape_root() {
        let site = demo_site();
        for path in ["/../", "/%2e%2e/", "/css/../../"] {
            match resolve_request_path(site.path(), path) {
                Resolution::Forbidden | Resolution::NotFound => {}
                _ => panic!("{path} escaped the root"),
            }
        }
    }

    #[test]
    fn listing_links_every_entry() {
        let html = listing_html("/", &["css/".to_string(), "index.html".to_string()]);
        assert!(html.contains("Directory listing for /"));
        assert!(html.contains("<a href=\"css/\">css/</a>"));
        assert!(html.contains("<a href=\"index.html\">index.html</a>"));
    }

    #[test]
    fn listing_escapes_markup_in_names() {
        let html = listing_html("/", &["<script>.html".to_string()]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;.html"));
    }

    #[tokio::test]
    async fn get_returns_file_bytes_and_fixed_headers() {
        let site = demo_site();
        let addr = spawn_site(site.path().to_path_buf()).await;

        let resp = reqwest::get(format!("http://{}/index.html", addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_fixed_headers(resp.headers());
        assert_eq!(resp.headers()["content-type"], "text/html");

        let body = resp.text().await.unwrap();
        assert!(body.contains("Pepper Chicken"));
        assert!(body.contains("₹120"));
    }

    #[tokio::test]
    async fn missing_path_is_404_with_fixed_headers() {
        let site = demo_site();
        let addr = spawn_site(site.path().to_path_buf()).await;

        let resp = reqwest::get(format!("http://{}/menu.json", addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_fixed_headers(resp.headers());
    }

    #[tokio::test]
    async fn directory_request_serves_index() {
        let site = demo_site();
        let addr = spawn_site(site.path().to_path_buf()).await;

        let resp = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.text().await.unwrap().contains("Pepper Chicken"));
    }

    #[tokio::test]
    async fn directory_without_index_lists_entries() {
        let site = demo_site();
        let addr = spawn_site(site.path().to_path_buf()).await;

        let resp = reqwest::get(format!("http://{}/css/", addr)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_fixed_headers(resp.headers());
        assert!(resp.text().await.unwrap().contains("style.css"));
    }

    #[test]
    fn second_bind_on_same_port_fails() {
        let first = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = first.local_addr().unwrap();
        assert!(std::net::TcpListener::bind(addr).is_err());
    }
}
