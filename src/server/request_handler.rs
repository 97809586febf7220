use log::{debug, error, info, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::http_status::HttpStatus;
use super::listing;

const MAX_HEAD_BYTES: usize = 8192;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

static MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("txt", "text/plain; charset=utf-8"),
    ("md", "text/markdown; charset=utf-8"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("mp4", "video/mp4"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
}

/// Parses the first line of a request head (`GET /path HTTP/1.1`).
pub fn parse_request_line(head: &str) -> Option<RequestLine> {
    let mut parts = head.lines().next()?.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;

    Some(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
    })
}

/// A request target mapped onto the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Decoded URL path, used for listings and redirects.
    pub url_path: String,
    pub fs_path: PathBuf,
}

/// Maps a request target onto `root`, dropping query and fragment.
///
/// `..` segments are refused outright rather than normalised.
pub fn resolve(root: &Path, target: &str) -> Result<Resolved, HttpStatus> {
    let raw_path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if !raw_path.starts_with('/') {
        return Err(HttpStatus::BadRequest);
    }

    let url_path = urlencoding::decode(raw_path)
        .map_err(|_| HttpStatus::BadRequest)?
        .into_owned();
    if url_path.contains('\0') {
        return Err(HttpStatus::BadRequest);
    }

    let mut fs_path = root.to_path_buf();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(HttpStatus::Forbidden),
            segment => fs_path.push(segment),
        }
    }

    Ok(Resolved { url_path, fs_path })
}

enum Body {
    Empty,
    Bytes(Vec<u8>),
    File(File),
}

pub struct Response {
    status: HttpStatus,
    content_type: &'static str,
    content_length: u64,
    location: Option<String>,
    body: Body,
}

impl Response {
    fn html(status: HttpStatus, page: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            content_length: page.len() as u64,
            location: None,
            body: Body::Bytes(page.into_bytes()),
        }
    }

    fn error(status: HttpStatus) -> Self {
        Self::html(status, status.error_page())
    }

    fn redirect(location: String) -> Self {
        Self {
            status: HttpStatus::MovedPermanently,
            content_type: "text/html; charset=utf-8",
            content_length: 0,
            location: Some(location),
            body: Body::Empty,
        }
    }

    fn file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            status: HttpStatus::Ok,
            content_type: content_type(path),
            content_length: len,
            location: None,
            body: Body::File(file),
        })
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn write_to<W: Write>(self, out: W, head_only: bool) -> io::Result<()> {
        let mut writer = BufWriter::new(out);
        let mut head = self.status.status_line();
        head.push_str(&format!("Content-Type: {}\r\n", self.content_type));
        head.push_str(&format!("Content-Length: {}\r\n", self.content_length));
        if let Some(location) = &self.location {
            head.push_str(&format!("Location: {location}\r\n"));
        }
        if self.status == HttpStatus::MethodNotAllowed {
            head.push_str("Allow: GET, HEAD\r\n");
        }
        head.push_str("Connection: close\r\n\r\n");
        writer.write_all(head.as_bytes())?;

        if !head_only {
            match self.body {
                Body::Empty => {}
                Body::Bytes(bytes) => writer.write_all(&bytes)?,
                Body::File(mut file) => {
                    io::copy(&mut file, &mut writer)?;
                }
            }
        }
        writer.flush()
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// Builds the response for one request head against `root`.
pub fn respond(root: &Path, head: &str) -> (Option<RequestLine>, Response) {
    let Some(request) = parse_request_line(head) else {
        return (None, Response::error(HttpStatus::BadRequest));
    };

    if request.method != "GET" && request.method != "HEAD" {
        warn!("Unsupported method: {}", request.method);
        return (Some(request), Response::error(HttpStatus::MethodNotAllowed));
    }

    let resolved = match resolve(root, &request.target) {
        Ok(resolved) => resolved,
        Err(status) => {
            warn!("Rejected request target: {}", request.target);
            return (Some(request), Response::error(status));
        }
    };

    let response = serve_path(&request, &resolved);
    (Some(request), response)
}

fn serve_path(request: &RequestLine, resolved: &Resolved) -> Response {
    let path = &resolved.fs_path;

    if path.is_dir() {
        if !resolved.url_path.ends_with('/') {
            let raw_path = request.target.split(['?', '#']).next().unwrap_or("/");
            return Response::redirect(format!("{raw_path}/"));
        }

        let index = path.join("index.html");
        if index.is_file() {
            return open_file(&index);
        }

        return match listing::render(path, &resolved.url_path) {
            Ok(page) => Response::html(HttpStatus::Ok, page),
            Err(e) => {
                error!("Error listing {:?}: {}", path, e);
                Response::error(HttpStatus::Forbidden)
            }
        };
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => open_file(path),
        Ok(_) => Response::error(HttpStatus::Forbidden),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Response::error(HttpStatus::NotFound),
        Err(e) => {
            error!("Error getting metadata for {:?}: {}", path, e);
            Response::error(HttpStatus::Forbidden)
        }
    }
}

fn open_file(path: &Path) -> Response {
    match Response::file(path) {
        Ok(response) => response,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Response::error(HttpStatus::Forbidden)
        }
        Err(e) => {
            error!("Error opening file {:?}: {}", path, e);
            Response::error(HttpStatus::InternalServerError)
        }
    }
}

fn contains_double_newline(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.windows(2).any(|w| w == b"\n\n")
}

fn read_head(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while head.len() < MAX_HEAD_BYTES && !contains_double_newline(&head) {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }
    Ok(head)
}

pub fn handle_client(mut stream: TcpStream, root: &Path) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "unknown".to_string(),
    };

    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        debug!("Can't set read timeout for {}: {}", peer_addr, e);
    }

    let head = match read_head(&mut stream) {
        Ok(head) if head.is_empty() => {
            debug!("Connection closed by client {}", peer_addr);
            return;
        }
        Ok(head) => head,
        Err(e) => {
            error!("Error reading from {}: {}", peer_addr, e);
            return;
        }
    };

    let head = String::from_utf8_lossy(&head);
    let (request, response) = respond(root, &head);
    let status = response.status();
    let head_only = request.as_ref().is_some_and(|r| r.method == "HEAD");

    if let Err(e) = response.write_to(&mut stream, head_only) {
        error!("Error sending response to {}: {}", peer_addr, e);
        return;
    }

    match request {
        Some(r) => info!("{} \"{} {}\" {}", peer_addr, r.method, r.target, status.code()),
        None => info!("{} <malformed request> {}", peer_addr, status.code()),
    }
}
