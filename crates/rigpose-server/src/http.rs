//! Minimal HTTP/1.1 request parsing and response encoding.
//!
//! One request per connection; every response carries `Connection: close`.

use std::io::SeekFrom;
use std::path::PathBuf;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on the request head (request line + headers).
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// A parsed request head.  Bodies are never read; the API only serves
/// `GET`/`HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(path: &str) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse the request line and headers from `head` (everything before the
/// blank line).  Returns `None` for anything that is not a well-formed
/// HTTP/1.x request head.
pub fn parse_request_head(head: &str) -> Option<Request> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") || parts.next().is_some() {
        return None;
    }
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    Some(Request {
        method,
        path,
        headers,
    })
}

/// Read from `stream` until the end of the request head.
///
/// Returns `Ok(None)` if the peer closed the connection, sent more than
/// [`MAX_HEAD_BYTES`] without finishing the head, or sent a malformed head.
pub async fn read_request<S: AsyncRead + Unpin>(
    stream: &mut S,
) -> std::io::Result<Option<Request>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]);
            return Ok(parse_request_head(&head));
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Ok(None);
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// A byte range of a file on disk, streamed when the response is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSlice {
    pub path: PathBuf,
    pub start: u64,
    pub len: u64,
}

/// An HTTP response ready to be written.
///
/// The body is either in memory (`body`) or a [`FileSlice`] copied straight
/// from disk to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub file: Option<FileSlice>,
    /// Send headers only (`HEAD`).  `Content-Length` still describes the body.
    pub omit_body: bool,
}

impl Response {
    pub fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
            file: None,
            omit_body: false,
        }
    }

    /// Stream `len` bytes of `path` starting at `start`.
    pub fn from_file(
        status: u16,
        content_type: &str,
        path: impl Into<PathBuf>,
        start: u64,
        len: u64,
    ) -> Self {
        let mut response = Self::new(status, content_type, Vec::new());
        response.file = Some(FileSlice {
            path: path.into(),
            start,
            len,
        });
        response
    }

    /// Serialise `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status, "application/json", body),
            Err(e) => Self::error(500, &format!("serialization error: {e}")),
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string().into_bytes();
        Self::new(status, "application/json", body)
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            file: None,
            omit_body: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Keep status and headers, drop the body on the wire.
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> u64 {
        match &self.file {
            Some(slice) => slice.len,
            None => self.body.len() as u64,
        }
    }

    /// Encode status line and headers, including the blank line.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.content_length()));
        head.push_str("Connection: close\r\n\r\n");
        head.into_bytes()
    }

    /// Encode an in-memory response.  A file body is not included; use
    /// [`write_to`](Self::write_to) for those.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.head_bytes();
        if !self.omit_body {
            out.extend_from_slice(&self.body);
        }
        out
    }

    /// Write the response to `out`, streaming a file body from disk.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.head_bytes()).await?;
        if self.omit_body {
            return Ok(());
        }
        match &self.file {
            Some(slice) => {
                let mut file = tokio::fs::File::open(&slice.path).await?;
                file.seek(SeekFrom::Start(slice.start)).await?;
                let copied = tokio::io::copy(&mut file.take(slice.len), out).await?;
                if copied < slice.len {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("{} shrank while being served", slice.path.display()),
                    ));
                }
            }
            None => out.write_all(&self.body).await?,
        }
        out.flush().await
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        206 => "Partial Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        _ => "",
    }
}
