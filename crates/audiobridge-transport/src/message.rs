//! RTSP request/response types and their text wire format.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::TransportError;
use crate::{TransportResult, MAX_BODY_LEN, MAX_LINE_LEN, RTSP_VERSION};

/// Header carrying the request sequence number.
pub const CSEQ_HEADER: &str = "CSeq";

/// Header carrying the body length.
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// Header carrying the body type.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// RTSP request methods used by AirPlay senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Options,
    Announce,
    Setup,
    Record,
    Pause,
    Flush,
    Teardown,
    GetParameter,
    SetParameter,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Announce => "ANNOUNCE",
            Self::Setup => "SETUP",
            Self::Record => "RECORD",
            Self::Pause => "PAUSE",
            Self::Flush => "FLUSH",
            Self::Teardown => "TEARDOWN",
            Self::GetParameter => "GET_PARAMETER",
            Self::SetParameter => "SET_PARAMETER",
        }
    }

    /// Parse a method token from a request line.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "OPTIONS" => Self::Options,
            "ANNOUNCE" => Self::Announce,
            "SETUP" => Self::Setup,
            "RECORD" => Self::Record,
            "PAUSE" => Self::Pause,
            "FLUSH" => Self::Flush,
            "TEARDOWN" => Self::Teardown,
            "GET_PARAMETER" => Self::GetParameter,
            "SET_PARAMETER" => Self::SetParameter,
            _ => return None,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RTSP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: String,

    /// Header map, one value per key.
    pub headers: BTreeMap<String, String>,

    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// `OPTIONS *`, the usual first request on a new connection.
    pub fn options() -> Self {
        Self::new(Method::Options, "*")
    }

    /// `ANNOUNCE` carrying an SDP session description.
    pub fn announce(uri: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self::new(Method::Announce, uri).with_body("application/sdp", sdp.into().into_bytes())
    }

    /// `SET_PARAMETER` with the given body type.
    pub fn set_parameter(
        uri: impl Into<String>,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Self {
        Self::new(Method::SetParameter, uri).with_body(content_type, body)
    }

    /// Set a header, replacing any previous value under any casing.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, name.into(), value.into());
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Attach a body and its content type.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.set_header(CONTENT_TYPE_HEADER, content_type);
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Serialize to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, RTSP_VERSION);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
                continue;
            }
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if !self.body.is_empty() {
            out.push_str(&format!("{}: {}\r\n", CONTENT_LENGTH_HEADER, self.body.len()));
        }
        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// An RTSP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub protocol: String,
    pub status: u16,
    pub reason: String,
    pub headers: BTreeMap<String, String>,

    #[serde(skip)]
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers and no body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            protocol: RTSP_VERSION.to_string(),
            status,
            reason: reason.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header, replacing any previous value under any casing.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, name.into(), value.into());
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.set_header(CONTENT_TYPE_HEADER, content_type);
        self.body = body.into();
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Sequence number echoed by the server, if any.
    pub fn cseq(&self) -> Option<u64> {
        self.header(CSEQ_HEADER).and_then(|v| v.trim().parse().ok())
    }

    /// Serialize to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.protocol, self.status, self.reason);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
                continue;
            }
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if !self.body.is_empty() {
            out.push_str(&format!("{}: {}\r\n", CONTENT_LENGTH_HEADER, self.body.len()));
        }
        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Header names compare case-insensitively, so a new value replaces the
/// old one whatever casing either was written in.
fn insert_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Read one line, stripping the trailing CRLF. `None` on clean EOF.
///
/// Lines longer than [`MAX_LINE_LEN`] are rejected.
async fn read_line<R>(reader: &mut R) -> TransportResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader
        .take(MAX_LINE_LEN as u64 + 1)
        .read_line(&mut line)
        .await
        .map_err(|e| TransportError::Transport(format!("read failed: {}", e)))?;
    if n == 0 {
        return Ok(None);
    }
    if n > MAX_LINE_LEN && !line.ends_with('\n') {
        return Err(TransportError::Protocol(format!(
            "line exceeds {} bytes",
            MAX_LINE_LEN
        )));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

/// Read header lines up to the blank separator line.
async fn read_headers<R>(reader: &mut R) -> TransportResult<BTreeMap<String, String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = BTreeMap::new();
    loop {
        let line = read_line(reader)
            .await?
            .ok_or_else(|| TransportError::Transport("connection closed in headers".to_string()))?;
        if line.is_empty() {
            return Ok(headers);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| TransportError::Protocol(format!("malformed header: {}", line)))?;
        insert_header(
            &mut headers,
            name.trim().to_string(),
            value.trim().to_string(),
        );
    }
}

async fn read_body<R>(reader: &mut R, headers: &BTreeMap<String, String>) -> TransportResult<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let len = match find_header(headers, CONTENT_LENGTH_HEADER) {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map_err(|_| TransportError::Protocol(format!("bad Content-Length: {}", value)))?,
        None => return Ok(Bytes::new()),
    };
    if len > MAX_BODY_LEN {
        return Err(TransportError::Protocol(format!(
            "body of {} bytes exceeds limit",
            len
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| TransportError::Transport(format!("body read failed: {}", e)))?;
    Ok(Bytes::from(body))
}

/// Read and parse exactly one response.
pub async fn read_response<R>(reader: &mut R) -> TransportResult<Response>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader)
        .await?
        .ok_or_else(|| TransportError::Transport("connection closed before response".to_string()))?;

    let mut parts = line.splitn(3, ' ');
    let protocol = parts.next().unwrap_or_default();
    if !protocol.starts_with("RTSP/") {
        return Err(TransportError::Protocol(format!("bad status line: {}", line)));
    }
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Protocol(format!("bad status code: {}", line)))?;
    let reason = parts.next().unwrap_or_default().to_string();

    let headers = read_headers(reader).await?;
    let body = read_body(reader, &headers).await?;

    Ok(Response {
        protocol: protocol.to_string(),
        status,
        reason,
        headers,
        body,
    })
}

/// Read and parse exactly one request. `None` when the peer closed cleanly.
pub async fn read_request<R>(reader: &mut R) -> TransportResult<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let line = match read_line(reader).await? {
        Some(line) => line,
        None => return Ok(None),
    };

    let mut parts = line.split(' ');
    let (method, uri, protocol) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(p)) => (m, u, p),
        _ => return Err(TransportError::Protocol(format!("bad request line: {}", line))),
    };
    if !protocol.starts_with("RTSP/") {
        return Err(TransportError::Protocol(format!("bad protocol: {}", protocol)));
    }
    let method = Method::parse(method)
        .ok_or_else(|| TransportError::Protocol(format!("unknown method: {}", method)))?;

    let headers = read_headers(reader).await?;
    let body = read_body(reader, &headers).await?;

    Ok(Some(Request {
        method,
        uri: uri.to_string(),
        headers,
        body,
    }))
}
