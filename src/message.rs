//! Message model shared by requests and responses.

use crate::method::Method;
use crate::status::Status;
use crate::url::Url;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

/// HTTP protocol version, `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major version, 0 or 1 in practice.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl Version {
    /// HTTP/0.9, request line without version.
    pub const HTTP_09: Version = Version { major: 0, minor: 9 };
    /// HTTP/1.0
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    /// HTTP/1.1
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    /// Construct from parts.
    pub const fn new(major: u8, minor: u8) -> Self {
        Version { major, minor }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::HTTP_11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone)]
struct HeaderLine {
    name: String,
    lc_name: String,
    value: String,
}

/// Ordered header lines.
///
/// Names keep their original case but lookups are case-insensitive. There is at most
/// one line per name, setting an existing name replaces the value in place.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<HeaderLine>);

impl Headers {
    /// Empty header list.
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    /// Value of a header, case-insensitive name match.
    pub fn get(&self, name: &str) -> Option<&str> {
        let lc = name.to_ascii_lowercase();
        self.0
            .iter()
            .find(|l| l.lc_name == lc)
            .map(|l| l.value.as_str())
    }

    /// Set a header, replacing the value of an existing line with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let lc_name = name.to_ascii_lowercase();

        if let Some(line) = self.0.iter_mut().find(|l| l.lc_name == lc_name) {
            line.value = value;
            return;
        }

        self.0.push(HeaderLine {
            name,
            lc_name,
            value,
        });
    }

    /// Remove a header. The order of the remaining lines is kept.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let lc = name.to_ascii_lowercase();
        let idx = self.0.iter().position(|l| l.lc_name == lc)?;
        Some(self.0.remove(idx).value)
    }

    /// Tests whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tests if there are no header lines.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(name, value)` in insertion order, names in their original case.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|l| (l.name.as_str(), l.value.as_str()))
    }
}

impl<N, V> std::iter::FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (n, v) in iter {
            headers.set(n, v);
        }
        headers
    }
}

/// Common part of requests and responses: version, headers and an optional body.
///
/// The body can be read as bytes or as text. Whichever representation was not set is
/// derived on first access and cached.
#[derive(Debug, Clone, Default)]
pub struct Message {
    version: Version,
    headers: Headers,
    body_bytes: OnceLock<Vec<u8>>,
    body_text: OnceLock<String>,
}

impl Message {
    /// Empty message of the given version.
    pub fn new(version: Version) -> Self {
        Message {
            version,
            ..Default::default()
        }
    }

    /// HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Change the HTTP version.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// All headers, in the order they were set or parsed.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Shortcut for `headers().get(name)`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Shortcut for `headers_mut().set(name, value)`.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Shortcut for `headers_mut().remove(name)`.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// Tests if there is a non-empty body.
    pub fn has_body(&self) -> bool {
        self.body_bytes.get().is_some() || self.body_text.get().is_some()
    }

    /// Body as bytes. Text bodies are encoded as UTF-8.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        if let Some(b) = self.body_bytes.get() {
            return Some(&b[..]);
        }
        let text = self.body_text.get()?;
        Some(&self.body_bytes.get_or_init(|| text.as_bytes().to_vec())[..])
    }

    /// Body as text. Byte bodies are decoded as UTF-8, lossily.
    pub fn body_text(&self) -> Option<&str> {
        if let Some(t) = self.body_text.get() {
            return Some(t.as_str());
        }
        let bytes = self.body_bytes.get()?;
        Some(
            self.body_text
                .get_or_init(|| String::from_utf8_lossy(bytes).into_owned())
                .as_str(),
        )
    }

    /// Replace the body with bytes. An empty body is no body.
    pub fn set_body_bytes(&mut self, body: impl Into<Vec<u8>>) {
        self.clear_body();
        let body = body.into();
        if !body.is_empty() {
            self.body_bytes = OnceLock::from(body);
        }
    }

    /// Replace the body with text. An empty body is no body.
    pub fn set_body_text(&mut self, body: impl Into<String>) {
        self.clear_body();
        let body = body.into();
        if !body.is_empty() {
            self.body_text = OnceLock::from(body);
        }
    }

    /// Remove the body.
    pub fn clear_body(&mut self) {
        self.body_bytes = OnceLock::new();
        self.body_text = OnceLock::new();
    }

    /// Whether the connection must be closed after this message.
    ///
    /// In order: HTTP/0.x closes, HTTP/1.0 closes, `Connection: close` closes, and
    /// a message without `Content-Length` closes. Everything else is kept alive.
    pub fn close_connection(&self) -> bool {
        if self.version.major == 0 {
            return true;
        }
        if self.version.major == 1 && self.version.minor == 0 {
            return true;
        }
        if let Some(v) = self.header("connection") {
            if v.trim().eq_ignore_ascii_case("close") {
                return true;
            }
        }
        !self.headers.contains("content-length")
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " {}", self.version)?;
        if let Some(b) = self.body_bytes.get() {
            write!(f, " body=#{}", b.len())?;
        } else if let Some(t) = self.body_text.get() {
            write!(f, " body=c#{}", t.chars().count())?;
        }
        write!(f, " H: {:?}", self.headers.iter().collect::<Vec<_>>())
    }
}

/// An HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    message: Message,
}

impl Request {
    /// New HTTP/1.1 request. An empty `url` becomes `/`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Request::with_version(method, url, Version::HTTP_11)
    }

    /// New request of a specific version. An empty `url` becomes `/`.
    pub fn with_version(method: Method, url: impl Into<String>, version: Version) -> Self {
        let mut url = url.into();
        if url.is_empty() {
            url.push('/');
        }
        Request {
            method,
            url,
            message: Message::new(version),
        }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as sent on the request line.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The path part of the request target, without query and fragment.
    pub fn path(&self) -> String {
        Url::parse(&self.url).path.unwrap_or_else(|| "/".to_string())
    }

    /// Parsed request target.
    pub fn parsed_url(&self) -> Url {
        Url::parse(&self.url)
    }
}

impl Deref for Request {
    type Target = Message;
    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Request: {} {}", self.method, self.url)?;
        self.message.describe(f)?;
        write!(f, ">")
    }
}

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    message: Message,
}

impl Response {
    /// New HTTP/1.1 response.
    pub fn new(status: Status) -> Self {
        Response::with_version(status, Version::HTTP_11)
    }

    /// New response of a specific version.
    pub fn with_version(status: Status, version: Version) -> Self {
        Response {
            status,
            message: Message::new(version),
        }
    }

    /// Response status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Change the response status.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

impl Deref for Response {
    type Target = Message;
    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response: {}", self.status)?;
        self.message.describe(f)?;
        write!(f, ">")
    }
}

fn http_version(v: Version) -> http::Version {
    match (v.major, v.minor) {
        (0, _) => http::Version::HTTP_09,
        (1, 0) => http::Version::HTTP_10,
        _ => http::Version::HTTP_11,
    }
}

impl std::convert::TryFrom<&Request> for http::Request<Vec<u8>> {
    type Error = http::Error;

    fn try_from(req: &Request) -> Result<Self, Self::Error> {
        let mut bld = http::Request::builder()
            .method(http::Method::from_bytes(req.method.as_str().as_bytes())?)
            .uri(req.url.as_str())
            .version(http_version(req.version()));

        for (name, value) in req.headers().iter() {
            bld = bld.header(name, value);
        }

        bld.body(req.body_bytes().map(|b| b.to_vec()).unwrap_or_default())
    }
}

impl std::convert::TryFrom<&Response> for http::Response<Vec<u8>> {
    type Error = http::Error;

    fn try_from(res: &Response) -> Result<Self, Self::Error> {
        let mut bld = http::Response::builder()
            .status(res.status.code())
            .version(http_version(res.version()));

        for (name, value) in res.headers().iter() {
            bld = bld.header(name, value);
        }

        bld.body(res.body_bytes().map(|b| b.to_vec()).unwrap_or_default())
    }
}
