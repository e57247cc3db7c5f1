//! Incremental HTTP/1.x message parser.
//!
//! The parser is fed whatever bytes arrived on the socket and never needs the whole
//! message at once. Tokens (url, header names and values, body) are assembled in a
//! [`ByteAccumulator`] across `feed()` calls, so chunk boundaries can fall anywhere.
//!
//! ```
//! use h1_connect::{ParseHandler, Parser, ParserType, Request};
//!
//! #[derive(Default)]
//! struct Collect(Vec<Request>);
//!
//! impl ParseHandler for Collect {
//!     fn on_request(&mut self, req: Request) {
//!         self.0.push(req);
//!     }
//! }
//!
//! let mut parser = Parser::new(ParserType::Request);
//! let mut col = Collect::default();
//!
//! parser.feed(b"GET /hello HT", &mut col).unwrap();
//! parser.feed(b"TP/1.1\r\nHost: x\r\n\r\n", &mut col).unwrap();
//!
//! assert_eq!(col.0.len(), 1);
//! assert_eq!(col.0[0].url(), "/hello");
//! ```
//!
//! [`ByteAccumulator`]: crate::ByteAccumulator

use crate::accumulator::ByteAccumulator;
use crate::error::ParseError;
use crate::message::{Headers, Request, Response, Version};
use crate::method::Method;
use crate::status::Status;
use std::fmt;

/// Upper bound of start line plus header block, in bytes.
pub const MAX_HEADER_SIZE: usize = 80 * 1024;

/// Which kind of message a parser expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserType {
    /// Requests only, server side.
    Request,
    /// Responses only, client side.
    Response,
    /// Decide per message from the first token. A leading `HTTP/` is a response.
    Both,
}

/// Coarse phase of the message currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ParserState {
    Idle,
    ReadingUrl,
    ReadingHeaderName,
    ReadingHeaderValue,
    ReadingBody,
}

/// A message whose head has been parsed.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Incoming {
    Request(Request),
    Response(Response),
}

/// Receiver of parse events.
///
/// All methods have defaults, so an implementation only needs the events it cares
/// about. Typically that is `on_request` or `on_response`.
pub trait ParseHandler {
    /// The request target of a request line has been read.
    fn on_url(&mut self, _url: &str) {}

    /// A complete header line has been read.
    fn on_header(&mut self, _name: &str, _value: &str) {}

    /// Start line and headers are complete. Returning `false` rejects the message
    /// and the parse fails with `HeadersRejected`.
    fn on_headers(&mut self, _head: &Incoming) -> bool {
        true
    }

    /// If true, body bytes are given to `on_body_data` instead of being buffered
    /// and attached to the message.
    fn streams_body(&self) -> bool {
        false
    }

    /// A piece of body. Returning `false` fails the parse with `BodyRejected`.
    fn on_body_data(&mut self, _data: &[u8]) -> bool {
        true
    }

    /// A complete request.
    fn on_request(&mut self, _req: Request) {}

    /// A complete response.
    fn on_response(&mut self, _res: Response) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Idle,
    FirstToken,
    Url,
    RequestVersion,
    StatusCode,
    Reason,
    StartLineLf,
    HeaderStart,
    HeaderName,
    HeaderValueStart,
    HeaderValue,
    HeaderLf,
    HeadersEndLf,
    Body,
}

#[derive(Debug, Clone, Copy)]
enum BodyLength {
    Fixed(u64),
    UntilEof,
}

#[derive(Debug, Default)]
struct Head {
    response: bool,
    method: Option<Method>,
    url: String,
    status: u16,
    reason: String,
    version: Version,
    header_name: String,
    headers: Headers,
}

/// Byte stream parser for one direction of one connection.
///
/// There is exactly one message in progress at a time. After an error the parser
/// is dead and every subsequent `feed()` returns that same error.
pub struct Parser {
    kind: ParserType,
    step: Step,
    max_header_size: usize,
    head_size: usize,
    token: ByteAccumulator,
    body: ByteAccumulator,
    head: Head,
    current: Option<Incoming>,
    remaining: BodyLength,
    error: Option<ParseError>,
}

impl Parser {
    /// New parser for the given direction.
    pub fn new(kind: ParserType) -> Self {
        Parser {
            kind,
            step: Step::Idle,
            max_header_size: MAX_HEADER_SIZE,
            head_size: 0,
            token: ByteAccumulator::with_capacity(256),
            body: ByteAccumulator::default(),
            head: Head::default(),
            current: None,
            remaining: BodyLength::Fixed(0),
            error: None,
        }
    }

    /// Change the bound on the head size (start line plus headers).
    pub fn with_max_header_size(mut self, max: usize) -> Self {
        self.max_header_size = max;
        self
    }

    /// What this parser accepts.
    pub fn kind(&self) -> ParserType {
        self.kind
    }

    /// The error that killed this parser, if any.
    pub fn error(&self) -> Option<ParseError> {
        self.error
    }

    /// Coarse state, mostly useful for debugging.
    pub fn state(&self) -> ParserState {
        match self.step {
            Step::Idle => ParserState::Idle,
            Step::FirstToken
            | Step::Url
            | Step::RequestVersion
            | Step::StatusCode
            | Step::Reason
            | Step::StartLineLf => ParserState::ReadingUrl,
            Step::HeaderStart | Step::HeaderName | Step::HeadersEndLf => {
                ParserState::ReadingHeaderName
            }
            Step::HeaderValueStart | Step::HeaderValue | Step::HeaderLf => {
                ParserState::ReadingHeaderValue
            }
            Step::Body => ParserState::ReadingBody,
        }
    }

    /// Feed bytes to the parser. An empty slice signals end of input.
    ///
    /// Returns the number of bytes consumed, which is all of them unless there is an
    /// error. Several messages may complete in one call.
    pub fn feed<H>(&mut self, data: &[u8], handler: &mut H) -> Result<usize, ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        if let Some(e) = self.error {
            return Err(e);
        }

        let ret = if data.is_empty() {
            self.finish(handler)
        } else {
            trace!("feed {} bytes in {:?}", data.len(), self.step);
            self.execute(data, handler)
        };

        if let Err(e) = ret {
            debug!("Parse failed in {:?}: {}", self.step, e);
            self.error = Some(e);
        }

        ret
    }

    fn execute<H>(&mut self, data: &[u8], h: &mut H) -> Result<usize, ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        let mut i = 0;

        while i < data.len() {
            match self.step {
                Step::Idle => {
                    // stray CRLF between messages
                    if data[i] == b'\r' || data[i] == b'\n' {
                        i += 1;
                        continue;
                    }
                    self.begin_message();
                }
                Step::Body => {
                    i += self.read_body(&data[i..], h)?;
                }
                _ => {
                    if self.head_size >= self.max_header_size {
                        return Err(ParseError::HeaderOverflow);
                    }
                    let allowed = (self.max_header_size - self.head_size).min(data.len() - i);
                    let n = self.read_head(&data[i..(i + allowed)], h)?;
                    self.head_size += n;
                    i += n;
                }
            }
        }

        Ok(data.len())
    }

    fn finish<H>(&mut self, h: &mut H) -> Result<usize, ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        match (self.step, self.remaining) {
            (Step::Idle, _) => Ok(0),
            (Step::Body, BodyLength::UntilEof) => {
                self.message_complete(h);
                Ok(0)
            }
            _ => Err(ParseError::UnexpectedEof),
        }
    }

    fn begin_message(&mut self) {
        self.head = Head::default();
        self.token.reset();
        self.body.reset();
        self.head_size = 0;
        self.step = Step::FirstToken;
    }

    /// Process one run of token bytes or one delimiter. Returns bytes consumed.
    fn read_head<H>(&mut self, data: &[u8], h: &mut H) -> Result<usize, ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        use ParseError::*;

        match self.step {
            Step::FirstToken => {
                let end = span(data, |b| b != b' ' && !is_ctl(b));
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                if data[end] != b' ' || self.token.is_empty() {
                    return Err(MalformedStartLine);
                }
                self.first_token()?;
                Ok(end + 1)
            }

            Step::Url => {
                let end = span(data, |b| b > b' ' && b != 0x7f);
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                if self.token.is_empty() {
                    return Err(MalformedStartLine);
                }
                self.head.url = self.token.as_text().into_owned();
                self.token.reset();
                h.on_url(&self.head.url);

                match data[end] {
                    b' ' => self.step = Step::RequestVersion,
                    b'\r' => {
                        self.head.version = Version::HTTP_09;
                        self.step = Step::StartLineLf;
                    }
                    b'\n' => {
                        self.head.version = Version::HTTP_09;
                        self.end_start_line(h)?;
                    }
                    _ => return Err(MalformedStartLine),
                }
                Ok(end + 1)
            }

            Step::RequestVersion => {
                let end = span(data, |b| !is_ctl(b));
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                self.head.version = parse_version(&self.token).ok_or(MalformedStartLine)?;
                self.token.reset();
                self.end_start_line_at(data[end], h)?;
                Ok(end + 1)
            }

            Step::StatusCode => {
                let end = span(data, |b| b.is_ascii_digit());
                self.token.append(&data[..end]);
                if self.token.len() > 3 {
                    return Err(MalformedStartLine);
                }
                if end == data.len() {
                    return Ok(end);
                }
                if self.token.len() != 3 {
                    return Err(MalformedStartLine);
                }
                self.head.status = self
                    .token
                    .as_text()
                    .parse()
                    .map_err(|_| MalformedStartLine)?;
                self.token.reset();

                if data[end] == b' ' {
                    self.step = Step::Reason;
                } else {
                    self.end_start_line_at(data[end], h)?;
                }
                Ok(end + 1)
            }

            Step::Reason => {
                let end = span(data, |b| b == b'\t' || !is_ctl(b));
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                self.head.reason = self.token.as_text().trim().to_string();
                self.token.reset();
                self.end_start_line_at(data[end], h)?;
                Ok(end + 1)
            }

            Step::StartLineLf => {
                if data[0] != b'\n' {
                    return Err(MalformedStartLine);
                }
                self.end_start_line(h)?;
                Ok(1)
            }

            Step::HeaderStart => {
                match data[0] {
                    b'\r' => self.step = Step::HeadersEndLf,
                    b'\n' => self.headers_complete(h)?,
                    b if is_tchar(b) => {
                        self.token.reset();
                        self.token.append(&data[..1]);
                        self.step = Step::HeaderName;
                    }
                    // obsolete line folding is not supported
                    _ => return Err(InvalidHeaderToken),
                }
                Ok(1)
            }

            Step::HeaderName => {
                let end = span(data, is_tchar);
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                if data[end] != b':' {
                    return Err(InvalidHeaderToken);
                }
                self.head.header_name = self.token.as_text().into_owned();
                self.token.reset();
                self.step = Step::HeaderValueStart;
                Ok(end + 1)
            }

            Step::HeaderValueStart => {
                let end = span(data, |b| b == b' ' || b == b'\t');
                if end < data.len() {
                    self.step = Step::HeaderValue;
                }
                Ok(end)
            }

            Step::HeaderValue => {
                let end = span(data, |b| b == b'\t' || !is_ctl(b));
                self.token.append(&data[..end]);
                if end == data.len() {
                    return Ok(end);
                }
                match data[end] {
                    b'\r' => self.step = Step::HeaderLf,
                    b'\n' => self.finish_header(h),
                    _ => return Err(InvalidHeaderToken),
                }
                Ok(end + 1)
            }

            Step::HeaderLf => {
                if data[0] != b'\n' {
                    return Err(InvalidHeaderToken);
                }
                self.finish_header(h);
                Ok(1)
            }

            Step::HeadersEndLf => {
                if data[0] != b'\n' {
                    return Err(InvalidHeaderToken);
                }
                self.headers_complete(h)?;
                Ok(1)
            }

            Step::Idle | Step::Body => unreachable!("read_head in {:?}", self.step),
        }
    }

    fn first_token(&mut self) -> Result<(), ParseError> {
        let first = self.token.as_text().into_owned();
        self.token.reset();

        let response = match self.kind {
            ParserType::Request => false,
            ParserType::Response => true,
            ParserType::Both => first.starts_with("HTTP/"),
        };

        if response {
            self.head.version =
                parse_version(first.as_bytes()).ok_or(ParseError::MalformedStartLine)?;
            self.step = Step::StatusCode;
        } else {
            if !first.bytes().all(is_tchar) {
                return Err(ParseError::MalformedStartLine);
            }
            self.head.method = Some(Method::from_token(&first));
            self.step = Step::Url;
        }

        self.head.response = response;

        Ok(())
    }

    fn end_start_line_at<H>(&mut self, delim: u8, h: &mut H) -> Result<(), ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        match delim {
            b'\r' => {
                self.step = Step::StartLineLf;
                Ok(())
            }
            b'\n' => self.end_start_line(h),
            _ => Err(ParseError::MalformedStartLine),
        }
    }

    fn end_start_line<H>(&mut self, h: &mut H) -> Result<(), ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        // HTTP/0.9 has no headers.
        if self.head.version.major == 0 {
            return self.headers_complete(h);
        }
        self.step = Step::HeaderStart;
        Ok(())
    }

    fn finish_header<H>(&mut self, h: &mut H)
    where
        H: ParseHandler + ?Sized,
    {
        let name = std::mem::take(&mut self.head.header_name);
        let value = self.token.as_text().trim_end().to_string();
        self.token.reset();

        trace!("Header {}: {}", name, value);
        h.on_header(&name, &value);

        self.head.headers.set(name, value);
        self.step = Step::HeaderStart;
    }

    fn headers_complete<H>(&mut self, h: &mut H) -> Result<(), ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        let head = std::mem::take(&mut self.head);
        let remaining = body_length(&head)?;

        let incoming = if head.response {
            let reason = Some(head.reason.as_str()).filter(|r| !r.is_empty());
            let status = Status::with_reason(head.status, reason);
            let mut res = Response::with_version(status, head.version);
            *res.headers_mut() = head.headers;
            Incoming::Response(res)
        } else {
            let method = head.method.ok_or(ParseError::MalformedStartLine)?;
            let mut req = Request::with_version(method, head.url, head.version);
            *req.headers_mut() = head.headers;
            Incoming::Request(req)
        };

        debug!("Parsed head: {:?} body: {:?}", incoming, remaining);

        if !h.on_headers(&incoming) {
            return Err(ParseError::HeadersRejected);
        }

        self.token.reset();
        self.body.reset();
        self.current = Some(incoming);

        match remaining {
            BodyLength::Fixed(0) => self.message_complete(h),
            _ => {
                self.remaining = remaining;
                self.step = Step::Body;
            }
        }

        Ok(())
    }

    fn read_body<H>(&mut self, data: &[u8], h: &mut H) -> Result<usize, ParseError>
    where
        H: ParseHandler + ?Sized,
    {
        let take = match self.remaining {
            BodyLength::Fixed(n) => n.min(data.len() as u64) as usize,
            BodyLength::UntilEof => data.len(),
        };

        let chunk = &data[..take];

        if h.streams_body() {
            if !h.on_body_data(chunk) {
                return Err(ParseError::BodyRejected);
            }
        } else {
            self.body.append(chunk);
        }

        if let BodyLength::Fixed(n) = &mut self.remaining {
            *n -= take as u64;
            if *n == 0 {
                self.message_complete(h);
            }
        }

        Ok(take)
    }

    fn message_complete<H>(&mut self, h: &mut H)
    where
        H: ParseHandler + ?Sized,
    {
        self.step = Step::Idle;
        self.head_size = 0;
        self.remaining = BodyLength::Fixed(0);

        let body = if self.body.is_empty() {
            None
        } else {
            Some(self.body.to_vec())
        };
        self.body.reset();

        match self.current.take() {
            Some(Incoming::Request(mut req)) => {
                if let Some(body) = body {
                    req.set_body_bytes(body);
                }
                h.on_request(req);
            }
            Some(Incoming::Response(mut res)) => {
                if let Some(body) = body {
                    res.set_body_bytes(body);
                }
                h.on_response(res);
            }
            None => {}
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parser {{ kind: {:?}, step: {:?}, error: {:?} }}",
            self.kind, self.step, self.error
        )
    }
}

fn body_length(head: &Head) -> Result<BodyLength, ParseError> {
    if let Some(te) = head.headers.get("transfer-encoding") {
        if !te.trim().eq_ignore_ascii_case("identity") {
            return Err(ParseError::UnsupportedTransferEncoding);
        }
    }

    if head.response {
        let s = head.status;
        if (100..200).contains(&s) || s == 204 || s == 304 {
            return Ok(BodyLength::Fixed(0));
        }
    }

    match head.headers.get("content-length") {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::InvalidContentLength);
            }
            v.parse()
                .map(BodyLength::Fixed)
                .map_err(|_| ParseError::InvalidContentLength)
        }
        None if head.response => Ok(BodyLength::UntilEof),
        None => Ok(BodyLength::Fixed(0)),
    }
}

/// `HTTP/<major>.<minor>`
fn parse_version(token: &[u8]) -> Option<Version> {
    let rest = token.strip_prefix(b"HTTP/")?;
    let dot = rest.iter().position(|b| *b == b'.')?;
    Some(Version::new(
        parse_u8(&rest[..dot])?,
        parse_u8(&rest[dot + 1..])?,
    ))
}

fn parse_u8(digits: &[u8]) -> Option<u8> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Length of the leading run of bytes matching `pred`.
fn span(data: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    data.iter().position(|b| !pred(*b)).unwrap_or(data.len())
}

fn is_ctl(b: u8) -> bool {
    b < b' ' || b == 0x7f
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
