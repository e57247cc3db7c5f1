use std::fmt;
use std::io;

/// Possible errors from this crate.
#[derive(Debug)]
pub enum Error {
    /// A user/usage problem such as sending on a closed connection.
    User(String),
    /// A wrapped std::io::Error from the underlying transport (socket).
    Io(io::Error),
    /// The incoming byte stream is not valid HTTP/1.x.
    Parse(ParseError),
    /// An outbound call failed before a response arrived.
    Connect(ConnectError),
}

/// Failures of the incremental parser. All of them are fatal to the connection
/// the bytes came from, the parser never resynchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Request or status line could not be parsed.
    MalformedStartLine,
    /// Header name with non-token characters, or a missing line feed.
    InvalidHeaderToken,
    /// Start line and headers exceed the configured maximum size.
    HeaderOverflow,
    /// `Content-Length` is not a plain decimal number.
    InvalidContentLength,
    /// `Transfer-Encoding: chunked` is not supported.
    UnsupportedTransferEncoding,
    /// Input ended in the middle of a message.
    UnexpectedEof,
    /// The headers callback refused the message.
    HeadersRejected,
    /// The body callback refused a chunk of body data.
    BodyRejected,
}

/// Failures of a `ClientCall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// The host name did not resolve to any address.
    DnsLookup,
    /// Could not establish a connection to the resolved address.
    Connect,
    /// The URL lacks an `http` scheme or a host.
    UrlMalformed,
    /// The connection closed before a response was received.
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::User(v) => write!(f, "{}", v),
            Error::Io(v) => fmt::Display::fmt(v, f),
            Error::Parse(v) => write!(f, "http parser: {}", v),
            Error::Connect(v) => write!(f, "http call: {}", v),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ParseError::MalformedStartLine => "Malformed request or status line",
            ParseError::InvalidHeaderToken => "Invalid character in header",
            ParseError::HeaderOverflow => "Too many header bytes seen; overflow detected",
            ParseError::InvalidContentLength => "Invalid character in content-length header",
            ParseError::UnsupportedTransferEncoding => "Unsupported transfer-encoding",
            ParseError::UnexpectedEof => "Stream ended at an unexpected time",
            ParseError::HeadersRejected => "Message rejected by headers callback",
            ParseError::BodyRejected => "Body data rejected by callback",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectError::DnsLookup => "DNS lookup failed",
            ConnectError::Connect => "Could not connect to server",
            ConnectError::UrlMalformed => "Given URL cannot be processed",
            ConnectError::ConnectionClosed => "Connection closed before response",
        };
        write!(f, "{}", s)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for ParseError {}
impl std::error::Error for ConnectError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::Connect(e)
    }
}
