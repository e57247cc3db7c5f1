use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// HTTP request method.
///
/// The standard verbs (including the WebDAV/CalDAV/UPnP ones) have their own variant,
/// anything else is carried verbatim in `Extension`. Equality is defined on the wire
/// token, so `Method::Extension("GET".into()) == Method::Get`.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Method {
    Get,
    Head,
    Put,
    Delete,
    Post,
    Options,

    Propfind,
    Proppatch,
    Mkcol,
    Report,
    Mkcalendar,
    Batch,

    Connect,
    Trace,

    Copy,
    Move,
    Lock,
    Unlock,
    Search,

    Mkactivity,
    Checkout,
    Merge,

    MSearch,
    Notify,
    Subscribe,
    Unsubscribe,

    Patch,
    Purge,

    /// Any token not in the list above.
    Extension(String),
}

impl Method {
    /// Map a wire token to a method. Unknown tokens become `Extension`.
    pub fn from_token(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            "PROPFIND" => Method::Propfind,
            "PROPPATCH" => Method::Proppatch,
            "MKCOL" => Method::Mkcol,
            "REPORT" => Method::Report,
            "MKCALENDAR" => Method::Mkcalendar,
            "BATCH" => Method::Batch,
            "CONNECT" => Method::Connect,
            "TRACE" => Method::Trace,
            "COPY" => Method::Copy,
            "MOVE" => Method::Move,
            "LOCK" => Method::Lock,
            "UNLOCK" => Method::Unlock,
            "SEARCH" => Method::Search,
            "MKACTIVITY" => Method::Mkactivity,
            "CHECKOUT" => Method::Checkout,
            "MERGE" => Method::Merge,
            "M-SEARCH" => Method::MSearch,
            "NOTIFY" => Method::Notify,
            "SUBSCRIBE" => Method::Subscribe,
            "UNSUBSCRIBE" => Method::Unsubscribe,
            "PATCH" => Method::Patch,
            "PURGE" => Method::Purge,
            _ => Method::Extension(token.to_string()),
        }
    }

    /// The canonical wire token.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Post => "POST",
            Method::Options => "OPTIONS",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Mkcol => "MKCOL",
            Method::Report => "REPORT",
            Method::Mkcalendar => "MKCALENDAR",
            Method::Batch => "BATCH",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
            Method::Copy => "COPY",
            Method::Move => "MOVE",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
            Method::Search => "SEARCH",
            Method::Mkactivity => "MKACTIVITY",
            Method::Checkout => "CHECKOUT",
            Method::Merge => "MERGE",
            Method::MSearch => "M-SEARCH",
            Method::Notify => "NOTIFY",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
            Method::Patch => "PATCH",
            Method::Purge => "PURGE",
            Method::Extension(v) => v,
        }
    }

    /// Whether the method is safe. `None` for extension methods, we can't tell.
    pub fn is_safe(&self) -> Option<bool> {
        match self {
            Method::Get | Method::Head | Method::Options => Some(true),
            Method::Propfind | Method::Report | Method::Batch => Some(true),
            Method::Extension(_) => None,
            _ => Some(false),
        }
    }

    /// Whether the method is idempotent. `None` for extension methods.
    pub fn is_idempotent(&self) -> Option<bool> {
        match self {
            Method::Get | Method::Head | Method::Put | Method::Delete | Method::Options => {
                Some(true)
            }
            Method::Propfind | Method::Report | Method::Proppatch => Some(true),
            Method::Mkcol | Method::Mkcalendar | Method::Batch => Some(true),
            Method::Extension(_) => None,
            _ => Some(false),
        }
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Method) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Method {}

impl Hash for Method {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialEq<str> for Method {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Method {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<&str> for Method {
    fn from(v: &str) -> Self {
        Method::from_token(v)
    }
}

impl FromStr for Method {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from_token(s))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::convert::TryFrom<&Method> for http::Method {
    type Error = http::method::InvalidMethod;
    fn try_from(m: &Method) -> Result<Self, Self::Error> {
        http::Method::from_bytes(m.as_str().as_bytes())
    }
}
