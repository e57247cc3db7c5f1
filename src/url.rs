//! Lenient URL splitting.
//!
//! This is not a validating RFC 3986 parser. It splits
//! `scheme://[user@]host[:port]/path[?query][#fragment]` (or a bare
//! path/query/fragment) into its parts, keeping every part escaped.

use percent_encoding::percent_decode_str;
use std::fmt;

/// The parts of a URL, all still percent-escaped. Empty parts are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Url {
    pub scheme: Option<String>,
    pub user_info: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Url {
    /// Split a URL string. Never fails, unparseable bits end up in `path` or are dropped.
    ///
    /// A port that isn't a number is dropped, the host is kept.
    pub fn parse(s: &str) -> Url {
        let mut url = Url::default();
        let mut rest = s;

        if let Some(idx) = rest.find('#') {
            url.fragment = Some(rest[idx + 1..].to_string());
            rest = &rest[..idx];
        }

        if let Some(idx) = rest.find('?') {
            url.query = Some(rest[idx + 1..].to_string());
            rest = &rest[..idx];
        }

        match rest.find("://") {
            Some(idx) if !rest[..idx].contains('/') => {
                url.scheme = Some(rest[..idx].to_string());
                let after = &rest[idx + 3..];

                let (mut authority, path) = match after.find('/') {
                    Some(i) => (&after[..i], &after[i..]),
                    None => (after, ""),
                };

                if let Some(i) = authority.find('@') {
                    url.user_info = Some(authority[..i].to_string());
                    authority = &authority[i + 1..];
                }

                if let Some(i) = authority.find(':') {
                    url.host = Some(authority[..i].to_string());
                    url.port = authority[i + 1..].parse().ok();
                } else {
                    url.host = Some(authority.to_string());
                }

                url.path = Some(path.to_string());
            }
            // no scheme, means no host, port or user info
            _ => url.path = Some(rest.to_string()),
        }

        url.clear_empty_strings();
        url
    }

    fn clear_empty_strings(&mut self) {
        for part in [
            &mut self.scheme,
            &mut self.user_info,
            &mut self.host,
            &mut self.path,
            &mut self.query,
            &mut self.fragment,
        ] {
            if part.as_deref() == Some("") {
                *part = None;
            }
        }
    }

    /// Tests if no part is set. The port only counts together with a host.
    pub fn is_empty(&self) -> bool {
        self.scheme.is_none()
            && self.user_info.is_none()
            && self.host.is_none()
            && self.path.is_none()
            && self.query.is_none()
            && self.fragment.is_none()
    }

    /// `host` or `host:port` when a port was given.
    pub fn host_and_port(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        Some(match self.port {
            Some(p) => format!("{}:{}", host, p),
            None => host.clone(),
        })
    }

    /// The explicit port, or the well-known port of the scheme.
    pub fn port_or_default(&self) -> Option<u16> {
        self.port
            .or_else(|| self.scheme.as_deref().and_then(port_for_scheme))
    }

    /// Request target as sent on a request line. `/` when there's nothing.
    pub fn path_with_query_and_fragment(&self) -> String {
        let mut s = self.path.clone().unwrap_or_else(|| "/".to_string());
        if let Some(q) = &self.query {
            s.push('?');
            s.push_str(q);
        }
        if let Some(f) = &self.fragment {
            s.push('#');
            s.push_str(f);
        }
        s
    }
}

impl From<&str> for Url {
    fn from(s: &str) -> Self {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self
            .scheme
            .as_deref()
            .or_else(|| self.port.and_then(scheme_for_port));

        if let (Some(scheme), Some(host)) = (scheme, &self.host) {
            write!(f, "{}://", scheme)?;
            if let Some(u) = &self.user_info {
                write!(f, "{}@", u)?;
            }
            write!(f, "{}", host)?;
            if let Some(p) = self.port {
                write!(f, ":{}", p)?;
            }
        }

        if self.path.is_some() || self.query.is_some() || self.fragment.is_some() {
            if let Some(p) = &self.path {
                if !p.starts_with('/') && self.host.is_some() {
                    write!(f, "/")?;
                }
            }
            write!(f, "{}", self.path_with_query_and_fragment())?;
        }

        Ok(())
    }
}

/// Well-known port of a scheme.
pub fn port_for_scheme(scheme: &str) -> Option<u16> {
    Some(match scheme {
        "echo" => 7,
        "ftp" => 21,
        "telnet" => 23,
        "smtp" => 25,
        "gopher" => 70,
        "finger" => 79,
        "http" | "ws" => 80,
        "https" | "wss" => 443,
        _ => return None,
    })
}

/// Scheme usually served on a port.
pub fn scheme_for_port(port: u16) -> Option<&'static str> {
    Some(match port {
        7 => "echo",
        21 => "ftp",
        23 => "telnet",
        25 => "smtp",
        70 => "gopher",
        79 => "finger",
        80 => "http",
        443 => "https",
        _ => return None,
    })
}

/// Decode `%XX` escapes.
///
/// Exactly two hex digits (either case) must follow the `%`, otherwise the `%` and
/// whatever follows are passed through as is. Decoded bytes that don't form valid
/// UTF-8 are replaced.
pub fn percent_unescape(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
