//! Middleware pipeline on top of [`Server`].
//!
//! Middleware is registered in order, optionally restricted to a path prefix. For
//! each request the entries whose prefix matches the request path run one after
//! another. Each one decides whether to continue by calling the [`Next`] it is given.
//!
//! ```rust, no_run
//! use h1_connect::Connect;
//!
//! let app = Connect::new();
//!
//! app.with(|req, res, con, next| {
//!     println!("{} {}", req.method(), req.url());
//!     next.call(req, res, con);
//! })
//! .with_prefix("/hello", |_req, res, con, _next| {
//!     res.set_body_text("Hello\n");
//!     con.send_response(res).ok();
//! });
//!
//! app.listen(1337).unwrap();
//! ```

use crate::connection::Connection;
use crate::message::{Request, Response};
use crate::server::Server;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, RwLock};

/// A middleware function.
pub type Middleware = dyn Fn(&Request, &mut Response, &Connection, Next<'_>) + Send + Sync;

struct MiddlewareEntry {
    prefix: Option<String>,
    middleware: Box<Middleware>,
}

impl MiddlewareEntry {
    fn matches(&self, path: &str) -> bool {
        match &self.prefix {
            Some(prefix) => path.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Continuation handed to a middleware. Calling it runs the next matching entry,
/// after the last one it does nothing. Not calling it ends the chain.
pub struct Next<'a> {
    chain: &'a [Arc<MiddlewareEntry>],
    index: usize,
}

impl Next<'_> {
    /// Run the rest of the chain.
    pub fn call(self, req: &Request, res: &mut Response, con: &Connection) {
        let entry = match self.chain.get(self.index) {
            Some(v) => v,
            None => return,
        };

        let next = Next {
            chain: self.chain,
            index: self.index + 1,
        };

        (entry.middleware)(req, res, con, next);
    }

    /// Number of matching entries left after this continuation.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Next {{ index: {}, of: {} }}", self.index, self.chain.len())
    }
}

/// A [`Server`] running a middleware pipeline.
///
/// Dereferences to the server for `listen`, `stop` and friends.
#[derive(Clone)]
pub struct Connect {
    server: Server,
    entries: Arc<RwLock<Vec<Arc<MiddlewareEntry>>>>,
}

impl Connect {
    /// New pipeline without middleware. Not listening until `listen` is called.
    pub fn new() -> Self {
        let server = Server::new();
        let entries: Arc<RwLock<Vec<Arc<MiddlewareEntry>>>> = Default::default();

        let chain = entries.clone();
        server.on_request(move |req, res, con| {
            run_pipeline(&chain, req, res, con);
        });

        Connect { server, entries }
    }

    /// Append middleware that sees every request.
    pub fn with<F>(&self, middleware: F) -> &Self
    where
        F: Fn(&Request, &mut Response, &Connection, Next<'_>) + Send + Sync + 'static,
    {
        self.push(None, Box::new(middleware))
    }

    /// Append middleware for requests whose path starts with `prefix`.
    pub fn with_prefix<F>(&self, prefix: &str, middleware: F) -> &Self
    where
        F: Fn(&Request, &mut Response, &Connection, Next<'_>) + Send + Sync + 'static,
    {
        self.push(Some(prefix.to_string()), Box::new(middleware))
    }

    fn push(&self, prefix: Option<String>, middleware: Box<Middleware>) -> &Self {
        let entry = MiddlewareEntry { prefix, middleware };
        self.entries.write().unwrap().push(Arc::new(entry));
        self
    }

    /// Number of registered middleware entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Tests if no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the pipeline for a request without a network server. Handy to test
    /// middleware against a connection of your own.
    pub fn handle(&self, req: &Request, res: &mut Response, con: &Connection) {
        run_pipeline(&self.entries, req, res, con);
    }
}

fn run_pipeline(
    entries: &RwLock<Vec<Arc<MiddlewareEntry>>>,
    req: &Request,
    res: &mut Response,
    con: &Connection,
) {
    let path = req.path();

    // snapshot, middleware may register more middleware.
    let matching: Vec<Arc<MiddlewareEntry>> = entries
        .read()
        .unwrap()
        .iter()
        .filter(|e| e.matches(&path))
        .cloned()
        .collect();

    trace!("{} middleware match {}", matching.len(), path);

    let next = Next {
        chain: &matching[..],
        index: 0,
    };

    next.call(req, res, con);
}

impl Default for Connect {
    fn default() -> Self {
        Connect::new()
    }
}

impl Deref for Connect {
    type Target = Server;
    fn deref(&self) -> &Server {
        &self.server
    }
}

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connect {{ entries: {}, server: {:?} }}", self.len(), self.server)
    }
}
