//! Outbound calls.
//!
//! A [`ClientCall`] resolves the host, connects, sends its request and waits for
//! one response. Results are reported through `done`, `fail` and `always`
//! callbacks, which can be registered before or after the call finishes.
//!
//! ```rust, no_run
//! h1_connect::get("http://www.example.com/")
//!     .done(|_req, res| println!("got {}", res.status()))
//!     .fail(|_req, err| println!("failed: {}", err))
//!     .always(|_req, _res, _err| println!("we are done here"));
//! ```
//!
//! While a call is in flight it is kept in a process wide registry, so the caller
//! doesn't need to hold on to it.

use crate::connection::{Connection, ConnectionId};
use crate::error::ConnectError;
use crate::executor::{default_executor, DebugExecutor, Executor};
use crate::message::{Headers, Request, Response, Version};
use crate::method::Method;
use crate::url::Url;
use async_std::net::{TcpStream, ToSocketAddrs};
use futures_channel::oneshot;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// `User-Agent` sent by [`get`].
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static RUNNING: Mutex<BTreeMap<CallId, ClientCall>> = Mutex::new(BTreeMap::new());

/// Number of calls currently in flight in this process.
pub fn running_calls() -> usize {
    RUNNING.lock().unwrap().len()
}

/// Identifier of a call, unique in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HC({})", self.0)
    }
}

/// Where a call is at. States only ever move forward, `Done` and `Fail` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum CallState {
    Idle,
    DnsLookup,
    Connecting,
    Sending,
    Receiving,
    Done,
    Fail,
}

impl CallState {
    /// `Done` or `Fail`.
    pub fn is_finished(&self) -> bool {
        matches!(self, CallState::Done | CallState::Fail)
    }
}

type DoneCallback = Box<dyn FnOnce(&Request, &Response) + Send>;
type FailCallback = Box<dyn FnOnce(&Request, ConnectError) + Send>;
type AlwaysCallback = Box<dyn FnOnce(&Request, Option<&Response>, Option<ConnectError>) + Send>;

/// An asynchronous, single shot HTTP request.
///
/// Cloning gives another handle to the same call.
#[derive(Clone)]
pub struct ClientCall(Arc<CallInner>);

struct CallInner {
    id: CallId,
    url: Url,
    request: Request,
    response: OnceLock<Response>,
    error: OnceLock<ConnectError>,
    shared: Mutex<Shared>,
}

struct Shared {
    state: CallState,
    registered: bool,
    executor: Arc<dyn Executor>,
    connection: Option<Connection>,
    done: Vec<DoneCallback>,
    fail: Vec<FailCallback>,
    always: Vec<AlwaysCallback>,
}

/// GET a URL with default headers. See [`get_with`].
pub fn get(url: &str) -> ClientCall {
    get_with(url, Headers::new(), Version::HTTP_11)
}

/// GET a URL.
///
/// The URL must be `http` and have a host, otherwise the returned call has already
/// failed with `UrlMalformed`. `Host`, `User-Agent`, `Content-Length: 0` and
/// `Connection: Close` are set on top of the given headers. The call is running
/// when returned.
pub fn get_with(url: &str, headers: Headers, version: Version) -> ClientCall {
    let url = Url::parse(url);

    if url.scheme.as_deref() != Some("http") || url.host.is_none() {
        warn!("Cannot GET url: {}", url);
        let call = ClientCall::new(url, Request::new(Method::Get, "/"));
        call.stop_with_error(ConnectError::UrlMalformed);
        return call;
    }

    let mut req = Request::with_version(Method::Get, url.path_with_query_and_fragment(), version);
    *req.headers_mut() = headers;

    if let Some(host) = url.host_and_port() {
        req.set_header("Host", host);
    }
    req.set_header("User-Agent", USER_AGENT);
    req.set_header("Content-Length", "0");
    // no connection reuse
    req.set_header("Connection", "Close");

    let call = ClientCall::new(url, req);
    call.run();
    call
}

impl ClientCall {
    /// New idle call. The request target should be the path of `url`.
    pub fn new(url: impl Into<Url>, request: Request) -> Self {
        let id = CallId(NEXT_ID.fetch_add(1, Ordering::Relaxed));

        ClientCall(Arc::new(CallInner {
            id,
            url: url.into(),
            request,
            response: OnceLock::new(),
            error: OnceLock::new(),
            shared: Mutex::new(Shared {
                state: CallState::Idle,
                registered: false,
                executor: default_executor(),
                connection: None,
                done: vec![],
                fail: vec![],
                always: vec![],
            }),
        }))
    }

    /// Run the lookup, connection and callbacks on another executor.
    pub fn with_executor(self, executor: Arc<dyn Executor>) -> Self {
        self.0.shared.lock().unwrap().executor = executor;
        self
    }

    /// Process unique id of this call.
    pub fn id(&self) -> CallId {
        self.0.id
    }

    /// The URL being called.
    pub fn url(&self) -> &Url {
        &self.0.url
    }

    /// The request sent, or to be sent.
    pub fn request(&self) -> &Request {
        &self.0.request
    }

    /// Current state.
    pub fn state(&self) -> CallState {
        self.0.shared.lock().unwrap().state
    }

    /// The response once the call is `Done`.
    pub fn response(&self) -> Option<&Response> {
        self.0.response.get()
    }

    /// The error once the call is `Fail`.
    pub fn error(&self) -> Option<ConnectError> {
        self.0.error.get().copied()
    }

    /// Tests if the call is in the registry of running calls.
    pub fn is_registered(&self) -> bool {
        self.0.shared.lock().unwrap().registered
    }

    /// Start the call.
    ///
    /// # Panics
    ///
    /// If the call is not `Idle`.
    pub fn run(&self) {
        let executor = {
            let mut lock = self.0.shared.lock().unwrap();
            assert_eq!(lock.state, CallState::Idle, "run() on a call that is not idle");
            lock.state = CallState::DnsLookup;
            // in the registry before anyone can see it registered.
            RUNNING.lock().unwrap().insert(self.0.id, self.clone());
            lock.registered = true;
            lock.executor.clone()
        };

        debug!("{} Run {}", self.0.id, self.0.request);

        let call = self.clone();
        executor.execute(Box::pin(async move { call.drive().await }));
    }

    async fn drive(self) {
        let host = self.0.url.host.clone().unwrap_or_default();
        let port = self.0.url.port_or_default().unwrap_or(80);

        let addrs: Vec<SocketAddr> = match (host.as_str(), port).to_socket_addrs().await {
            Ok(v) => v.collect(),
            Err(e) => {
                debug!("{} Lookup of {} failed: {}", self.0.id, host, e);
                vec![]
            }
        };

        if addrs.is_empty() {
            self.stop_with_error(ConnectError::DnsLookup);
            return;
        }

        debug!("{} Resolved {}: {:?}", self.0.id, host, addrs);

        if !self.advance(CallState::DnsLookup, CallState::Connecting) {
            return;
        }

        let stream = match TcpStream::connect(&addrs[..]).await {
            Ok(v) => v,
            Err(e) => {
                debug!("{} Connect failed: {}", self.0.id, e);
                self.stop_with_error(ConnectError::Connect);
                return;
            }
        };

        let executor = self.0.shared.lock().unwrap().executor.clone();
        let con = Connection::tcp(stream, executor);

        {
            let mut lock = self.0.shared.lock().unwrap();
            if lock.state != CallState::Connecting {
                drop(lock);
                con.close();
                return;
            }
            lock.state = CallState::Sending;
            lock.connection = Some(con.clone());
        }

        debug!("{} Connected to {:?}", self.0.id, con.peer_addr());

        let weak = Arc::downgrade(&self.0);
        con.on_response(move |res, _| {
            if let Some(inner) = weak.upgrade() {
                ClientCall(inner).handle_response(res);
            }
        });

        let weak = Arc::downgrade(&self.0);
        con.on_close(move |id| {
            if let Some(inner) = weak.upgrade() {
                ClientCall(inner).handle_close(id);
            }
        });

        let mut req = self.0.request.clone();

        if let Err(e) = con.send_request(&mut req) {
            debug!("{} Send failed: {}", self.0.id, e);
            self.stop_with_error(ConnectError::ConnectionClosed);
            return;
        }

        if self.advance(CallState::Sending, CallState::Receiving) {
            debug!("{} Sent request", self.0.id);
        }
    }

    fn advance(&self, from: CallState, to: CallState) -> bool {
        let mut lock = self.0.shared.lock().unwrap();
        if lock.state != from {
            return false;
        }
        trace!("{} {:?} -> {:?}", self.0.id, from, to);
        lock.state = to;
        true
    }

    fn handle_response(&self, res: Response) {
        let (done, always, con) = {
            let mut lock = self.0.shared.lock().unwrap();
            if lock.state.is_finished() {
                debug!("{} Ignore response in {:?}", self.0.id, lock.state);
                return;
            }
            debug!("{} Got response: {}", self.0.id, res);
            let _ = self.0.response.set(res);
            lock.state = CallState::Done;
            (
                std::mem::take(&mut lock.done),
                std::mem::take(&mut lock.always),
                lock.connection.take(),
            )
        };

        if let Some(res) = self.0.response.get() {
            for cb in done {
                cb(&self.0.request, res);
            }
            for cb in always {
                cb(&self.0.request, Some(res), None);
            }
        }

        self.unregister();

        if let Some(con) = con {
            con.close();
        }
    }

    fn handle_close(&self, id: ConnectionId) {
        trace!("{} Connection {} closed", self.0.id, id);
        if !self.state().is_finished() {
            self.stop_with_error(ConnectError::ConnectionClosed);
        }
    }

    /// Fail the call. Does nothing if it already finished.
    pub fn stop_with_error(&self, error: ConnectError) {
        let (fail, always, con) = {
            let mut lock = self.0.shared.lock().unwrap();
            if lock.state.is_finished() {
                return;
            }
            let _ = self.0.error.set(error);
            lock.state = CallState::Fail;
            (
                std::mem::take(&mut lock.fail),
                std::mem::take(&mut lock.always),
                lock.connection.take(),
            )
        };

        debug!("{} Stop on error: {}", self.0.id, error);

        for cb in fail {
            cb(&self.0.request, error);
        }
        for cb in always {
            cb(&self.0.request, None, Some(error));
        }

        if let Some(con) = con {
            con.close();
        }

        self.unregister();
    }

    fn unregister(&self) {
        let registered = std::mem::replace(&mut self.0.shared.lock().unwrap().registered, false);
        if !registered {
            return;
        }

        let removed = RUNNING.lock().unwrap().remove(&self.0.id);
        if removed.is_none() {
            warn!("{} Not found in running calls", self.0.id);
        }
    }

    /// Callback for a successful response. Runs right away if the call is already
    /// `Done`, never if it failed.
    pub fn done<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Request, &Response) + Send + 'static,
    {
        let mut lock = self.0.shared.lock().unwrap();
        match lock.state {
            CallState::Done => {
                drop(lock);
                if let Some(res) = self.0.response.get() {
                    f(&self.0.request, res);
                }
            }
            CallState::Fail => {}
            _ => lock.done.push(Box::new(f)),
        }
        self
    }

    /// Callback for failure. Runs right away if the call already failed, never if it
    /// succeeded.
    pub fn fail<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Request, ConnectError) + Send + 'static,
    {
        let mut lock = self.0.shared.lock().unwrap();
        match lock.state {
            CallState::Fail => {
                drop(lock);
                if let Some(err) = self.error() {
                    f(&self.0.request, err);
                }
            }
            CallState::Done => {}
            _ => lock.fail.push(Box::new(f)),
        }
        self
    }

    /// Callback for when the call finishes, either way. Runs right away if it
    /// already has.
    pub fn always<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Request, Option<&Response>, Option<ConnectError>) + Send + 'static,
    {
        let mut lock = self.0.shared.lock().unwrap();
        if lock.state.is_finished() {
            drop(lock);
            f(&self.0.request, self.response(), self.error());
        } else {
            lock.always.push(Box::new(f));
        }
        self
    }

    /// Wait for the call to finish.
    ///
    /// Never resolves for a call that is not run.
    pub async fn finished(&self) -> Result<Response, ConnectError> {
        let (tx, rx) = oneshot::channel();

        self.always(move |_, res, err| {
            let ret = match (res, err) {
                (Some(res), _) => Ok(res.clone()),
                (None, Some(err)) => Err(err),
                (None, None) => Err(ConnectError::ConnectionClosed),
            };
            let _ = tx.send(ret);
        });

        rx.await.unwrap_or(Err(ConnectError::ConnectionClosed))
    }
}

impl PartialEq for ClientCall {
    fn eq(&self, other: &ClientCall) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ClientCall {}

impl fmt::Debug for ClientCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = self.0.shared.lock().unwrap();
        write!(
            f,
            "ClientCall {{ id: {}, url: {}, state: {:?}, executor: {:?} }}",
            self.0.id,
            self.0.url,
            lock.state,
            DebugExecutor(&lock.executor)
        )
    }
}
