//! One socket, one parser.
//!
//! A [`Connection`] splits its socket in a read half and a write half, each driven by
//! its own task on an [`Executor`]. The read task feeds the parser and emits complete
//! requests and responses through [`EventQueue`]s. The write task drains an ordered
//! queue of serialized messages, so writes from different callers never interleave.
//!
//! [`Executor`]: crate::Executor
//! [`EventQueue`]: crate::EventQueue

use crate::err_closed;
use crate::event_queue::EventQueue;
use crate::executor::{default_executor, Executor};
use crate::http11::{write_request, write_response};
use crate::message::{Request, Response};
use crate::parser::{ParseHandler, Parser, ParserType};
use crate::{AsyncRead, AsyncWrite, Error};
use async_std::net::TcpStream;
use futures_channel::mpsc;
use futures_util::future::{abortable, AbortHandle};
use futures_util::io::{AsyncReadExt, AsyncWriteExt};
use futures_util::StreamExt;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Size of the buffer each read goes into.
pub const READ_BUF_SIZE: usize = 16 * 1024;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type CloseCallback = Box<dyn FnOnce(ConnectionId) + Send>;

/// Handle to an HTTP/1.x connection.
///
/// Cloning is cheap and gives another handle to the same connection. The read and
/// write tasks only hold weak references, when every handle is dropped the
/// connection winds down.
#[derive(Clone)]
pub struct Connection(Arc<Inner>);

struct Inner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    requests: EventQueue<Request>,
    responses: EventQueue<Response>,
    tx: mpsc::UnboundedSender<Outgoing>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    closed: bool,
    reader: Option<AbortHandle>,
    close_callbacks: Vec<CloseCallback>,
    // a request was emitted and no response has been sent for it yet.
    awaiting_response: bool,
    // close as soon as the current exchange is done.
    close_pending: bool,
}

enum Outgoing {
    Data(Vec<u8>),
    Close,
}

impl Connection {
    /// Start driving `io` on the default executor.
    pub fn new<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Connection::start(io, None, default_executor())
    }

    /// Start driving `io` on the given executor.
    pub fn with_executor<S>(io: S, executor: Arc<dyn Executor>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Connection::start(io, None, executor)
    }

    /// Start driving a TCP stream, remembering the peer address.
    pub fn tcp(stream: TcpStream, executor: Arc<dyn Executor>) -> Self {
        let peer_addr = stream.peer_addr().ok();
        Connection::start(stream, peer_addr, executor)
    }

    fn start<S>(io: S, peer_addr: Option<SocketAddr>, executor: Arc<dyn Executor>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (rd, wr) = io.split();
        let (tx, rx) = mpsc::unbounded();

        let inner = Arc::new(Inner {
            id: ConnectionId::next(),
            peer_addr,
            requests: EventQueue::new(),
            responses: EventQueue::new(),
            tx,
            state: Mutex::new(State::default()),
        });

        let (reader, handle) = abortable(read_loop(Arc::downgrade(&inner), rd));
        inner.state.lock().unwrap().reader = Some(handle);

        executor.execute(Box::pin(async move {
            // Err(Aborted) when closed from our side.
            let _ = reader.await;
        }));
        executor.execute(Box::pin(write_loop(Arc::downgrade(&inner), wr, rx)));

        debug!("{} New connection from {:?}", inner.id, peer_addr);

        Connection(inner)
    }

    /// Id of this connection.
    pub fn id(&self) -> ConnectionId {
        self.0.id
    }

    /// Remote address, if the connection was made from a TCP stream.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.0.peer_addr
    }

    /// Tests if `close` has run, from either side.
    pub fn is_closed(&self) -> bool {
        self.0.state.lock().unwrap().closed
    }

    /// Handle incoming requests. Requests that arrived before the handler was set are
    /// delivered straight away, in order.
    pub fn on_request<F>(&self, mut f: F)
    where
        F: FnMut(Request, &Connection) + Send + 'static,
    {
        let weak = Arc::downgrade(&self.0);
        self.0.requests.set_handler(move |req| {
            if let Some(inner) = weak.upgrade() {
                f(req, &Connection(inner));
            }
        });
    }

    /// Handle incoming responses. Same delivery rules as `on_request`.
    pub fn on_response<F>(&self, mut f: F)
    where
        F: FnMut(Response, &Connection) + Send + 'static,
    {
        let weak = Arc::downgrade(&self.0);
        self.0.responses.set_handler(move |res| {
            if let Some(inner) = weak.upgrade() {
                f(res, &Connection(inner));
            }
        });
    }

    /// Called once when the connection closes. Fires immediately if it already is.
    pub fn on_close<F>(&self, f: F)
    where
        F: FnOnce(ConnectionId) + Send + 'static,
    {
        let mut lock = self.0.state.lock().unwrap();
        if lock.closed {
            drop(lock);
            f(self.0.id);
            return;
        }
        lock.close_callbacks.push(Box::new(f));
    }

    /// Queue a request for writing. `Content-Length` is set when there is a body.
    ///
    /// If the request demands the connection to close, it is closed once the
    /// response has been received.
    pub fn send_request(&self, req: &mut Request) -> Result<(), Error> {
        let buf = write_request(req)?;

        {
            let mut lock = self.0.state.lock().unwrap();
            if lock.closed {
                return err_closed();
            }
            if req.close_connection() {
                lock.close_pending = true;
            }
        }

        self.enqueue(buf)
    }

    /// Queue a response for writing. `Content-Length` is set when there is a body.
    ///
    /// The connection is closed after the response if either the response or the
    /// request it answers demands it.
    pub fn send_response(&self, res: &mut Response) -> Result<(), Error> {
        let buf = write_response(res)?;

        let close = {
            let mut lock = self.0.state.lock().unwrap();
            if lock.closed {
                return err_closed();
            }
            lock.awaiting_response = false;
            res.close_connection() || lock.close_pending
        };

        self.enqueue(buf)?;

        if close {
            self.close();
        }

        Ok(())
    }

    fn enqueue(&self, buf: Vec<u8>) -> Result<(), Error> {
        trace!("{} Enqueue {} bytes", self.0.id, buf.len());
        if self.0.tx.unbounded_send(Outgoing::Data(buf)).is_err() {
            return err_closed();
        }
        Ok(())
    }

    /// Stop reading, flush what is queued and shut the socket down. Close callbacks
    /// fire and event handlers are detached. Closing twice does nothing.
    pub fn close(&self) {
        let (reader, callbacks) = {
            let mut lock = self.0.state.lock().unwrap();
            if lock.closed {
                return;
            }
            lock.closed = true;
            (
                lock.reader.take(),
                std::mem::take(&mut lock.close_callbacks),
            )
        };

        info!("{} Close connection", self.0.id);

        if let Some(reader) = reader {
            reader.abort();
        }

        // write task drains queued data before it sees this.
        let _ = self.0.tx.unbounded_send(Outgoing::Close);

        self.0.requests.clear_handler();
        self.0.responses.clear_handler();

        for cb in callbacks {
            cb(self.0.id);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection {{ id: {}, peer: {:?}, closed: {} }}",
            self.0.id,
            self.0.peer_addr,
            self.is_closed()
        )
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut lock) = self.state.lock() {
            if let Some(reader) = lock.reader.take() {
                reader.abort();
            }
        }
    }
}

/// Bridges parser events to the connection's event queues.
struct Dispatch<'a> {
    con: &'a Connection,
    stop: bool,
}

impl ParseHandler for Dispatch<'_> {
    fn on_request(&mut self, req: Request) {
        if self.stop {
            return;
        }

        let inner = &self.con.0;

        {
            let mut lock = inner.state.lock().unwrap();

            if lock.awaiting_response {
                warn!("{} Pipelined request is not supported: {}", inner.id, req);
                self.stop = true;
                drop(lock);
                self.con.close();
                return;
            }

            lock.awaiting_response = true;

            if req.close_connection() {
                // nothing more will be read, the response closes.
                lock.close_pending = true;
                self.stop = true;
            }
        }

        inner.requests.emit(req);
    }

    fn on_response(&mut self, res: Response) {
        if self.stop {
            return;
        }

        let inner = &self.con.0;
        let close = res.close_connection();
        inner.responses.emit(res);

        if close || inner.state.lock().unwrap().close_pending {
            self.stop = true;
            self.con.close();
        }
    }
}

async fn read_loop<R>(weak: Weak<Inner>, mut rd: R)
where
    R: AsyncRead + Unpin,
{
    let mut parser = Parser::new(ParserType::Both);
    let mut buf = vec![0_u8; READ_BUF_SIZE];

    loop {
        let amount = match rd.read(&mut buf[..]).await {
            Ok(v) => v,
            Err(e) => {
                debug!("Read failed: {}", e);
                break;
            }
        };

        let con = match weak.upgrade() {
            Some(inner) => Connection(inner),
            // all handles are gone
            None => return,
        };

        trace!("{} Read {} bytes", con.0.id, amount);

        let mut dispatch = Dispatch {
            con: &con,
            stop: false,
        };

        if let Err(e) = parser.feed(&buf[..amount], &mut dispatch) {
            warn!("{} Closing on bad input: {}", con.0.id, e);
            break;
        }

        if dispatch.stop {
            trace!("{} Stop reading", con.0.id);
            return;
        }

        if amount == 0 {
            let mut lock = con.0.state.lock().unwrap();
            if lock.awaiting_response {
                // let the pending response go out first.
                lock.close_pending = true;
                return;
            }
            debug!("{} EOF", con.0.id);
            break;
        }
    }

    if let Some(inner) = weak.upgrade() {
        Connection(inner).close();
    }
}

async fn write_loop<W>(weak: Weak<Inner>, mut wr: W, mut rx: mpsc::UnboundedReceiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    let mut failed = false;

    while let Some(out) = rx.next().await {
        match out {
            Outgoing::Data(buf) => {
                let ret = async {
                    wr.write_all(&buf[..]).await?;
                    wr.flush().await
                }
                .await;

                if let Err(e) = ret {
                    debug!("Write failed: {}", e);
                    failed = true;
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }

    if let Err(e) = wr.close().await {
        trace!("Shutdown failed: {}", e);
    }

    if failed {
        if let Some(inner) = weak.upgrade() {
            Connection(inner).close();
        }
    }
}
