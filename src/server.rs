//! Server implementation.
//!
//! # Example
//!
//! ```rust, no_run
//! use h1_connect::{Server, Status};
//!
//! #[async_std::main]
//! async fn main() -> Result<(), h1_connect::Error> {
//!     let server = Server::new();
//!
//!     server.on_request(|req, res, con| {
//!         res.set_status(Status::Ok);
//!         res.set_body_text(format!("Hello {}\n", req.path()));
//!         con.send_response(res).ok();
//!     });
//!
//!     let addr = server.listen(3000)?;
//!     println!("Listening on {}", addr);
//!
//!     async_std::future::pending::<()>().await;
//!     Ok(())
//! }
//! ```
//!
//! The handler gets the request, a fresh `200 OK` response with
//! `Content-Type: text/html`, and the connection to send the response on. After the
//! handler returns, the connection is closed if the request or the response asks
//! for it.

use crate::connection::Connection;
use crate::executor::{default_executor, DebugExecutor, Executor};
use crate::message::{Request, Response};
use crate::pool::{ConnectionPool, PoolHandler};
use crate::status::Status;
use crate::Error;
use async_std::net::TcpListener;
use futures_util::future::{abortable, AbortHandle};
use futures_util::StreamExt;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Request handler of a [`Server`].
pub type Handler = dyn Fn(&Request, &mut Response, &Connection) + Send + Sync;

const NO_HANDLER_BODY: &str = "No handler configured in HTTP server!\r\n";

/// An HTTP server accepting TCP connections.
///
/// Cloning gives another handle to the same server.
#[derive(Clone)]
pub struct Server(Arc<ServerInner>);

struct ServerInner {
    pool: Arc<ConnectionPool<Dispatcher>>,
    listening: Mutex<Option<Listening>>,
}

struct Listening {
    addr: SocketAddr,
    accept: AbortHandle,
}

struct Dispatcher {
    handler: RwLock<Option<Arc<Handler>>>,
    executor: RwLock<Arc<dyn Executor>>,
}

impl Dispatcher {
    fn executor(&self) -> Arc<dyn Executor> {
        self.executor.read().unwrap().clone()
    }
}

impl PoolHandler for Dispatcher {
    fn handle_request(&self, req: Request, con: &Connection) {
        debug!("{} Got request: {}", con.id(), req);

        let handler = self.handler.read().unwrap().clone();

        let handler = match handler {
            Some(v) => v,
            None => {
                let mut res = Response::new(Status::InternalServerError);
                res.set_header("Content-Type", "text/html");
                res.set_body_text(NO_HANDLER_BODY);
                if let Err(e) = con.send_response(&mut res) {
                    debug!("{} Failed to send 500: {}", con.id(), e);
                }
                con.close();
                return;
            }
        };

        let con = con.clone();

        self.executor().execute(Box::pin(async move {
            let mut res = Response::new(Status::Ok);
            res.set_header("Content-Type", "text/html");

            handler(&req, &mut res, &con);

            if res.close_connection() || req.close_connection() {
                con.close();
            }
        }));
    }
}

impl Server {
    /// New server, not yet listening, without a handler.
    pub fn new() -> Self {
        let dispatcher = Dispatcher {
            handler: RwLock::new(None),
            executor: RwLock::new(default_executor()),
        };

        Server(Arc::new(ServerInner {
            pool: ConnectionPool::new(dispatcher),
            listening: Mutex::new(None),
        }))
    }

    /// Set the request handler, replacing any previous one.
    pub fn on_request<F>(&self, handler: F) -> &Self
    where
        F: Fn(&Request, &mut Response, &Connection) + Send + Sync + 'static,
    {
        *self.0.pool.handler().handler.write().unwrap() = Some(Arc::new(handler));
        self
    }

    /// Executor for handlers and for the I/O of connections accepted from now on.
    pub fn use_executor(&self, executor: Arc<dyn Executor>) -> &Self {
        *self.0.pool.handler().executor.write().unwrap() = executor;
        self
    }

    /// Listen on `0.0.0.0:port`. Port 0 picks a free port, see the returned address.
    pub fn listen(&self, port: u16) -> Result<SocketAddr, Error> {
        self.listen_on(("0.0.0.0", port))
    }

    /// Listen on a specific address.
    ///
    /// Binding happens right away, connections are accepted in a background task.
    pub fn listen_on<A: ToSocketAddrs>(&self, addr: A) -> Result<SocketAddr, Error> {
        let mut lock = self.0.listening.lock().unwrap();

        if let Some(l) = &*lock {
            return Err(Error::User(format!("Server already listening on {}", l.addr)));
        }

        // std sets SO_REUSEADDR on unix
        let std_listener = std::net::TcpListener::bind(addr)?;
        let addr = std_listener.local_addr()?;
        let listener = TcpListener::from(std_listener);

        let (accept, handle) = abortable(accept_loop(listener, Arc::downgrade(&self.0.pool)));

        self.0.pool.handler().executor().execute(Box::pin(async move {
            let _ = accept.await;
        }));

        info!("Listening on {}", addr);

        *lock = Some(Listening {
            addr,
            accept: handle,
        });

        Ok(addr)
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.0.listening.lock().unwrap().as_ref().map(|l| l.addr)
    }

    /// Open connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.0.pool.open_connections()
    }

    /// Stop accepting and close every open connection. Requests in progress are
    /// not waited for.
    pub fn stop(&self) {
        if let Some(l) = self.0.listening.lock().unwrap().take() {
            info!("Stop listening on {}", l.addr);
            l.accept.abort();
        }

        self.0.pool.close_all();
    }
}

impl Default for Server {
    fn default() -> Self {
        Server::new()
    }
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        if let Ok(mut lock) = self.listening.lock() {
            if let Some(l) = lock.take() {
                l.accept.abort();
            }
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let executor = self.0.pool.handler().executor();
        write!(
            f,
            "Server {{ addr: {:?}, pool: {:?}, executor: {:?} }}",
            self.local_addr(),
            self.0.pool,
            DebugExecutor(&executor)
        )
    }
}

async fn accept_loop(listener: TcpListener, pool: Weak<ConnectionPool<Dispatcher>>) {
    let mut incoming = listener.incoming();

    while let Some(stream) = incoming.next().await {
        let pool = match pool.upgrade() {
            Some(v) => v,
            None => break,
        };

        let stream = match stream {
            Ok(v) => v,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };

        let con = Connection::tcp(stream, pool.handler().executor());
        info!("{} Accepted connection from {:?}", con.id(), con.peer_addr());

        pool.register_connection(&con);
    }

    debug!("Accept loop ended");
}
