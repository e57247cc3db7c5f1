use crate::connection::{Connection, ConnectionId};
use crate::message::{Request, Response};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Receives what the connections of a pool parse.
pub trait PoolHandler: Send + Sync + 'static {
    /// A request arrived on a pooled connection.
    fn handle_request(&self, req: Request, con: &Connection) {
        debug!("{} Unhandled request: {}", con.id(), req);
    }

    /// A response arrived on a pooled connection.
    fn handle_response(&self, res: Response, con: &Connection) {
        debug!("{} Unhandled response: {}", con.id(), res);
    }
}

/// Set of open connections keyed by id.
///
/// A registered connection removes itself when it closes. The map is only ever
/// touched through its mutex.
pub struct ConnectionPool<H> {
    handler: H,
    open: Mutex<HashMap<ConnectionId, Connection>>,
}

impl<H: PoolHandler> ConnectionPool<H> {
    /// New pool dispatching to `handler`.
    pub fn new(handler: H) -> Arc<Self> {
        Arc::new(ConnectionPool {
            handler,
            open: Mutex::new(HashMap::new()),
        })
    }

    /// The handler messages are dispatched to.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Track a connection and route its events to the handler. Closed connections
    /// are not registered.
    pub fn register_connection(self: &Arc<Self>, con: &Connection) {
        if con.is_closed() {
            debug!("{} Not registering closed connection", con.id());
            return;
        }

        self.open.lock().unwrap().insert(con.id(), con.clone());

        let weak: Weak<Self> = Arc::downgrade(self);
        con.on_request(move |req, con| {
            if let Some(pool) = weak.upgrade() {
                pool.handler.handle_request(req, con);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        con.on_response(move |res, con| {
            if let Some(pool) = weak.upgrade() {
                pool.handler.handle_response(res, con);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        con.on_close(move |id| {
            if let Some(pool) = weak.upgrade() {
                pool.unregister_connection(id);
            }
        });
    }

    /// Forget a connection. Unknown ids are logged and otherwise ignored.
    pub fn unregister_connection(&self, id: ConnectionId) {
        let removed = self.open.lock().unwrap().remove(&id);
        if removed.is_none() {
            debug!("{} Already removed from pool", id);
        }
    }

    /// Snapshot of the open connections.
    pub fn open_connections(&self) -> Vec<Connection> {
        self.open.lock().unwrap().values().cloned().collect()
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.open.lock().unwrap().len()
    }

    /// Tests if there are no open connections.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every open connection.
    pub fn close_all(&self) {
        // close callbacks take the lock, so don't hold it.
        for con in self.open_connections() {
            con.close();
        }
    }
}

impl<H> fmt::Debug for ConnectionPool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionPool {{ open: {} }}", self.open.lock().unwrap().len())
    }
}
