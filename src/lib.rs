#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]

//! An embeddable HTTP/1.x engine, server and client.
//!
//! The pieces, from the bottom up:
//!
//! * [`Parser`] is an incremental byte-stream parser. It can be fed whatever arrived
//!   on a socket, split at any byte, and produces [`Request`]s and [`Response`]s.
//! * [`Connection`] owns one socket and one parser. It reads, parses and emits
//!   messages, and writes serialized messages in order.
//! * [`Server`] accepts TCP connections, keeps them in a [`ConnectionPool`] and
//!   hands each request to a handler.
//! * [`Connect`] is a server running a chain of middleware, optionally filtered by
//!   path prefix.
//! * [`ClientCall`] does one outbound request: DNS, connect, send, receive.
//!
//! ## In scope
//!
//! * `Content-Length` delimited bodies, and connection close delimited response
//!   bodies.
//! * `Connection: close` and HTTP/1.0 persistence rules.
//! * HTTP/0.9 request lines.
//!
//! ## Out of scope
//!
//! * `Transfer-Encoding: chunked` is rejected by the parser.
//! * Pipelining. A second request before the first is answered closes the
//!   connection.
//! * Timeouts, retries, redirects and TLS.
//!
//! # Runtime
//!
//! Socket I/O, handlers and client calls run as tasks on an [`Executor`]. The default
//! is the async-std global executor, any other runtime can be plugged in.
//!
//! # Logging
//!
//! The crate logs through the `log` facade. Nothing is output unless the
//! application installs a logger.
//!
//! [`Parser`]: struct.Parser.html
//! [`Request`]: struct.Request.html
//! [`Response`]: struct.Response.html
//! [`Connection`]: struct.Connection.html
//! [`Server`]: struct.Server.html
//! [`ConnectionPool`]: struct.ConnectionPool.html
//! [`Connect`]: struct.Connect.html
//! [`ClientCall`]: struct.ClientCall.html
//! [`Executor`]: trait.Executor.html

#[macro_use]
extern crate log;

mod accumulator;
mod client;
mod connect;
mod connection;
mod error;
mod event_queue;
mod executor;
mod message;
mod method;
mod parser;
mod pool;
mod server;
mod status;
mod url;

#[doc(hidden)]
pub mod http11;

pub(crate) use futures_io::{AsyncRead, AsyncWrite};

pub use accumulator::ByteAccumulator;
pub use client::{get, get_with, running_calls, CallId, CallState, ClientCall, USER_AGENT};
pub use connect::{Connect, Middleware, Next};
pub use connection::{Connection, ConnectionId, READ_BUF_SIZE};
pub use error::{ConnectError, Error, ParseError};
pub use event_queue::EventQueue;
pub use executor::{default_executor, AsyncStdExecutor, Executor};
pub use message::{Headers, Message, Request, Response, Version};
pub use method::Method;
pub use parser::{Incoming, ParseHandler, Parser, ParserState, ParserType, MAX_HEADER_SIZE};
pub use pool::{ConnectionPool, PoolHandler};
pub use server::{Handler, Server};
pub use status::Status;
pub use url::{percent_unescape, port_for_scheme, scheme_for_port, Url};

pub(crate) fn err_closed<T>() -> Result<T, Error> {
    use std::io;
    Err(io::Error::new(io::ErrorKind::NotConnected, "Connection is closed").into())
}
