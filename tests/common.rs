#![allow(dead_code)]

use async_std::net::{TcpListener, TcpStream};
use futures_util::{AsyncReadExt, AsyncWriteExt};
use h1_connect::{Error, Incoming, ParseHandler, Request, Response};
use std::io;
use std::sync::Once;
use std::time::{Duration, Instant};

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("h1_connect", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

/// Two ends of a loopback TCP connection.
pub async fn tcp_pair() -> Result<(TcpStream, TcpStream), io::Error> {
    let l = TcpListener::bind("127.0.0.1:0").await?;
    let addr = l.local_addr()?;

    let client = TcpStream::connect(addr).await?;
    let (server, _) = l.accept().await?;

    Ok((client, server))
}

pub async fn connect(port: u16) -> Result<TcpStream, io::Error> {
    TcpStream::connect(("127.0.0.1", port)).await
}

/// Read up to and including the blank line ending a head.
pub async fn read_head(tcp: &mut TcpStream) -> Result<String, Error> {
    let mut buf = vec![];
    let mut one = [0_u8; 1];

    while !buf.ends_with(b"\r\n\r\n") {
        let n = tcp.read(&mut one).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "EOF in head").into());
        }
        buf.push(one[0]);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read one response, body length taken from `content-length`.
pub async fn read_response(tcp: &mut TcpStream) -> Result<(String, String), Error> {
    let head = read_head(tcp).await?;

    let len = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = vec![0_u8; len];
    tcp.read_exact(&mut body).await?;

    Ok((head, String::from_utf8_lossy(&body).into_owned()))
}

/// Read until the other side closes.
pub async fn read_to_close(tcp: &mut TcpStream) -> Result<String, Error> {
    let mut buf = vec![];
    tcp.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub async fn send(tcp: &mut TcpStream, data: &str) -> Result<(), Error> {
    tcp.write_all(data.as_bytes()).await?;
    tcp.flush().await?;
    Ok(())
}

/// Poll `cond` until it holds, panics after a few seconds.
pub async fn wait_for<F: FnMut() -> bool>(what: &str, mut cond: F) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > Duration::from_secs(5) {
            panic!("Timed out waiting for: {}", what);
        }
        async_std::task::sleep(Duration::from_millis(5)).await;
    }
}

/// Parse handler recording everything it sees.
#[derive(Default)]
pub struct Collect {
    pub urls: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub heads: usize,
    pub requests: Vec<Request>,
    pub responses: Vec<Response>,
    pub reject_headers: bool,
    pub stream: bool,
    pub streamed: Vec<u8>,
    pub reject_body: bool,
}

impl ParseHandler for Collect {
    fn on_url(&mut self, url: &str) {
        self.urls.push(url.to_string());
    }

    fn on_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn on_headers(&mut self, _head: &Incoming) -> bool {
        self.heads += 1;
        !self.reject_headers
    }

    fn streams_body(&self) -> bool {
        self.stream
    }

    fn on_body_data(&mut self, data: &[u8]) -> bool {
        self.streamed.extend_from_slice(data);
        !self.reject_body
    }

    fn on_request(&mut self, req: Request) {
        self.requests.push(req);
    }

    fn on_response(&mut self, res: Response) {
        self.responses.push(res);
    }
}
