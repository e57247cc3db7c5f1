use futures_channel::oneshot;
use h1_connect::{Connection, Error, Method, Request, Response, Status};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;

#[async_std::test]
async fn connection_request_response() -> Result<(), Error> {
    common::setup_logger();

    let (a, b) = common::tcp_pair().await?;
    let client = Connection::new(a);
    let server = Connection::tcp(b, h1_connect::default_executor());
    assert!(server.peer_addr().is_some());

    server.on_request(|req, con| {
        let mut res = Response::new(Status::Ok);
        res.set_body_text(format!("echo {}", req.body_text().unwrap_or("")));
        con.send_response(&mut res).unwrap();
    });

    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);
    client.on_response(move |res, _| {
        if let Some(tx) = tx.take() {
            tx.send(res).ok();
        }
    });

    let mut req = Request::new(Method::Post, "/echo");
    req.set_body_text("hi");
    client.send_request(&mut req)?;
    assert_eq!(req.header("Content-Length"), Some("2"));

    let res = rx.await.unwrap();
    assert_eq!(res.status(), &Status::Ok);
    assert_eq!(res.body_text(), Some("echo hi"));

    assert!(!client.is_closed());
    assert!(!server.is_closed());

    Ok(())
}

#[async_std::test]
async fn connection_queues_until_handler() -> Result<(), Error> {
    common::setup_logger();

    let (mut a, b) = common::tcp_pair().await?;
    let server = Connection::new(b);

    common::send(&mut a, "GET /early HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await?;
    async_std::task::sleep(Duration::from_millis(50)).await;

    let seen = Arc::new(Mutex::new(vec![]));
    let seen2 = seen.clone();
    server.on_request(move |req, _| {
        seen2.lock().unwrap().push(req.url().to_string());
    });

    common::wait_for("request delivered", || seen.lock().unwrap().len() == 1).await;
    assert_eq!(seen.lock().unwrap()[0], "/early");

    Ok(())
}

#[async_std::test]
async fn connection_close_is_idempotent() -> Result<(), Error> {
    common::setup_logger();

    let (a, mut b) = common::tcp_pair().await?;
    let con = Connection::new(a);

    let closes = Arc::new(AtomicUsize::new(0));
    let closes2 = closes.clone();
    let id = con.id();
    con.on_close(move |closed| {
        assert_eq!(closed, id);
        closes2.fetch_add(1, Ordering::SeqCst);
    });

    con.close();
    con.close();

    assert!(con.is_closed());
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    // late registration fires right away
    let late = Arc::new(AtomicBool::new(false));
    let late2 = late.clone();
    con.on_close(move |_| late2.store(true, Ordering::SeqCst));
    assert!(late.load(Ordering::SeqCst));

    assert!(con.send_response(&mut Response::new(Status::Ok)).is_err());

    let all = common::read_to_close(&mut b).await?;
    assert_eq!(all, "");

    Ok(())
}

#[async_std::test]
async fn connection_flushes_before_close() -> Result<(), Error> {
    common::setup_logger();

    let (a, mut b) = common::tcp_pair().await?;
    let con = Connection::new(a);

    let mut res = Response::new(Status::NotFound);
    res.set_header("Connection", "close");
    res.set_body_text("gone");
    con.send_response(&mut res)?;

    // closed because of the header, but the bytes still go out.
    assert!(con.is_closed());

    let all = common::read_to_close(&mut b).await?;
    assert_eq!(
        all,
        "HTTP/1.1 404 Not Found\r\nConnection: close\r\nContent-Length: 4\r\n\r\ngone"
    );

    Ok(())
}

#[async_std::test]
async fn connection_closes_on_peer_eof() -> Result<(), Error> {
    common::setup_logger();

    let (a, b) = common::tcp_pair().await?;
    let con = Connection::new(a);

    let closed = Arc::new(AtomicBool::new(false));
    let closed2 = closed.clone();
    con.on_close(move |_| closed2.store(true, Ordering::SeqCst));

    drop(b);

    common::wait_for("close on eof", || closed.load(Ordering::SeqCst)).await;
    assert!(con.is_closed());

    Ok(())
}

#[async_std::test]
async fn connection_reads_response_until_eof() -> Result<(), Error> {
    common::setup_logger();

    let (a, mut b) = common::tcp_pair().await?;
    let con = Connection::new(a);

    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);
    con.on_response(move |res, _| {
        if let Some(tx) = tx.take() {
            tx.send(res).ok();
        }
    });

    common::send(&mut b, "HTTP/1.0 200 OK\r\n\r\nuntil the end").await?;
    drop(b);

    let res = rx.await.unwrap();
    assert_eq!(res.body_text(), Some("until the end"));

    Ok(())
}

#[async_std::test]
async fn connection_closes_when_response_demands() -> Result<(), Error> {
    common::setup_logger();

    for reply in &[
        "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nhi",
        "HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nhi",
    ] {
        let (a, mut b) = common::tcp_pair().await?;
        let con = Connection::new(a);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        con.on_response(move |res, _| {
            assert_eq!(res.body_text(), Some("hi"));
            seen2.fetch_add(1, Ordering::SeqCst);
        });

        let mut req = Request::new(Method::Get, "/");
        req.set_header("Content-Length", "0");
        assert!(!req.close_connection());
        con.send_request(&mut req)?;

        common::read_head(&mut b).await?;
        // the peer keeps its end open.
        common::send(&mut b, reply).await?;

        common::wait_for("closed after response", || con.is_closed()).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(b);
    }

    Ok(())
}
