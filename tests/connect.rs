use h1_connect::{Connect, Connection, Error, Method, Next, Request, Response, Status};
use std::sync::{Arc, Mutex};

mod common;

type Trail = Arc<Mutex<Vec<&'static str>>>;

fn record(
    trail: &Trail,
    name: &'static str,
    call_next: bool,
) -> impl Fn(&Request, &mut Response, &Connection, Next<'_>) + Send + Sync + 'static {
    let trail = trail.clone();
    move |req: &Request, res: &mut Response, con: &Connection, next: Next<'_>| {
        trail.lock().unwrap().push(name);
        if call_next {
            next.call(req, res, con);
        }
    }
}

async fn loose_connection() -> Result<(Connection, async_std::net::TcpStream), Error> {
    let (a, b) = common::tcp_pair().await?;
    Ok((Connection::new(a), b))
}

#[async_std::test]
async fn connect_literal_prefix_includes_root_entry() -> Result<(), Error> {
    common::setup_logger();

    let trail: Trail = Default::default();

    let app = Connect::new();
    app.with_prefix("/", record(&trail, "A", true))
        .with_prefix("/api", record(&trail, "B", true))
        .with_prefix("/other", record(&trail, "X", true))
        .with(record(&trail, "C", true));
    assert_eq!(app.len(), 4);

    let (con, _peer) = loose_connection().await?;

    let req = Request::new(Method::Get, "/api/x?y=1");
    let mut res = Response::new(Status::Ok);
    app.handle(&req, &mut res, &con);

    assert_eq!(*trail.lock().unwrap(), vec!["A", "B", "C"]);

    trail.lock().unwrap().clear();

    let req = Request::new(Method::Get, "/plain");
    app.handle(&req, &mut res, &con);

    assert_eq!(*trail.lock().unwrap(), vec!["A", "C"]);

    Ok(())
}

#[async_std::test]
async fn connect_chain_stops_without_next() -> Result<(), Error> {
    common::setup_logger();

    let trail: Trail = Default::default();

    let app = Connect::new();
    app.with(record(&trail, "first", true))
        .with(record(&trail, "gate", false))
        .with(record(&trail, "never", true));

    let (con, _peer) = loose_connection().await?;

    let req = Request::new(Method::Get, "/");
    let mut res = Response::new(Status::Ok);
    app.handle(&req, &mut res, &con);

    assert_eq!(*trail.lock().unwrap(), vec!["first", "gate"]);

    Ok(())
}

#[async_std::test]
async fn connect_middleware_shares_response() -> Result<(), Error> {
    common::setup_logger();

    let app = Connect::new();
    app.with(|req, res, con, next| {
        assert_eq!(next.remaining(), 1);
        res.set_header("X-Seen", "yes");
        next.call(req, res, con);
    })
    .with(|req, res, con, next| {
        assert_eq!(next.remaining(), 0);
        res.set_status(Status::Accepted);
        // past the end, does nothing
        next.call(req, res, con);
    });

    let (con, _peer) = loose_connection().await?;

    let req = Request::new(Method::Get, "/");
    let mut res = Response::new(Status::Ok);
    app.handle(&req, &mut res, &con);

    assert_eq!(res.status(), &Status::Accepted);
    assert_eq!(res.header("x-seen"), Some("yes"));

    Ok(())
}

#[async_std::test]
async fn connect_echo_over_network() -> Result<(), Error> {
    common::setup_logger();

    let app = Connect::new();
    app.with(|req, res, con, next| {
        res.set_header("X-Method", req.method().to_string());
        next.call(req, res, con);
    })
    .with_prefix("/echo", |req, res, con, _next| {
        res.set_header("Content-Type", "text/plain");
        res.set_body_bytes(req.body_bytes().unwrap_or(&[]).to_vec());
        con.send_response(res).ok();
    })
    .with(|_req, res, con, _next| {
        res.set_status(Status::NotFound);
        res.set_body_text("nothing here");
        con.send_response(res).ok();
    });

    let addr = app.listen_on("127.0.0.1:0")?;

    let mut tcp = common::connect(addr.port()).await?;
    common::send(
        &mut tcp,
        "POST /echo HTTP/1.1\r\nContent-Length: 4\r\n\r\nping",
    )
    .await?;

    let (head, body) = common::read_response(&mut tcp).await?;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("X-Method: POST\r\n"));
    assert!(head.contains("Content-Type: text/plain\r\n"));
    assert_eq!(body, "ping");

    common::send(&mut tcp, "GET /missing HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await?;

    let (head, body) = common::read_response(&mut tcp).await?;
    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(body, "nothing here");

    app.stop();

    Ok(())
}
