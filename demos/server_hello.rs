use h1_connect::{Connect, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[async_std::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let app = Connect::new();
    let served = Arc::new(AtomicUsize::new(0));

    app.with(|req, res, con, next| {
        log::info!("{} {} {}", con.id(), req.method(), req.url());
        next.call(req, res, con);
    })
    .with(move |req, res, con, next| {
        let n = served.fetch_add(1, Ordering::SeqCst) + 1;
        res.set_header("X-Served", n.to_string());
        next.call(req, res, con);
    })
    .with_prefix("/echo", |req, res, con, _next| {
        res.set_header("Content-Type", "text/plain");
        res.set_body_bytes(req.body_bytes().unwrap_or(&[]).to_vec());
        con.send_response(res).ok();
    })
    .with(|req, res, con, _next| {
        res.set_body_text(format!("<h1>Hello {}</h1>\n", req.path()));
        con.send_response(res).ok();
    });

    let addr = app.listen(1337)?;
    println!("Listening on {}", addr);

    async_std::future::pending::<()>().await;

    Ok(())
}
