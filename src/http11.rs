use crate::message::{Message, Request, Response};
use std::io;
use std::io::Write;

// Request headers today vary in size from ~200 bytes to over 2KB.
// As applications use more cookies and user agents expand features,
// typical header sizes of 700-800 bytes is common.
// http://dev.chromium.org/spdy/spdy-whitepaper
const INIT_CAPACITY: usize = 1024;

/// Make the headers agree with the body that is about to be sent.
///
/// A message with a body always gets a `Content-Length` matching it.
pub fn fixup_headers(msg: &mut Message) {
    if let Some(len) = msg.body_bytes().map(|b| b.len()) {
        msg.set_header("Content-Length", len.to_string());
    }
}

/// Serialize a request, head and body, into one buffer.
#[allow(clippy::write_with_newline)]
pub fn write_request(req: &mut Request) -> Result<Vec<u8>, io::Error> {
    fixup_headers(req);

    let mut w = Vec::with_capacity(INIT_CAPACITY);

    if req.version().major == 0 {
        // HTTP/0.9 is just the request line.
        write!(w, "{} {}\r\n", req.method(), req.url())?;
        debug!("write_request: {:?}", String::from_utf8_lossy(&w));
        return Ok(w);
    }

    write!(w, "{} {} {}\r\n", req.method(), req.url(), req.version())?;
    write_head_and_body(&mut w, req)?;

    debug!("write_request: {}", req);

    Ok(w)
}

/// Serialize a response, head and body, into one buffer.
#[allow(clippy::write_with_newline)]
pub fn write_response(res: &mut Response) -> Result<Vec<u8>, io::Error> {
    fixup_headers(res);

    let mut w = Vec::with_capacity(INIT_CAPACITY);

    write!(
        w,
        "{} {} {}\r\n",
        res.version(),
        res.status().code(),
        res.status().reason()
    )?;
    write_head_and_body(&mut w, res)?;

    debug!("write_response: {}", res);

    Ok(w)
}

#[allow(clippy::write_with_newline)]
fn write_head_and_body(w: &mut Vec<u8>, msg: &Message) -> Result<(), io::Error> {
    for (name, value) in msg.headers().iter() {
        write!(w, "{}: {}\r\n", name, value)?;
    }
    write!(w, "\r\n")?;

    trace!("head: {:?}", String::from_utf8_lossy(&w[..]));

    if let Some(body) = msg.body_bytes() {
        w.extend_from_slice(body);
    }

    Ok(())
}
