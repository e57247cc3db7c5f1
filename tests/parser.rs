use h1_connect::{Method, ParseError, Parser, ParserState, ParserType, Version};

mod common;

use common::Collect;

const POST: &[u8] = b"POST /api/items?x=1 HTTP/1.1\r\n\
    Host: example.com\r\n\
    Content-Type: text/plain\r\n\
    Content-Length: 11\r\n\
    \r\n\
    hello world";

#[test]
fn parse_request_single_feed() {
    common::setup_logger();

    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let n = p.feed(POST, &mut col).unwrap();
    assert_eq!(n, POST.len());

    assert_eq!(col.requests.len(), 1);
    let req = &col.requests[0];
    assert_eq!(req.method(), &Method::Post);
    assert_eq!(req.url(), "/api/items?x=1");
    assert_eq!(req.path(), "/api/items");
    assert_eq!(req.version(), Version::HTTP_11);
    assert_eq!(req.header("host"), Some("example.com"));
    assert_eq!(req.header("CONTENT-TYPE"), Some("text/plain"));
    assert_eq!(req.body_text(), Some("hello world"));
    assert_eq!(p.state(), ParserState::Idle);
}

#[test]
fn parse_request_any_split_point() {
    let mut whole = Collect::default();
    Parser::new(ParserType::Request)
        .feed(POST, &mut whole)
        .unwrap();
    let expected = &whole.requests[0];

    for split in 1..POST.len() {
        let mut p = Parser::new(ParserType::Request);
        let mut col = Collect::default();

        p.feed(&POST[..split], &mut col).unwrap();
        p.feed(&POST[split..], &mut col).unwrap();

        assert_eq!(col.requests.len(), 1, "split at {}", split);
        let req = &col.requests[0];
        assert_eq!(req.method(), expected.method());
        assert_eq!(req.url(), expected.url());
        assert_eq!(req.version(), expected.version());
        assert_eq!(
            req.headers().iter().collect::<Vec<_>>(),
            expected.headers().iter().collect::<Vec<_>>()
        );
        assert_eq!(req.body_bytes(), expected.body_bytes());
    }
}

#[test]
fn parse_request_byte_by_byte() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    for b in POST {
        p.feed(&[*b], &mut col).unwrap();
    }

    assert_eq!(col.requests.len(), 1);
    assert_eq!(col.requests[0].body_text(), Some("hello world"));
    assert_eq!(col.urls, vec!["/api/items?x=1".to_string()]);
}

#[test]
fn parse_token_events() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(b"GET / HTTP/1.1\r\nX-A:  one  \r\nx-b:two\r\n\r\n", &mut col)
        .unwrap();

    assert_eq!(col.urls, vec!["/".to_string()]);
    assert_eq!(
        col.headers,
        vec![
            ("X-A".to_string(), "one".to_string()),
            ("x-b".to_string(), "two".to_string())
        ]
    );
    assert_eq!(col.heads, 1);
    assert!(!col.requests[0].has_body());
}

#[test]
fn parse_two_requests_one_feed() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(
        b"\r\nGET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
        &mut col,
    )
    .unwrap();

    let urls: Vec<_> = col.requests.iter().map(|r| r.url().to_string()).collect();
    assert_eq!(urls, vec!["/a", "/b"]);
}

#[test]
fn parse_bare_lf() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(b"GET /lf HTTP/1.0\nHost: x\n\n", &mut col).unwrap();

    assert_eq!(col.requests.len(), 1);
    assert_eq!(col.requests[0].version(), Version::HTTP_10);
    assert_eq!(col.requests[0].header("host"), Some("x"));
}

#[test]
fn parse_http09_request() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(b"GET /old\r\n", &mut col).unwrap();

    assert_eq!(col.requests.len(), 1);
    assert_eq!(col.requests[0].version(), Version::HTTP_09);
    assert!(col.requests[0].close_connection());
}

#[test]
fn parse_extension_method() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(b"FROBNICATE /x HTTP/1.1\r\n\r\n", &mut col).unwrap();

    assert_eq!(
        col.requests[0].method(),
        &Method::Extension("FROBNICATE".to_string())
    );
    assert_eq!(col.requests[0].method().is_safe(), None);
}

#[test]
fn parse_malformed_start_line() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let err = p.feed(b"GET\r\n\r\n", &mut col).unwrap_err();

    assert_eq!(err, ParseError::MalformedStartLine);
    assert!(col.requests.is_empty());

    // dead parser stays dead
    let again = p.feed(b"GET / HTTP/1.1\r\n\r\n", &mut col).unwrap_err();
    assert_eq!(again, ParseError::MalformedStartLine);
    assert!(col.requests.is_empty());
    assert_eq!(p.error(), Some(ParseError::MalformedStartLine));
}

#[test]
fn parse_bad_version() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let err = p.feed(b"GET / HTTX/1.1\r\n\r\n", &mut col).unwrap_err();
    assert_eq!(err, ParseError::MalformedStartLine);
}

#[test]
fn parse_invalid_header_name() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let err = p
        .feed(b"GET / HTTP/1.1\r\nBad Header: x\r\n\r\n", &mut col)
        .unwrap_err();
    assert_eq!(err, ParseError::InvalidHeaderToken);
}

#[test]
fn parse_header_overflow() {
    let mut p = Parser::new(ParserType::Request).with_max_header_size(64);
    let mut col = Collect::default();

    p.feed(b"GET / HTTP/1.1\r\n", &mut col).unwrap();

    let long = format!("X-Long: {}\r\n\r\n", "a".repeat(100));
    let err = p.feed(long.as_bytes(), &mut col).unwrap_err();

    assert_eq!(err, ParseError::HeaderOverflow);
    assert!(col.requests.is_empty());
}

#[test]
fn parse_invalid_content_length() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let err = p
        .feed(b"POST / HTTP/1.1\r\nContent-Length: 1x\r\n\r\n", &mut col)
        .unwrap_err();
    assert_eq!(err, ParseError::InvalidContentLength);
}

#[test]
fn parse_chunked_rejected() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    let err = p
        .feed(
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
            &mut col,
        )
        .unwrap_err();
    assert_eq!(err, ParseError::UnsupportedTransferEncoding);
    assert!(col.requests.is_empty());
}

#[test]
fn parse_unexpected_eof() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    p.feed(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc", &mut col)
        .unwrap();
    assert_eq!(p.state(), ParserState::ReadingBody);

    let err = p.feed(&[], &mut col).unwrap_err();
    assert_eq!(err, ParseError::UnexpectedEof);
    assert!(col.requests.is_empty());
}

#[test]
fn parse_eof_when_idle() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    assert_eq!(p.feed(&[], &mut col), Ok(0));
}

#[test]
fn parse_headers_rejected() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect {
        reject_headers: true,
        ..Default::default()
    };

    let err = p.feed(b"GET / HTTP/1.1\r\n\r\n", &mut col).unwrap_err();
    assert_eq!(err, ParseError::HeadersRejected);
    assert!(col.requests.is_empty());
}

#[test]
fn parse_streamed_body() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect {
        stream: true,
        ..Default::default()
    };

    p.feed(POST, &mut col).unwrap();

    assert_eq!(col.streamed, b"hello world");
    assert_eq!(col.requests.len(), 1);
    assert!(!col.requests[0].has_body());
}

#[test]
fn parse_body_rejected() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect {
        stream: true,
        reject_body: true,
        ..Default::default()
    };

    let err = p.feed(POST, &mut col).unwrap_err();
    assert_eq!(err, ParseError::BodyRejected);
}

#[test]
fn parse_response_content_length() {
    let mut p = Parser::new(ParserType::Response);
    let mut col = Collect::default();

    p.feed(
        b"HTTP/1.1 404 Not Here\r\nContent-Length: 4\r\n\r\nnope",
        &mut col,
    )
    .unwrap();

    let res = &col.responses[0];
    assert_eq!(res.status().code(), 404);
    assert_eq!(res.body_text(), Some("nope"));
    assert!(!res.close_connection());
}

#[test]
fn parse_response_until_eof() {
    let mut p = Parser::new(ParserType::Response);
    let mut col = Collect::default();

    p.feed(b"HTTP/1.0 200 OK\r\n\r\nall of ", &mut col).unwrap();
    p.feed(b"this", &mut col).unwrap();
    assert!(col.responses.is_empty());

    p.feed(&[], &mut col).unwrap();

    assert_eq!(col.responses.len(), 1);
    assert_eq!(col.responses[0].body_text(), Some("all of this"));
    assert!(col.responses[0].close_connection());
}

#[test]
fn parse_response_without_body() {
    let mut p = Parser::new(ParserType::Response);
    let mut col = Collect::default();

    p.feed(b"HTTP/1.1 204 No Content\r\n\r\n", &mut col).unwrap();
    p.feed(b"HTTP/1.1 304 Not Modified\r\n\r\n", &mut col).unwrap();

    assert_eq!(col.responses.len(), 2);
    assert!(!col.responses[0].has_body());
}

#[test]
fn parse_response_bad_status() {
    let mut p = Parser::new(ParserType::Response);
    let mut col = Collect::default();

    let err = p.feed(b"HTTP/1.1 2000 OK\r\n\r\n", &mut col).unwrap_err();
    assert_eq!(err, ParseError::MalformedStartLine);
}

#[test]
fn parse_both_detects_direction() {
    let mut p = Parser::new(ParserType::Both);
    let mut col = Collect::default();
    assert_eq!(p.kind(), ParserType::Both);

    p.feed(b"GET / HTTP/1.1\r\n\r\n", &mut col).unwrap();
    p.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", &mut col)
        .unwrap();

    assert_eq!(col.requests.len(), 1);
    assert_eq!(col.responses.len(), 1);
}

#[test]
fn parser_states() {
    let mut p = Parser::new(ParserType::Request);
    let mut col = Collect::default();

    assert_eq!(p.state(), ParserState::Idle);
    p.feed(b"GET /x", &mut col).unwrap();
    assert_eq!(p.state(), ParserState::ReadingUrl);
    p.feed(b" HTTP/1.1\r\nHos", &mut col).unwrap();
    assert_eq!(p.state(), ParserState::ReadingHeaderName);
    p.feed(b"t: a", &mut col).unwrap();
    assert_eq!(p.state(), ParserState::ReadingHeaderValue);
    p.feed(b"\r\nContent-Length: 2\r\n\r\n", &mut col).unwrap();
    assert_eq!(p.state(), ParserState::ReadingBody);
    p.feed(b"ok", &mut col).unwrap();
    assert_eq!(p.state(), ParserState::Idle);
}
