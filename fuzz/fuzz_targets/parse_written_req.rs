#![no_main]
use libfuzzer_sys::fuzz_target;

use h1_connect::{Method, ParseHandler, Parser, ParserType, Request, Version};

#[derive(Default)]
struct Count(usize);

impl ParseHandler for Count {
    fn on_request(&mut self, _req: Request) {
        self.0 += 1;
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }

    let method = if data[0] < 85 {
        Method::Get
    } else if data[0] < 170 {
        Method::Post
    } else {
        Method::Head
    };

    let version = if data[1] < 128 {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    };

    let urllen = (data[2] as usize).min(data.len() - 12);
    let url = String::from_utf8_lossy(&data[12..(12 + urllen)]).replace(|c: char| c.is_whitespace(), "");

    let mut req = Request::with_version(method, url, version);

    let mut arr = [0_u8; 8];
    arr.copy_from_slice(&data[3..11]);
    let size = u64::from_be_bytes(arr) % 1024;

    if data[11] < 128 {
        req.set_body_bytes(&data[(12 + urllen)..]);
    } else {
        // lie about the length, the rest of the input follows the head.
        req.set_header("content-length", size.to_string());
    }

    let mut buf = match h1_connect::http11::write_request(&mut req) {
        Ok(v) => v,
        Err(_) => return,
    };

    if data[11] >= 128 {
        buf.extend_from_slice(&data[(12 + urllen)..]);
    }

    let mut parser = Parser::new(ParserType::Request);
    let mut count = Count::default();

    if parser.feed(&buf, &mut count).is_err() {
        return;
    }
    parser.feed(&[], &mut count).ok();
});
