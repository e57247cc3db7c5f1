#![no_main]
use libfuzzer_sys::fuzz_target;

use h1_connect::{ParseHandler, Parser, ParserType};

struct Ignore;

impl ParseHandler for Ignore {}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // first byte picks where the input is split in two feeds.
    let rest = &data[1..];
    let (a, b) = rest.split_at(data[0] as usize % (rest.len() + 1));

    let mut parser = Parser::new(ParserType::Both).with_max_header_size(4096);

    for piece in &[a, b] {
        if piece.is_empty() {
            continue;
        }
        if parser.feed(piece, &mut Ignore).is_err() {
            return;
        }
    }

    // EOF
    parser.feed(&[], &mut Ignore).ok();
});
