#![no_main]

use libfuzzer_sys::fuzz_target;
use partstream::{BufferedHandler, MultipartParser, Sink};

fuzz_target!(|data: &[u8]| {
    let (split, body) = match data.split_first() {
        Some((&split, body)) => (usize::from(split).max(1), body),
        None => return,
    };

    let mut parser = MultipartParser::new("X-BOUNDARY").expect("valid boundary");
    let mut handler = BufferedHandler::new(
        |_: &partstream::PartInfo, _: &[u8]| -> Result<Sink, partstream::BoxError> { Ok(Sink::Discard) },
        16,
    );

    for chunk in body.chunks(split) {
        if parser.parse(chunk, &mut handler).is_err() {
            assert!(parser.parse(chunk, &mut handler).is_err());
            return;
        }
    }
    let _ = parser.finish();
});
