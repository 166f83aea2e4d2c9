use std::io::{self, Read};

use memchr::{memchr, memchr2, memchr3};

use crate::constants;
use crate::constraints::Constraints;
use crate::content_disposition::ContentDisposition;
use crate::decoder::{TransferDecoder, TransferEncoding};
use crate::handler::PartHandler;
use crate::headers::PartHeaders;
use crate::helpers;
use crate::size_limit::SizeGuard;
use crate::state::{Delimiter, StreamingStage};

/// A push-driven `multipart/form-data` decoder.
///
/// Feed successive chunks of the body to [`parse`](MultipartParser::parse);
/// chunks may be split at any byte, including inside a boundary, a header
/// line or an encoded escape. Part events are delivered to a
/// [`PartHandler`] as soon as they are recognised, so nothing beyond the
/// current header line is buffered.
///
/// The parser never blocks and holds no locks: it must be driven by one
/// caller at a time. Once any call returns an error the parser is poisoned
/// and every later call fails with [`Error::ParserFailed`](crate::Error::ParserFailed).
///
/// # Examples
///
/// ```
/// use partstream::{MultipartParser, PartHandler, PartHeaders};
///
/// #[derive(Default)]
/// struct Print(Vec<u8>);
///
/// impl PartHandler for Print {
///     fn begin_part(&mut self, headers: &PartHeaders) -> partstream::Result<()> {
///         println!("{:?}", headers.get("content-disposition"));
///         Ok(())
///     }
///
///     fn data(&mut self, bytes: &[u8]) -> partstream::Result<()> {
///         self.0.extend_from_slice(bytes);
///         Ok(())
///     }
///
///     fn end_part(&mut self) -> partstream::Result<()> {
///         Ok(())
///     }
/// }
///
/// let body = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let mut parser = MultipartParser::new("X-BOUNDARY").unwrap();
/// let mut handler = Print::default();
///
/// for chunk in body.as_bytes().chunks(7) {
///     parser.parse(chunk, &mut handler).unwrap();
/// }
/// parser.finish().unwrap();
/// assert_eq!(handler.0, b"abcd");
/// ```
#[derive(Debug)]
pub struct MultipartParser {
    boundary: String,
    /// `CRLF "--" boundary`
    token: Box<[u8]>,
    stage: StreamingStage,
    header_name: Vec<u8>,
    header_value: Vec<u8>,
    headers: PartHeaders,
    decoder: TransferDecoder,
    constraints: Constraints,
    guard: SizeGuard,
    next_part_idx: usize,
    failed: bool,
}

impl MultipartParser {
    /// Creates a parser for the given boundary with no constraints.
    pub fn new<B: AsRef<str>>(boundary: B) -> crate::Result<MultipartParser> {
        MultipartParser::with_constraints(boundary, Constraints::default())
    }

    /// Creates a parser for the given boundary applying `constraints`.
    pub fn with_constraints<B: AsRef<str>>(boundary: B, constraints: Constraints) -> crate::Result<MultipartParser> {
        let boundary = boundary.as_ref();
        helpers::validate_boundary(boundary.as_bytes())?;

        let mut token = Vec::with_capacity(constants::CRLF.len() + constants::BOUNDARY_EXT.len() + boundary.len());
        token.extend_from_slice(constants::CRLF);
        token.extend_from_slice(constants::BOUNDARY_EXT);
        token.extend_from_slice(boundary.as_bytes());

        Ok(MultipartParser {
            boundary: boundary.to_owned(),
            token: token.into_boxed_slice(),
            stage: StreamingStage::initial(),
            header_name: Vec::new(),
            header_value: Vec::new(),
            headers: PartHeaders::new(),
            decoder: TransferDecoder::default(),
            guard: SizeGuard::new(constraints.size_limit.whole_stream),
            constraints,
            next_part_idx: 0,
            failed: false,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Checks a declared total body length against the request size limit
    /// before any byte is consumed.
    pub fn declare_length(&mut self, len: u64) -> crate::Result<()> {
        let res = self.guard.check_declared_length(len);
        self.track(res)
    }

    /// Returns `true` once the closing boundary has been parsed.
    pub fn is_complete(&self) -> bool {
        self.stage == StreamingStage::Done
    }

    /// Raw bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.guard.request_bytes_read()
    }

    /// Parses the next chunk of the body, delivering events to `handler`.
    ///
    /// Bytes following the closing boundary are ignored.
    pub fn parse<H: PartHandler + ?Sized>(&mut self, chunk: &[u8], handler: &mut H) -> crate::Result<()> {
        if self.failed {
            return Err(crate::Error::ParserFailed);
        }

        let res = self.parse_chunk(chunk, handler);
        self.track(res)
    }

    /// Signals that the byte source is exhausted. Fails with
    /// [`Error::IncompleteStream`](crate::Error::IncompleteStream) unless the
    /// closing boundary was seen.
    pub fn finish(&mut self) -> crate::Result<()> {
        if self.failed {
            return Err(crate::Error::ParserFailed);
        }

        let res = if self.is_complete() {
            Ok(())
        } else {
            Err(crate::Error::IncompleteStream)
        };
        self.track(res)
    }

    /// Pulls chunks from a blocking reader until the closing boundary is
    /// parsed or the reader is exhausted.
    pub fn parse_reader<R: Read, H: PartHandler + ?Sized>(&mut self, mut reader: R, handler: &mut H) -> crate::Result<()> {
        let mut buf = vec![0; constants::READ_CHUNK_SIZE];

        while !self.is_complete() {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return self.track(Err(crate::Error::StreamReadFailed(err.into())));
                }
            };

            self.parse(&buf[..n], handler)?;
        }

        self.finish()
    }

    fn track(&mut self, res: crate::Result<()>) -> crate::Result<()> {
        if let Err(ref err) = res {
            debug!("multipart parse failed after {} bytes: {}", self.guard.request_bytes_read(), err);
            self.failed = true;
        }
        res
    }

    fn parse_chunk<H: PartHandler + ?Sized>(&mut self, chunk: &[u8], handler: &mut H) -> crate::Result<()> {
        self.guard.check_request_size(chunk.len() as u64)?;

        let mut pos = 0;
        while pos < chunk.len() {
            let stage = self.stage;
            pos = match stage {
                StreamingStage::Preamble { matched } => self.scan_preamble(chunk, pos, matched),
                StreamingStage::Delimiter(delimiter) => {
                    self.read_delimiter(chunk[pos], delimiter)?;
                    pos + 1
                }
                StreamingStage::HeaderName { saw_cr } => self.read_header_name(chunk, pos, saw_cr, handler)?,
                StreamingStage::HeaderValue { saw_cr } => self.read_header_value(chunk, pos, saw_cr)?,
                StreamingStage::Entity { matched } => self.scan_entity(chunk, pos, matched, handler)?,
                StreamingStage::Done => chunk.len(),
            };
        }

        Ok(())
    }

    /// Advances a boundary match by one byte. A mismatching CR restarts the
    /// match; CR occurs only at the start of the token.
    fn advance(&self, matched: usize, b: u8) -> usize {
        if self.token[matched] == b {
            matched + 1
        } else if b == self.token[0] {
            1
        } else {
            0
        }
    }

    fn scan_preamble(&mut self, chunk: &[u8], pos: usize, mut matched: usize) -> usize {
        let mut i = pos;

        while i < chunk.len() {
            if matched == 0 {
                match memchr(constants::CR, &chunk[i..]) {
                    Some(offset) => i += offset,
                    None => {
                        i = chunk.len();
                        break;
                    }
                }
            }

            matched = self.advance(matched, chunk[i]);
            i += 1;

            if matched == self.token.len() {
                self.stage = StreamingStage::Delimiter(Delimiter::Start);
                return i;
            }
        }

        self.stage = StreamingStage::Preamble { matched };
        i
    }

    fn scan_entity<H: PartHandler + ?Sized>(
        &mut self,
        chunk: &[u8],
        pos: usize,
        mut matched: usize,
        handler: &mut H,
    ) -> crate::Result<usize> {
        // Start of the entity bytes not yet handed to the decoder; only
        // meaningful while no boundary match is in progress.
        let mut run_start = pos;
        let mut i = pos;

        while i < chunk.len() {
            if matched == 0 {
                match memchr(constants::CR, &chunk[i..]) {
                    Some(offset) => i += offset,
                    None => {
                        i = chunk.len();
                        break;
                    }
                }
                self.deliver(handler, &chunk[run_start..i])?;
                matched = 1;
                i += 1;
                continue;
            }

            let b = chunk[i];
            if b == self.token[matched] {
                matched += 1;
                i += 1;

                if matched == self.token.len() {
                    self.end_part(handler)?;
                    self.stage = StreamingStage::Delimiter(Delimiter::Start);
                    return Ok(i);
                }
            } else {
                // Near miss: the withheld bytes were ordinary data.
                self.replay(handler, matched)?;
                if b == self.token[0] {
                    matched = 1;
                    i += 1;
                } else {
                    matched = 0;
                    run_start = i;
                }
            }
        }

        if matched == 0 {
            self.deliver(handler, &chunk[run_start..i])?;
        }
        self.stage = StreamingStage::Entity { matched };
        Ok(i)
    }

    fn read_delimiter(&mut self, b: u8, delimiter: Delimiter) -> crate::Result<()> {
        self.stage = match (delimiter, b) {
            (Delimiter::Start, constants::CR) => StreamingStage::Delimiter(Delimiter::SawCr),
            (Delimiter::Start, b' ') | (Delimiter::Start, b'\t') => StreamingStage::Delimiter(Delimiter::Start),
            (Delimiter::Start, constants::DASH) => StreamingStage::Delimiter(Delimiter::SawDash),
            (Delimiter::SawCr, constants::LF) => {
                self.headers = PartHeaders::new();
                self.header_name.clear();
                self.header_value.clear();
                StreamingStage::HeaderName { saw_cr: false }
            }
            (Delimiter::SawDash, constants::DASH) => {
                trace!("closing boundary reached after {} parts", self.next_part_idx);
                StreamingStage::Done
            }
            _ => return Err(malformed("invalid bytes after boundary")),
        };
        Ok(())
    }

    fn read_header_name<H: PartHandler + ?Sized>(
        &mut self,
        chunk: &[u8],
        pos: usize,
        saw_cr: bool,
        handler: &mut H,
    ) -> crate::Result<usize> {
        if saw_cr {
            if chunk[pos] != constants::LF {
                return Err(malformed("CR not followed by LF in headers"));
            }
            self.begin_entity(handler)?;
            return Ok(pos + 1);
        }

        let rest = &chunk[pos..];
        match memchr3(constants::COLON, constants::CR, constants::LF, rest) {
            Some(offset) => {
                self.push_bytes(Buffer::Name, &rest[..offset])?;
                match rest[offset] {
                    constants::COLON => self.stage = StreamingStage::HeaderValue { saw_cr: false },
                    constants::CR if self.header_name.is_empty() => {
                        self.stage = StreamingStage::HeaderName { saw_cr: true }
                    }
                    constants::CR => return Err(malformed("header line without a colon")),
                    _ => return Err(malformed("LF without CR in headers")),
                }
                Ok(pos + offset + 1)
            }
            None => {
                self.push_bytes(Buffer::Name, rest)?;
                Ok(chunk.len())
            }
        }
    }

    fn read_header_value(&mut self, chunk: &[u8], pos: usize, saw_cr: bool) -> crate::Result<usize> {
        if saw_cr {
            if chunk[pos] != constants::LF {
                return Err(malformed("CR not followed by LF in headers"));
            }
            self.push_header()?;
            self.stage = StreamingStage::HeaderName { saw_cr: false };
            return Ok(pos + 1);
        }

        let rest = &chunk[pos..];
        match memchr2(constants::CR, constants::LF, rest) {
            Some(offset) => {
                self.push_bytes(Buffer::Value, &rest[..offset])?;
                if rest[offset] == constants::LF {
                    return Err(malformed("LF without CR in headers"));
                }
                self.stage = StreamingStage::HeaderValue { saw_cr: true };
                Ok(pos + offset + 1)
            }
            None => {
                self.push_bytes(Buffer::Value, rest)?;
                Ok(chunk.len())
            }
        }
    }

    fn push_bytes(&mut self, buffer: Buffer, bytes: &[u8]) -> crate::Result<()> {
        let buf = match buffer {
            Buffer::Name => &mut self.header_name,
            Buffer::Value => &mut self.header_value,
        };
        if buf.len() + bytes.len() > constants::MAX_HEADER_LINE {
            return Err(malformed("header line too long"));
        }
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn push_header(&mut self) -> crate::Result<()> {
        if self.headers.line_count() >= constants::MAX_HEADERS {
            return Err(malformed("too many headers"));
        }

        let name = String::from_utf8_lossy(&self.header_name).trim().to_owned();
        if name.is_empty() {
            return Err(malformed("empty header name"));
        }
        let value = String::from_utf8_lossy(&self.header_value).trim().to_owned();

        self.headers.append(name, value);
        self.header_name.clear();
        self.header_value.clear();
        Ok(())
    }

    fn begin_entity<H: PartHandler + ?Sized>(&mut self, handler: &mut H) -> crate::Result<()> {
        let encoding = TransferEncoding::from_header(self.headers.get(constants::CONTENT_TRANSFER_ENCODING));
        self.decoder = TransferDecoder::new(encoding);

        let disposition = ContentDisposition::parse(&self.headers)?;
        let field_name = disposition.field_name;

        if !self.constraints.is_it_allowed(field_name.as_deref()) {
            return Err(crate::Error::UnknownField { field_name });
        }

        let limit = self.constraints.size_limit.extract_size_limit_for(field_name.as_deref());

        trace!(
            "part {} begins: field {:?}, {} encoding",
            self.next_part_idx,
            field_name,
            encoding.as_str()
        );

        self.guard.begin_part(limit, field_name);
        self.next_part_idx += 1;
        self.stage = StreamingStage::Entity { matched: 0 };

        handler.begin_part(&self.headers)
    }

    fn end_part<H: PartHandler + ?Sized>(&mut self, handler: &mut H) -> crate::Result<()> {
        self.decoder.finish()?;
        trace!(
            "part {} ends: {} bytes decoded",
            self.next_part_idx - 1,
            self.guard.part_bytes_read()
        );
        handler.end_part()
    }

    fn deliver<H: PartHandler + ?Sized>(&mut self, handler: &mut H, bytes: &[u8]) -> crate::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut counted = Counted {
            guard: &mut self.guard,
            handler,
        };
        self.decoder.handle(&mut counted, bytes)
    }

    /// Hands the first `matched` token bytes to the decoder as entity data.
    fn replay<H: PartHandler + ?Sized>(&mut self, handler: &mut H, matched: usize) -> crate::Result<()> {
        let mut counted = Counted {
            guard: &mut self.guard,
            handler,
        };
        self.decoder.handle(&mut counted, &self.token[..matched])
    }
}

#[derive(Clone, Copy)]
enum Buffer {
    Name,
    Value,
}

fn malformed(reason: &'static str) -> crate::Error {
    crate::Error::Malformed { reason }
}

/// Counts decoded bytes against the part size limit on their way to the
/// handler.
struct Counted<'a, H: ?Sized> {
    guard: &'a mut SizeGuard,
    handler: &'a mut H,
}

impl<H: PartHandler + ?Sized> PartHandler for Counted<'_, H> {
    fn begin_part(&mut self, headers: &PartHeaders) -> crate::Result<()> {
        self.handler.begin_part(headers)
    }

    fn data(&mut self, bytes: &[u8]) -> crate::Result<()> {
        self.guard.check_part_size(bytes.len() as u64)?;
        self.handler.data(bytes)
    }

    fn end_part(&mut self) -> crate::Result<()> {
        self.handler.end_part()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size_limit::SizeLimit;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Begin(Vec<(String, String)>),
        Data(Vec<u8>),
        End,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Recorder {
        /// Events with consecutive data calls merged.
        fn coalesced(&self) -> Vec<Event> {
            let mut out: Vec<Event> = Vec::new();
            for event in &self.events {
                match (out.last_mut(), event) {
                    (Some(Event::Data(prev)), Event::Data(bytes)) => prev.extend_from_slice(bytes),
                    _ => out.push(event.clone()),
                }
            }
            out
        }

        fn bodies(&self) -> Vec<Vec<u8>> {
            let mut bodies = Vec::new();
            for event in self.coalesced() {
                match event {
                    Event::Begin(_) => bodies.push(Vec::new()),
                    Event::Data(bytes) => bodies.last_mut().unwrap().extend_from_slice(&bytes),
                    Event::End => {}
                }
            }
            bodies
        }
    }

    impl PartHandler for Recorder {
        fn begin_part(&mut self, headers: &PartHeaders) -> crate::Result<()> {
            let headers = headers.iter().map(|(n, v)| (n.to_owned(), v.to_owned())).collect();
            self.events.push(Event::Begin(headers));
            Ok(())
        }

        fn data(&mut self, bytes: &[u8]) -> crate::Result<()> {
            assert!(!bytes.is_empty());
            self.events.push(Event::Data(bytes.to_vec()));
            Ok(())
        }

        fn end_part(&mut self) -> crate::Result<()> {
            self.events.push(Event::End);
            Ok(())
        }
    }

    const RFC_BODY: &str = "This is the preamble.  It is to be ignored, though it\r\n\
        is a handy place for mail composers to include an\r\n\
        explanatory note to non-MIME compliant readers.\r\n\
        --unique-boundary-1\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        Here is some text.\r\n\
        --unique-boundary-1\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        Here is some more text.\r\n\
        --unique-boundary-1--\r\n\
        This is the epilogue.  It is also to be ignored.\r\n";

    fn parse_chunked(boundary: &str, body: &[u8], chunk: usize) -> crate::Result<Recorder> {
        let mut parser = MultipartParser::new(boundary)?;
        let mut recorder = Recorder::default();
        for piece in body.chunks(chunk.max(1)) {
            parser.parse(piece, &mut recorder)?;
        }
        parser.finish()?;
        Ok(recorder)
    }

    #[test]
    fn test_two_text_parts() {
        let recorder = parse_chunked("unique-boundary-1", RFC_BODY.as_bytes(), RFC_BODY.len()).unwrap();
        let content_type = vec![("Content-Type".to_owned(), "text/plain".to_owned())];

        assert_eq!(
            recorder.coalesced(),
            vec![
                Event::Begin(content_type.clone()),
                Event::Data(b"Here is some text.".to_vec()),
                Event::End,
                Event::Begin(content_type),
                Event::Data(b"Here is some more text.".to_vec()),
                Event::End,
            ]
        );
    }

    #[test]
    fn test_chunk_invariance() {
        let whole = parse_chunked("unique-boundary-1", RFC_BODY.as_bytes(), RFC_BODY.len()).unwrap();

        for chunk in 1..=64 {
            let split = parse_chunked("unique-boundary-1", RFC_BODY.as_bytes(), chunk).unwrap();
            assert_eq!(split.coalesced(), whole.coalesced(), "chunk size {}", chunk);
        }

        for at in 0..RFC_BODY.len() {
            let (a, b) = RFC_BODY.as_bytes().split_at(at);
            let mut parser = MultipartParser::new("unique-boundary-1").unwrap();
            let mut recorder = Recorder::default();
            parser.parse(a, &mut recorder).unwrap();
            parser.parse(b, &mut recorder).unwrap();
            assert!(parser.is_complete());
            assert_eq!(recorder.coalesced(), whole.coalesced(), "split at {}", at);
        }
    }

    #[test]
    fn test_body_without_preamble() {
        let body = b"--X\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--X--";
        let recorder = parse_chunked("X", body, 1).unwrap();
        assert_eq!(recorder.bodies(), vec![b"1".to_vec()]);
    }

    #[test]
    fn test_boundary_near_misses_are_data() {
        let content: &[u8] = b"\r\n--X-BOUNDAR\r\r\n--X-BOUNDARYX\r\n-\r\n--\r";
        let mut body = b"--X-BOUNDARY\r\n\r\n".to_vec();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n--X-BOUNDARY--\r\n");

        for chunk in 1..=body.len() {
            let recorder = parse_chunked("X-BOUNDARY", &body, chunk);
            // "--X-BOUNDARYX" is not a legal delimiter line.
            assert_eq!(recorder.err(), Some(malformed("invalid bytes after boundary")));
        }

        let content: &[u8] = b"\r\n--X-BOUNDAR\r\r\n--X-BOUNDAR\r\n-\r\n--\r";
        let mut body = b"--X-BOUNDARY\r\n\r\n".to_vec();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n--X-BOUNDARY--\r\n");

        for chunk in 1..=body.len() {
            let recorder = parse_chunked("X-BOUNDARY", &body, chunk).unwrap();
            assert_eq!(recorder.bodies(), vec![content.to_vec()], "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_boundary_straddling_single_bytes() {
        let body = b"--b\r\n\r\nab\r\n--b\r\n\r\ncd\r\n--b--";
        let recorder = parse_chunked("b", body, 1).unwrap();

        for event in &recorder.events {
            if let Event::Data(bytes) = event {
                assert!(!bytes.contains(&b'-'));
                assert!(!bytes.contains(&b'\r'));
            }
        }
        assert_eq!(recorder.bodies(), vec![b"ab".to_vec(), b"cd".to_vec()]);
    }

    #[test]
    fn test_empty_parts_and_streams() {
        let recorder = parse_chunked("X", b"--X--\r\n", 1).unwrap();
        assert!(recorder.events.is_empty());

        let recorder = parse_chunked("X", b"--X\r\nA: b\r\n\r\n\r\n--X--", 3).unwrap();
        assert_eq!(
            recorder.coalesced(),
            vec![Event::Begin(vec![("A".to_owned(), "b".to_owned())]), Event::End]
        );

        let recorder = parse_chunked("X", b"--X\r\n\r\n\r\n--X--", 1).unwrap();
        assert_eq!(recorder.coalesced(), vec![Event::Begin(Vec::new()), Event::End]);
    }

    #[test]
    fn test_header_trimming_and_padding() {
        let body = b"--X \t\r\n  Content-Type :  text/plain  \r\nX-Multi: 1\r\nx-multi: 2\r\n\r\nv\r\n--X--epilogue";
        let recorder = parse_chunked("X", body, 5).unwrap();
        assert_eq!(
            recorder.coalesced()[0],
            Event::Begin(vec![
                ("Content-Type".to_owned(), "text/plain".to_owned()),
                ("X-Multi".to_owned(), "1".to_owned()),
                ("X-Multi".to_owned(), "2".to_owned()),
            ])
        );
    }

    #[test]
    fn test_transfer_encodings() {
        let body = b"--X\r\n\
            Content-Transfer-Encoding: BASE64\r\n\r\n\
            Zm9v\r\nYmFy\r\n\
            --X\r\n\
            Content-Transfer-Encoding: quoted-printable\r\n\r\n\
            time=3Dmoney.\r\n\
            --X\r\n\
            Content-Transfer-Encoding: base64\r\n\r\n\
            Zg==\r\n\
            --X\r\n\
            Content-Transfer-Encoding: base64\r\n\r\n\
            \r\n\
            --X--\r\n";

        for chunk in 1..=body.len() {
            let recorder = parse_chunked("X", body, chunk).unwrap();
            assert_eq!(
                recorder.bodies(),
                vec![b"foobar".to_vec(), b"time=money.".to_vec(), b"f".to_vec(), Vec::new()]
            );
        }
    }

    #[test]
    fn test_bad_encoding_aborts() {
        let body = b"--X\r\nContent-Transfer-Encoding: base64\r\n\r\nZm9*\r\n--X--\r\n";
        let err = parse_chunked("X", body, body.len()).err().unwrap();
        assert!(matches!(err, crate::Error::Decode { encoding: "base64", .. }));

        let body = b"--X\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nab=\r\n--X--\r\n";
        let err = parse_chunked("X", body, body.len()).err().unwrap();
        assert!(matches!(err, crate::Error::Decode { .. }));
    }

    #[test]
    fn test_missing_terminator() {
        let body = b"--X\r\n\r\ndata\r\n--X\r\n\r\nmore";
        let err = parse_chunked("X", body, 4).err().unwrap();
        assert_eq!(err, crate::Error::IncompleteStream);
        assert!(err.is_malformed());

        let err = parse_chunked("X", b"no boundary here", 4).err().unwrap();
        assert_eq!(err, crate::Error::IncompleteStream);
    }

    #[test]
    fn test_malformed_headers() {
        let err = parse_chunked("X", b"--X\r\nName: value\n\r\n", 1).err().unwrap();
        assert_eq!(err, malformed("LF without CR in headers"));

        let err = parse_chunked("X", b"--X\r\nName\nvalue", 1).err().unwrap();
        assert_eq!(err, malformed("LF without CR in headers"));

        let err = parse_chunked("X", b"--X\r\nName\r\n\r\n", 1).err().unwrap();
        assert_eq!(err, malformed("header line without a colon"));

        let err = parse_chunked("X", b"--X\r\n\rx", 1).err().unwrap();
        assert_eq!(err, malformed("CR not followed by LF in headers"));

        let err = parse_chunked("X", b"--X\r\n: value\r\n\r\n", 1).err().unwrap();
        assert_eq!(err, malformed("empty header name"));

        let long = format!("--X\r\nName: {}\r\n\r\n", "v".repeat(constants::MAX_HEADER_LINE + 1));
        let err = parse_chunked("X", long.as_bytes(), 100).err().unwrap();
        assert_eq!(err, malformed("header line too long"));
    }

    #[test]
    fn test_repeated_header_counts_every_line() {
        let body = |lines: usize| format!("--X\r\n{}\r\nbody\r\n--X--", "X-A: aaaa\r\n".repeat(lines));

        let recorder = parse_chunked("X", body(constants::MAX_HEADERS).as_bytes(), 7).unwrap();
        assert_eq!(recorder.bodies(), vec![b"body".to_vec()]);

        let err = parse_chunked("X", body(constants::MAX_HEADERS + 1).as_bytes(), 7)
            .err()
            .unwrap();
        assert_eq!(err, malformed("too many headers"));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_invalid_boundary() {
        assert_eq!(MultipartParser::new("").err(), Some(crate::Error::InvalidBoundary));
        assert_eq!(MultipartParser::new("a\r\nb").err(), Some(crate::Error::InvalidBoundary));
        assert_eq!(
            MultipartParser::new("x".repeat(71)).err(),
            Some(crate::Error::InvalidBoundary)
        );
        let boundary = "x".repeat(70);
        assert_eq!(MultipartParser::new(&boundary).unwrap().boundary(), boundary);
    }

    #[test]
    fn test_part_size_limit() {
        let limit = 8u64;
        let constraints = Constraints::new().size_limit(SizeLimit::new().per_field(limit));

        for len in [limit, limit + 1] {
            let body = format!("--X\r\n\r\n{}\r\n--X--", "a".repeat(len as usize));
            let mut parser = MultipartParser::with_constraints("X", constraints.clone()).unwrap();
            let mut recorder = Recorder::default();
            let res = body
                .as_bytes()
                .chunks(1)
                .try_for_each(|piece| parser.parse(piece, &mut recorder));

            if len == limit {
                assert!(res.is_ok());
                assert!(parser.is_complete());
            } else {
                assert_eq!(
                    res,
                    Err(crate::Error::PartSizeExceeded {
                        actual: limit + 1,
                        permitted: limit,
                        field_name: None,
                    })
                );
            }
        }
    }

    #[test]
    fn test_part_size_counts_decoded_bytes() {
        // 8 base64 characters decode to 6 bytes.
        let constraints = Constraints::new().size_limit(SizeLimit::new().per_field(6));
        let body = b"--X\r\nContent-Transfer-Encoding: base64\r\n\r\nZm9vYmFy\r\n--X--";
        let mut parser = MultipartParser::with_constraints("X", constraints).unwrap();
        parser.parse(body, &mut Recorder::default()).unwrap();
        assert!(parser.is_complete());
    }

    #[test]
    fn test_field_specific_limit() {
        let constraints = Constraints::new().size_limit(SizeLimit::new().per_field(100).for_field("small", 2));
        let body = b"--X\r\nContent-Disposition: form-data; name=\"small\"\r\n\r\nabc\r\n--X--";
        let mut parser = MultipartParser::with_constraints("X", constraints).unwrap();
        let err = parser.parse(body, &mut Recorder::default()).unwrap_err();
        assert_eq!(
            err,
            crate::Error::PartSizeExceeded {
                actual: 3,
                permitted: 2,
                field_name: Some("small".to_owned()),
            }
        );
    }

    #[test]
    fn test_request_size_limit() {
        let body = b"--X\r\n\r\nabcdef\r\n--X--";
        let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(body.len() as u64));

        let mut parser = MultipartParser::with_constraints("X", constraints.clone()).unwrap();
        parser.parse(body, &mut Recorder::default()).unwrap();
        assert_eq!(parser.bytes_read(), body.len() as u64);

        let mut parser = MultipartParser::with_constraints("X", constraints.clone()).unwrap();
        parser.parse(body, &mut Recorder::default()).unwrap();
        assert_eq!(
            parser.parse(b"\r\n", &mut Recorder::default()),
            Err(crate::Error::RequestSizeExceeded {
                actual: body.len() as u64 + 2,
                permitted: body.len() as u64,
            })
        );

        let mut parser = MultipartParser::with_constraints("X", constraints).unwrap();
        let mut recorder = Recorder::default();
        assert!(parser.declare_length(body.len() as u64 + 1).unwrap_err().is_size_exceeded());
        assert_eq!(parser.bytes_read(), 0);
        assert_eq!(parser.parse(body, &mut recorder), Err(crate::Error::ParserFailed));
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn test_allowed_fields() {
        let constraints = Constraints::new().allowed_fields(vec!["ok"]);
        let body = b"--X\r\nContent-Disposition: form-data; name=\"ok\"\r\n\r\n1\r\n--X\r\nContent-Disposition: form-data; name=\"nope\"\r\n\r\n2\r\n--X--";
        let mut parser = MultipartParser::with_constraints("X", constraints).unwrap();
        let mut recorder = Recorder::default();
        let err = parser.parse(body, &mut recorder).unwrap_err();

        assert_eq!(
            err,
            crate::Error::UnknownField {
                field_name: Some("nope".to_owned())
            }
        );
        assert_eq!(recorder.bodies(), vec![b"1".to_vec()]);
    }

    #[test]
    fn test_poisoned_after_error() {
        let mut parser = MultipartParser::new("X").unwrap();
        let mut recorder = Recorder::default();
        assert!(parser.parse(b"--X\r\nbad\n", &mut recorder).is_err());
        assert_eq!(parser.parse(b"\r\n--X--", &mut recorder), Err(crate::Error::ParserFailed));
        assert_eq!(parser.finish(), Err(crate::Error::ParserFailed));
    }

    #[test]
    fn test_handler_failure_aborts() {
        struct Fail;

        impl PartHandler for Fail {
            fn begin_part(&mut self, _headers: &PartHeaders) -> crate::Result<()> {
                Ok(())
            }

            fn data(&mut self, _bytes: &[u8]) -> crate::Result<()> {
                Err(crate::Error::handler("refused"))
            }

            fn end_part(&mut self) -> crate::Result<()> {
                panic!("end_part after a failed data call");
            }
        }

        let mut parser = MultipartParser::new("X").unwrap();
        let err = parser.parse(b"--X\r\n\r\nabc\r\n--X--", &mut Fail).unwrap_err();
        assert_eq!(err.to_string(), "part handler failed: refused");
        assert!(!parser.is_complete());
    }

    #[test]
    fn test_parse_reader() {
        let mut parser = MultipartParser::new("unique-boundary-1").unwrap();
        let mut recorder = Recorder::default();
        parser
            .parse_reader(io::Cursor::new(RFC_BODY.as_bytes()), &mut recorder)
            .unwrap();
        assert!(parser.is_complete());
        assert_eq!(
            recorder.bodies(),
            vec![b"Here is some text.".to_vec(), b"Here is some more text.".to_vec()]
        );

        let truncated = &RFC_BODY.as_bytes()[..RFC_BODY.len() / 2];
        let mut parser = MultipartParser::new("unique-boundary-1").unwrap();
        let err = parser
            .parse_reader(truncated, &mut Recorder::default())
            .unwrap_err();
        assert_eq!(err, crate::Error::IncompleteStream);
    }
}
