//! Stateful `Content-Transfer-Encoding` decoders.
//!
//! Each decoder consumes the raw entity bytes of one part, possibly split
//! across many calls at arbitrary positions, and forwards the decoded bytes
//! to [`PartHandler::data`].

use crate::constants;
use crate::handler::PartHandler;

const BASE64_FIRST: u8 = b'+';
const BASE64_LAST: u8 = b'z';

/// Maps ASCII `+` through `z` to their 6-bit base64 value, `-1` if invalid.
const BASE64_TABLE: [i8; (BASE64_LAST - BASE64_FIRST + 1) as usize] = {
    let mut t = [-1i8; (BASE64_LAST - BASE64_FIRST + 1) as usize];
    let mut i = 0u8;
    while i < 26 {
        t[(b'A' + i - BASE64_FIRST) as usize] = i as i8;
        t[(b'a' + i - BASE64_FIRST) as usize] = (26 + i) as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i - BASE64_FIRST) as usize] = (52 + i) as i8;
        i += 1;
    }
    t[(b'+' - BASE64_FIRST) as usize] = 62;
    t[(b'/' - BASE64_FIRST) as usize] = 63;
    t
};

fn base64_value(b: u8) -> Option<u8> {
    if !(BASE64_FIRST..=BASE64_LAST).contains(&b) {
        return None;
    }
    let v = BASE64_TABLE[(b - BASE64_FIRST) as usize];
    if v < 0 {
        None
    } else {
        Some(v as u8)
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// The `Content-Transfer-Encoding` of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Identity,
    Base64,
    QuotedPrintable,
}

impl TransferEncoding {
    /// Selects the encoding named by a `Content-Transfer-Encoding` value.
    /// Unknown or absent values select [`Identity`](TransferEncoding::Identity).
    pub fn from_header(value: Option<&str>) -> TransferEncoding {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("base64") => TransferEncoding::Base64,
            Some(v) if v.eq_ignore_ascii_case("quoted-printable") => TransferEncoding::QuotedPrintable,
            _ => TransferEncoding::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::Identity => "identity",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::QuotedPrintable => "quoted-printable",
        }
    }
}

/// A decoder for one part's entity bytes.
#[derive(Debug)]
pub enum TransferDecoder {
    Identity,
    Base64(Base64Decoder),
    QuotedPrintable(QuotedPrintableDecoder),
}

impl TransferDecoder {
    pub fn new(encoding: TransferEncoding) -> TransferDecoder {
        match encoding {
            TransferEncoding::Identity => TransferDecoder::Identity,
            TransferEncoding::Base64 => TransferDecoder::Base64(Base64Decoder::new()),
            TransferEncoding::QuotedPrintable => TransferDecoder::QuotedPrintable(QuotedPrintableDecoder::new()),
        }
    }

    pub fn encoding(&self) -> TransferEncoding {
        match self {
            TransferDecoder::Identity => TransferEncoding::Identity,
            TransferDecoder::Base64(_) => TransferEncoding::Base64,
            TransferDecoder::QuotedPrintable(_) => TransferEncoding::QuotedPrintable,
        }
    }

    /// Decodes all of `raw`, forwarding the output to `sink`.
    pub fn handle<H: PartHandler + ?Sized>(&mut self, sink: &mut H, raw: &[u8]) -> crate::Result<()> {
        match self {
            TransferDecoder::Identity => {
                if raw.is_empty() {
                    Ok(())
                } else {
                    sink.data(raw)
                }
            }
            TransferDecoder::Base64(decoder) => decoder.handle(sink, raw),
            TransferDecoder::QuotedPrintable(decoder) => decoder.handle(sink, raw),
        }
    }

    /// Checks that the part did not end in the middle of an encoded unit.
    pub fn finish(&mut self) -> crate::Result<()> {
        match self {
            TransferDecoder::Identity => Ok(()),
            TransferDecoder::Base64(decoder) => decoder.finish(),
            TransferDecoder::QuotedPrintable(decoder) => decoder.finish(),
        }
    }
}

impl Default for TransferDecoder {
    fn default() -> Self {
        TransferDecoder::Identity
    }
}

fn base64_error(reason: &'static str) -> crate::Error {
    crate::Error::Decode {
        encoding: TransferEncoding::Base64.as_str(),
        reason,
    }
}

fn quoted_printable_error(reason: &'static str) -> crate::Error {
    crate::Error::Decode {
        encoding: TransferEncoding::QuotedPrintable.as_str(),
        reason,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Padding {
    None,
    /// One `=` seen after two characters; a second one must follow.
    Expecting,
    Complete,
}

/// Streaming base64 decoder.
///
/// A quantum of four characters may be split across any number of
/// [`handle`](Base64Decoder::handle) calls. Whitespace is skipped.
#[derive(Debug)]
pub struct Base64Decoder {
    /// Characters of the current quantum consumed so far (0..=3).
    quantum: u8,
    /// High bits of the next output byte.
    pending: u8,
    padding: Padding,
    scratch: Box<[u8]>,
    len: usize,
}

impl Base64Decoder {
    pub fn new() -> Base64Decoder {
        Base64Decoder::with_capacity(constants::BASE64_SCRATCH_SIZE)
    }

    /// Creates a decoder whose output is flushed every `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Base64Decoder {
        Base64Decoder {
            quantum: 0,
            pending: 0,
            padding: Padding::None,
            scratch: vec![0; capacity.max(1)].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn handle<H: PartHandler + ?Sized>(&mut self, sink: &mut H, raw: &[u8]) -> crate::Result<()> {
        for &b in raw {
            match b {
                b' ' | b'\t' | constants::CR | constants::LF => continue,
                b'=' => {
                    self.padding = match (self.padding, self.quantum) {
                        (Padding::None, 2) => Padding::Expecting,
                        (Padding::None, 3) | (Padding::Expecting, _) => {
                            self.quantum = 0;
                            Padding::Complete
                        }
                        (Padding::Complete, _) => return Err(base64_error("unexpected padding character")),
                        _ => return Err(base64_error("padding in the wrong position")),
                    };
                    continue;
                }
                _ => {}
            }

            if self.padding != Padding::None {
                return Err(base64_error("data after padding"));
            }
            let v = base64_value(b).ok_or_else(|| base64_error("invalid character"))?;

            match self.quantum {
                0 => {
                    self.pending = v << 2;
                    self.quantum = 1;
                }
                1 => {
                    self.emit(sink, self.pending | (v >> 4))?;
                    self.pending = (v & 0x0f) << 4;
                    self.quantum = 2;
                }
                2 => {
                    self.emit(sink, self.pending | (v >> 2))?;
                    self.pending = (v & 0x03) << 6;
                    self.quantum = 3;
                }
                _ => {
                    self.emit(sink, self.pending | v)?;
                    self.quantum = 0;
                }
            }
        }

        self.flush(sink)
    }

    pub fn finish(&mut self) -> crate::Result<()> {
        if self.padding == Padding::Expecting {
            return Err(base64_error("missing padding character"));
        }
        if self.quantum == 1 {
            return Err(base64_error("truncated quantum"));
        }
        Ok(())
    }

    fn emit<H: PartHandler + ?Sized>(&mut self, sink: &mut H, byte: u8) -> crate::Result<()> {
        self.scratch[self.len] = byte;
        self.len += 1;
        if self.len == self.scratch.len() {
            self.flush(sink)?;
        }
        Ok(())
    }

    fn flush<H: PartHandler + ?Sized>(&mut self, sink: &mut H) -> crate::Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        let len = std::mem::replace(&mut self.len, 0);
        sink.data(&self.scratch[..len])
    }
}

impl Default for Base64Decoder {
    fn default() -> Self {
        Base64Decoder::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QpState {
    Literal,
    Equals,
    /// Whitespace between `=` and a soft line break.
    EqualsSpace,
    FirstHex(u8),
    /// Soft line break `=\r` seen; a following LF belongs to it.
    SoftCr,
}

/// Streaming quoted-printable decoder.
///
/// An `=XX` escape or a soft line break may be split across
/// [`handle`](QuotedPrintableDecoder::handle) calls at any byte.
#[derive(Debug)]
pub struct QuotedPrintableDecoder {
    state: QpState,
    out: Vec<u8>,
}

impl QuotedPrintableDecoder {
    pub fn new() -> QuotedPrintableDecoder {
        QuotedPrintableDecoder {
            state: QpState::Literal,
            out: Vec::new(),
        }
    }

    pub fn handle<H: PartHandler + ?Sized>(&mut self, sink: &mut H, raw: &[u8]) -> crate::Result<()> {
        self.out.clear();

        for &b in raw {
            let state = self.state;
            self.state = match state {
                QpState::Literal => self.literal(b),
                QpState::Equals => match b {
                    constants::CR => QpState::SoftCr,
                    constants::LF => QpState::Literal,
                    b' ' | b'\t' => QpState::EqualsSpace,
                    _ => QpState::FirstHex(hex_value(b).ok_or_else(|| quoted_printable_error("invalid escape"))?),
                },
                QpState::EqualsSpace => match b {
                    constants::CR => QpState::SoftCr,
                    constants::LF => QpState::Literal,
                    b' ' | b'\t' => QpState::EqualsSpace,
                    _ => return Err(quoted_printable_error("whitespace after '=' not followed by line break")),
                },
                QpState::FirstHex(high) => {
                    let low = hex_value(b).ok_or_else(|| quoted_printable_error("invalid escape"))?;
                    self.out.push(high << 4 | low);
                    QpState::Literal
                }
                QpState::SoftCr => match b {
                    constants::LF => QpState::Literal,
                    _ => self.literal(b),
                },
            };
        }

        if self.out.is_empty() {
            Ok(())
        } else {
            sink.data(&self.out)
        }
    }

    pub fn finish(&mut self) -> crate::Result<()> {
        match self.state {
            QpState::Literal | QpState::SoftCr => Ok(()),
            _ => Err(quoted_printable_error("truncated escape")),
        }
    }

    fn literal(&mut self, b: u8) -> QpState {
        if b == b'=' {
            QpState::Equals
        } else {
            self.out.push(b);
            QpState::Literal
        }
    }
}

impl Default for QuotedPrintableDecoder {
    fn default() -> Self {
        QuotedPrintableDecoder::new()
    }
}
