//! A push-driven, streaming decoder for `multipart/form-data` bodies.
//!
//! The body is fed to a [`MultipartParser`] in chunks of any size. Part
//! boundaries and headers are recognized as the bytes arrive, entity
//! content is transfer-decoded (`base64` and `quoted-printable` included)
//! and handed to a [`PartHandler`] without ever holding a whole part in
//! memory. Size limits are enforced as the data flows.
//!
//! [`BufferedHandler`] sits on top of that and, for every part, buffers
//! only as many bytes as needed to let a [`SinkDecider`] pick where the
//! part goes: memory, a file, a writer, or nowhere.
//!
//! # Examples
//!
//! ```
//! use partstream::{BufferedHandler, FieldCollector, MultipartParser};
//!
//! # fn run() -> partstream::Result<()> {
//! let body = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
//!
//! let mut parser = MultipartParser::new("X-BOUNDARY")?;
//! let mut handler = BufferedHandler::new(FieldCollector::new(), partstream::DEFAULT_THRESHOLD);
//!
//! for chunk in body.as_bytes().chunks(7) {
//!     parser.parse(chunk, &mut handler)?;
//! }
//! parser.finish()?;
//!
//! let fields = handler.into_decider().into_fields();
//! assert_eq!(fields[0].name(), Some("my_text_field"));
//! assert_eq!(fields[0].text(), "abcd");
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```
//!
//! ## Optional features
//!
//! * `json`: adds [`Field::json`] to deserialize a collected field.
//! * `tokio-io`: adds [`Multipart::with_reader`] for any tokio `AsyncRead`.
//! * `log`: emits `trace`/`debug` records through the `log` crate.

#[cfg(feature = "log")]
macro_rules! trace {
    ($($t:tt)*) => { ::log::trace!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($t:tt)*) => {{
        if false {
            let _ = ::std::format_args!($($t)*);
        }
    }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($t:tt)*) => { ::log::debug!($($t)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($t:tt)*) => {{
        if false {
            let _ = ::std::format_args!($($t)*);
        }
    }};
}

pub use buffer::{BufferedHandler, PartOutput, Sink, SinkDecider};
pub use bytes;
pub use constants::DEFAULT_THRESHOLD;
pub use constraints::Constraints;
pub use decoder::{Base64Decoder, QuotedPrintableDecoder, TransferDecoder, TransferEncoding};
pub use error::{BoxError, Error};
pub use field::{Field, FieldCollector, PartInfo};
pub use handler::PartHandler;
pub use headers::PartHeaders;
pub use multipart::Multipart;
pub use parser::MultipartParser;
pub use size_limit::SizeLimit;

mod buffer;
mod constants;
mod constraints;
mod content_disposition;
mod decoder;
mod error;
mod field;
mod handler;
mod headers;
mod helpers;
mod multipart;
mod parser;
mod size_limit;
mod state;

/// A Result type often returned from methods that can have `partstream` errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the boundary value.
///
/// Any `multipart/*` type is accepted. The boundary must be 1 to 70 bytes
/// long and may be quoted.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let content_type = content_type.as_ref();
    let m = content_type
        .parse::<mime::Mime>()
        .map_err(crate::Error::DecodeContentType)?;

    if m.type_() != mime::MULTIPART {
        return Err(crate::Error::NoMultipart);
    }

    helpers::extract_boundary(content_type)
}
