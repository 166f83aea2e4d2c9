use std::fmt::{self, Debug, Display, Formatter};

/// A boxed error raised by consumer code or a byte source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while decoding a multipart stream.
///
/// None of these are recoverable: once one is returned, the parser that
/// produced it must not be fed again.
#[non_exhaustive]
pub enum Error {
    /// The boundary is missing, empty or contains bytes not allowed in a
    /// multipart boundary.
    InvalidBoundary,

    /// The `Content-Type` is not a `multipart/*` type.
    NoMultipart,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    DecodeContentType(mime::FromStrError),

    /// The multipart framing is structurally invalid.
    Malformed { reason: &'static str },

    /// The byte source ran out before the closing boundary was seen.
    IncompleteStream,

    /// A part's content violates its `Content-Transfer-Encoding`.
    Decode {
        encoding: &'static str,
        reason: &'static str,
    },

    /// A part exceeded the maximum size limit.
    PartSizeExceeded {
        actual: u64,
        permitted: u64,
        field_name: Option<String>,
    },

    /// The whole request exceeded the maximum size limit.
    RequestSizeExceeded { actual: u64, permitted: u64 },

    /// A part's field name is not in the
    /// [`allowed fields`](crate::Constraints::allowed_fields).
    UnknownField { field_name: Option<String> },

    /// The `filename` parameter of a `Content-Disposition` contains a NUL
    /// byte.
    InvalidFileName,

    /// The underlying byte source failed.
    StreamReadFailed(BoxError),

    /// A consumer callback failed.
    Handler(BoxError),

    /// Writing to a part's sink failed.
    SinkWrite(std::io::Error),

    /// The parser already returned an error and can't be used anymore.
    ParserFailed,

    /// Failed to decode the field data as `JSON` in
    /// [`field.json()`](crate::Field::json) method.
    #[cfg(feature = "json")]
    DecodeJson(serde_json::Error),
}

impl Error {
    /// Wraps a failure raised by consumer code.
    pub fn handler<E: Into<BoxError>>(err: E) -> Self {
        Error::Handler(err.into())
    }

    /// Returns `true` for structural violations of the multipart grammar,
    /// including a stream that ends before its closing boundary.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed { .. } | Error::IncompleteStream)
    }

    /// Returns `true` when a configured size limit was exceeded.
    pub fn is_size_exceeded(&self) -> bool {
        matches!(self, Error::PartSizeExceeded { .. } | Error::RequestSizeExceeded { .. })
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBoundary => write!(f, "multipart boundary is missing or invalid"),
            Error::NoMultipart => write!(f, "Content-Type is not multipart"),
            Error::DecodeContentType(e) => write!(f, "failed to decode Content-Type: {}", e),
            Error::Malformed { reason } => write!(f, "malformed multipart stream: {}", reason),
            Error::IncompleteStream => write!(f, "incomplete multipart stream"),
            Error::Decode { encoding, reason } => write!(f, "invalid {} content: {}", encoding, reason),
            Error::PartSizeExceeded {
                actual,
                permitted,
                field_name,
            } => write!(
                f,
                "field {:?} exceeded the size limit: {} bytes read, {} permitted",
                field_name.as_deref().unwrap_or("<unknown>"),
                actual,
                permitted
            ),
            Error::RequestSizeExceeded { actual, permitted } => write!(
                f,
                "request exceeded the size limit: {} bytes, {} permitted",
                actual, permitted
            ),
            Error::UnknownField { field_name } => {
                let name = field_name.as_deref().unwrap_or("<unknown>");
                write!(f, "unknown field received: {:?}", name)
            }
            Error::InvalidFileName => write!(f, "file name contains a NUL byte"),
            Error::StreamReadFailed(e) => write!(f, "failed to read stream: {}", e),
            Error::Handler(e) => write!(f, "part handler failed: {}", e),
            Error::SinkWrite(e) => write!(f, "failed to write to part sink: {}", e),
            Error::ParserFailed => write!(f, "parser used after a previous error"),
            #[cfg(feature = "json")]
            Error::DecodeJson(e) => write!(f, "failed to decode field data as JSON: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DecodeContentType(e) => Some(e),
            Error::StreamReadFailed(e) | Error::Handler(e) => Some(e.as_ref()),
            Error::SinkWrite(e) => Some(e),
            #[cfg(feature = "json")]
            Error::DecodeJson(e) => Some(e),
            _ => None,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
