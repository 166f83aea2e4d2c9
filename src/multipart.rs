use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::future::poll_fn;
use futures_util::stream::{Stream, StreamExt};
#[cfg(feature = "tokio-io")]
use {tokio::io::AsyncRead, tokio_util::io::ReaderStream};

use crate::buffer::BufferedHandler;
use crate::constants;
use crate::constraints::Constraints;
use crate::error::BoxError;
use crate::field::{Field, FieldCollector};
use crate::handler::PartHandler;
use crate::parser::MultipartParser;

/// Drives a [`MultipartParser`] from an asynchronous stream of byte chunks.
///
/// Each time the stream has bytes ready, every immediately available chunk
/// is pushed through the parser before control goes back to the executor.
///
/// # Examples
///
/// ```
/// use partstream::Multipart;
/// use bytes::Bytes;
/// use std::convert::Infallible;
/// use futures_util::stream::once;
///
/// # async fn run() {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let multipart = Multipart::new(stream, "X-BOUNDARY").unwrap();
///
/// for field in multipart.collect().await.unwrap() {
///     println!("Field: {:?} = {:?}", field.name(), field.text())
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct Multipart<'r> {
    stream: Pin<Box<dyn Stream<Item = crate::Result<Bytes>> + Send + 'r>>,
    parser: MultipartParser,
    eof: bool,
    failed: bool,
}

impl<'r> Multipart<'r> {
    /// Construct a new `Multipart` instance with the given [`Bytes`] stream and the boundary.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> crate::Result<Multipart<'r>>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'r,
        E: Into<BoxError> + 'r,
        B: AsRef<str>,
    {
        Multipart::with_constraints(stream, boundary, Constraints::default())
    }

    /// Construct a new `Multipart` instance with the given [`Bytes`] stream, the boundary and
    /// the constraints.
    pub fn with_constraints<S, O, E, B>(stream: S, boundary: B, constraints: Constraints) -> crate::Result<Multipart<'r>>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'r,
        E: Into<BoxError> + 'r,
        B: AsRef<str>,
    {
        let parser = MultipartParser::with_constraints(boundary, constraints)?;
        let stream = stream.map(|res| {
            res.map(Into::into)
                .map_err(|err| crate::Error::StreamReadFailed(err.into()))
        });

        Ok(Multipart {
            stream: Box::pin(stream),
            parser,
            eof: false,
            failed: false,
        })
    }

    /// Construct a new `Multipart` instance with the boundary taken from a
    /// `Content-Type` header value.
    pub fn from_content_type<S, O, E>(
        stream: S,
        content_type: &str,
        constraints: Constraints,
    ) -> crate::Result<Multipart<'r>>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'r,
        E: Into<BoxError> + 'r,
    {
        let boundary = crate::parse_boundary(content_type)?;
        Multipart::with_constraints(stream, boundary, constraints)
    }

    /// Construct a new `Multipart` instance with the given [`AsyncRead`] reader and the boundary.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader<R, B>(reader: R, boundary: B) -> crate::Result<Multipart<'r>>
    where
        R: AsyncRead + Unpin + Send + 'r,
        B: AsRef<str>,
    {
        Multipart::with_reader_with_constraints(reader, boundary, Constraints::default())
    }

    /// Construct a new `Multipart` instance with the given [`AsyncRead`] reader, the boundary
    /// and the constraints.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader_with_constraints<R, B>(
        reader: R,
        boundary: B,
        constraints: Constraints,
    ) -> crate::Result<Multipart<'r>>
    where
        R: AsyncRead + Unpin + Send + 'r,
        B: AsRef<str>,
    {
        let stream = ReaderStream::new(reader);
        Multipart::with_constraints(stream, boundary, constraints)
    }

    /// Rejects the body up front if its declared length exceeds the
    /// request size limit.
    pub fn declare_length(&mut self, len: u64) -> crate::Result<()> {
        let res = self.parser.declare_length(len);
        self.failed |= res.is_err();
        res
    }

    pub fn is_complete(&self) -> bool {
        !self.failed && self.parser.is_complete()
    }

    /// Pushes every chunk the stream has ready through the parser.
    ///
    /// Returns `Poll::Pending` when the stream has nothing more right now,
    /// `Poll::Ready(Ok(()))` once the closing boundary was parsed and
    /// `Poll::Ready(Err(..))` on the first failure. After a failure the
    /// instance yields [`Error::ParserFailed`](crate::Error::ParserFailed).
    pub fn poll_parse<H: PartHandler + ?Sized>(&mut self, cx: &mut Context<'_>, handler: &mut H) -> Poll<crate::Result<()>> {
        loop {
            if self.failed {
                return Poll::Ready(Err(crate::Error::ParserFailed));
            }
            if self.parser.is_complete() {
                return Poll::Ready(Ok(()));
            }
            if self.eof {
                let res = self.parser.finish();
                self.failed = res.is_err();
                return Poll::Ready(res);
            }

            let res = match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.parser.parse(&chunk, handler),
                Poll::Ready(Some(Err(err))) => Err(err),
                Poll::Ready(None) => {
                    self.eof = true;
                    Ok(())
                }
                Poll::Pending => return Poll::Pending,
            };

            if let Err(err) = res {
                self.failed = true;
                return Poll::Ready(Err(err));
            }
        }
    }

    /// Parses the whole stream, delivering part events to `handler`.
    pub async fn parse<H: PartHandler + ?Sized>(&mut self, handler: &mut H) -> crate::Result<()> {
        poll_fn(|cx| self.poll_parse(cx, handler)).await
    }

    /// Parses the whole stream and collects every part in memory.
    pub async fn collect(mut self) -> crate::Result<Vec<Field>> {
        let mut handler = BufferedHandler::new(FieldCollector::new(), constants::DEFAULT_THRESHOLD);
        self.parse(&mut handler).await?;
        Ok(handler.into_decider().into_fields())
    }
}
