/// Where the parser stands in the multipart grammar.
///
/// Together with the parser's header buffers, the stage carries everything
/// needed to resume on the next chunk, whatever byte the previous one ended
/// on. A partial boundary match is kept only as a count: the matched bytes
/// are always a prefix of the boundary token and are replayed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamingStage {
    /// Discarding bytes before the first boundary.
    Preamble { matched: usize },
    /// A full boundary token was matched; expecting CRLF or `--`.
    Delimiter(Delimiter),
    /// Reading a header name, or the CR of the blank line ending the headers.
    HeaderName { saw_cr: bool },
    /// Reading a header value up to its CRLF.
    HeaderValue { saw_cr: bool },
    /// Delivering entity bytes while scanning for the next boundary.
    Entity { matched: usize },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    /// Right after the boundary, transport padding may precede the CRLF.
    Start,
    SawCr,
    SawDash,
}

impl StreamingStage {
    /// The stage at stream start. The boundary token begins with CRLF, but
    /// the body may open directly with `--boundary`, so the scan starts as
    /// if that CRLF had already been matched.
    pub(crate) fn initial() -> StreamingStage {
        StreamingStage::Preamble { matched: 2 }
    }
}
