use crate::headers::PartHeaders;

/// Receives the events of a multipart stream as the parser recognises them.
///
/// For every part the parser calls [`begin_part`](PartHandler::begin_part)
/// once, [`data`](PartHandler::data) zero or more times with decoded bytes,
/// then [`end_part`](PartHandler::end_part) once. Boundary bytes and the
/// CRLF ending the header block are never passed to `data`.
///
/// Returning an error from any method aborts the parse.
pub trait PartHandler {
    fn begin_part(&mut self, headers: &PartHeaders) -> crate::Result<()>;

    fn data(&mut self, bytes: &[u8]) -> crate::Result<()>;

    fn end_part(&mut self) -> crate::Result<()>;
}

impl<H: PartHandler + ?Sized> PartHandler for &mut H {
    fn begin_part(&mut self, headers: &PartHeaders) -> crate::Result<()> {
        (**self).begin_part(headers)
    }

    fn data(&mut self, bytes: &[u8]) -> crate::Result<()> {
        (**self).data(bytes)
    }

    fn end_part(&mut self) -> crate::Result<()> {
        (**self).end_part()
    }
}
