pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
pub(crate) const DASH: u8 = b'-';
pub(crate) const COLON: u8 = b':';

pub(crate) const BOUNDARY_EXT: &[u8] = b"--";
pub(crate) const CRLF: &[u8] = b"\r\n";

/// RFC 2046 limits a boundary to 70 characters.
pub(crate) const MAX_BOUNDARY_LEN: usize = 70;

pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const MAX_HEADER_LINE: usize = 8 * 1024;

/// Lookahead threshold used by [`Multipart::collect`](crate::Multipart::collect).
pub const DEFAULT_THRESHOLD: usize = 8 * 1024;

pub(crate) const READ_CHUNK_SIZE: usize = 8 * 1024;
pub(crate) const BASE64_SCRATCH_SIZE: usize = 1024;

pub(crate) const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
pub(crate) const CONTENT_DISPOSITION: &str = "content-disposition";
pub(crate) const CONTENT_TYPE: &str = "content-type";
