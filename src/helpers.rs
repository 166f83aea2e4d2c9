use std::convert::TryFrom;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use memchr::{memchr, memchr3, memmem};

use crate::constants;
use crate::headers::PartHeaders;

/// Extracts the `boundary` parameter from a `Content-Type` value.
///
/// A quoted value runs to the closing quote; an unquoted one stops at the
/// first space, tab or `;`.
pub(crate) fn extract_boundary(content_type: &str) -> crate::Result<String> {
    let lowered = content_type.to_ascii_lowercase();
    let bytes = content_type.as_bytes();

    let start = memmem::find_iter(lowered.as_bytes(), b"boundary=")
        .find(|&idx| idx == 0 || matches!(bytes[idx - 1], b';' | b' ' | b'\t'))
        .map(|idx| idx + "boundary=".len())
        .ok_or(crate::Error::InvalidBoundary)?;

    let rest = &bytes[start..];
    let value = match rest.first() {
        Some(b'"') => {
            let end = memchr(b'"', &rest[1..]).ok_or(crate::Error::InvalidBoundary)?;
            &rest[1..=end]
        }
        _ => {
            let end = memchr3(b' ', b'\t', b';', rest).unwrap_or(rest.len());
            &rest[..end]
        }
    };

    validate_boundary(value)?;

    // `value` is a sub-slice of a `&str` cut at ASCII delimiters.
    std::str::from_utf8(value)
        .map(str::to_owned)
        .map_err(|_| crate::Error::InvalidBoundary)
}

pub(crate) fn validate_boundary(boundary: &[u8]) -> crate::Result<()> {
    if boundary.is_empty()
        || boundary.len() > constants::MAX_BOUNDARY_LEN
        || boundary.iter().any(|&b| b == constants::CR || b == constants::LF)
    {
        return Err(crate::Error::InvalidBoundary);
    }

    Ok(())
}

pub(crate) fn convert_part_headers_to_header_map(part_headers: &PartHeaders) -> crate::Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(part_headers.len());

    for (name, value) in part_headers.iter() {
        let name = HeaderName::try_from(name).map_err(|_| crate::Error::Malformed {
            reason: "invalid header name",
        })?;
        let value = HeaderValue::try_from(value).map_err(|_| crate::Error::Malformed {
            reason: "invalid header value",
        })?;

        headers.append(name, value);
    }

    Ok(headers)
}
