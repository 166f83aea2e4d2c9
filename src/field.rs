use std::borrow::Cow;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use http::header::HeaderMap;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

use crate::buffer::{PartOutput, Sink, SinkDecider};
use crate::constants;
use crate::content_disposition::ContentDisposition;
use crate::decoder::TransferEncoding;
use crate::error::BoxError;
use crate::headers::PartHeaders;
use crate::helpers;

/// What is known about a part once its headers have been read.
#[derive(Debug, Clone)]
pub struct PartInfo {
    headers: PartHeaders,
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<mime::Mime>,
    idx: usize,
}

impl PartInfo {
    pub(crate) fn from_headers(idx: usize, headers: &PartHeaders) -> crate::Result<PartInfo> {
        let content_disposition = ContentDisposition::parse(headers)?;
        let content_type = headers
            .get(constants::CONTENT_TYPE)
            .and_then(|val| val.parse::<mime::Mime>().ok());

        Ok(PartInfo {
            headers: headers.clone(),
            name: content_disposition.field_name,
            file_name: content_disposition.file_name,
            content_type,
            idx,
        })
    }

    /// The field name found in the
    /// [`Content-Disposition`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Headers/Content-Disposition)
    /// header.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The file name found in the `Content-Disposition` header.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The parsed `Content-Type` header, if present and valid.
    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.content_type.as_ref()
    }

    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_header(self.headers.get(constants::CONTENT_TRANSFER_ENCODING))
    }

    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// The part headers as an [`http::HeaderMap`].
    pub fn header_map(&self) -> crate::Result<HeaderMap> {
        helpers::convert_part_headers_to_header_map(&self.headers)
    }

    /// Position of the part in the stream, starting at zero.
    pub fn index(&self) -> usize {
        self.idx
    }
}

/// A part whose decoded content was collected in memory.
#[derive(Debug, Clone)]
pub struct Field {
    info: PartInfo,
    data: Bytes,
}

impl Field {
    pub fn new(info: PartInfo, data: Bytes) -> Field {
        Field { info, data }
    }

    pub fn info(&self) -> &PartInfo {
        &self.info
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.info.file_name()
    }

    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.info.content_type()
    }

    pub fn headers(&self) -> &PartHeaders {
        self.info.headers()
    }

    pub fn index(&self) -> usize {
        self.info.index()
    }

    /// The decoded content.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Decodes the content as text using the `charset` parameter of the
    /// part's `Content-Type`, falling back to UTF-8.
    pub fn text(&self) -> String {
        self.text_with_charset("utf-8")
    }

    /// Decodes the content as text using the `charset` parameter of the
    /// part's `Content-Type`, falling back to `default_encoding`.
    pub fn text_with_charset(&self, default_encoding: &str) -> String {
        let encoding_name = self
            .content_type()
            .and_then(|mime| mime.get_param(mime::CHARSET))
            .map(|charset| charset.as_str())
            .unwrap_or(default_encoding);

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let (text, _, _) = encoding.decode(&self.data);

        match text {
            Cow::Owned(s) => s,
            Cow::Borrowed(s) => String::from(s),
        }
    }

    /// Deserializes the content as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.data).map_err(crate::Error::DecodeJson)
    }
}

/// A [`SinkDecider`] that keeps every part in memory and collects them as
/// [`Field`]s.
#[derive(Debug, Default)]
pub struct FieldCollector {
    fields: Vec<Field>,
}

impl FieldCollector {
    pub fn new() -> FieldCollector {
        FieldCollector::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

impl SinkDecider for FieldCollector {
    fn decide(&mut self, _part: &PartInfo, _lookahead: &[u8]) -> Result<Sink, BoxError> {
        Ok(Sink::Memory)
    }

    fn complete(&mut self, part: PartInfo, output: PartOutput) -> Result<(), BoxError> {
        if let PartOutput::Memory(data) = output {
            trace!("collected field {:?}: {} bytes", part.name(), data.len());
            self.fields.push(Field::new(part, data));
        }
        Ok(())
    }
}
