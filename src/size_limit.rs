use std::collections::HashMap;

/// Represents size limits of the stream to prevent DoS attacks.
///
/// Limits left unset are unlimited. Please refer
/// [`Constraints`](crate::Constraints) for more info.
#[derive(Debug, Clone, Default)]
pub struct SizeLimit {
    pub(crate) whole_stream: Option<u64>,
    pub(crate) per_field: Option<u64>,
    pub(crate) field_map: HashMap<String, u64>,
}

impl SizeLimit {
    /// Creates a size limit that is unlimited for the whole stream and for
    /// each field.
    pub fn new() -> SizeLimit {
        SizeLimit::default()
    }

    /// Sets size limit for the whole stream, counted in raw bytes before any
    /// transfer decoding.
    pub fn whole_stream(mut self, limit: u64) -> SizeLimit {
        self.whole_stream = Some(limit);
        self
    }

    /// Sets size limit for each field, counted in decoded bytes.
    pub fn per_field(mut self, limit: u64) -> SizeLimit {
        self.per_field = Some(limit);
        self
    }

    /// Sets size limit for a specific field, it overrides the `per_field` value for this field.
    ///
    /// It is useful when you want to set a size limit on a textual field which will be stored in memory
    /// to avoid potential `DoS attack` from attackers running the server out of memory.
    pub fn for_field<N: Into<String>>(mut self, field_name: N, limit: u64) -> SizeLimit {
        self.field_map.insert(field_name.into(), limit);
        self
    }

    pub(crate) fn extract_size_limit_for(&self, field: Option<&str>) -> Option<u64> {
        field
            .and_then(|field| self.field_map.get(field))
            .copied()
            .or(self.per_field)
    }
}

/// Running byte counters checked against a [`SizeLimit`].
#[derive(Debug, Default)]
pub(crate) struct SizeGuard {
    max_request_size: Option<u64>,
    max_part_size: Option<u64>,
    request_bytes_read: u64,
    part_bytes_read: u64,
    field_name: Option<String>,
}

impl SizeGuard {
    pub(crate) fn new(max_request_size: Option<u64>) -> SizeGuard {
        SizeGuard {
            max_request_size,
            ..SizeGuard::default()
        }
    }

    /// Fails when a declared total length already exceeds the request limit.
    pub(crate) fn check_declared_length(&self, len: u64) -> crate::Result<()> {
        match self.max_request_size {
            Some(permitted) if len > permitted => Err(crate::Error::RequestSizeExceeded {
                actual: len,
                permitted,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn begin_part(&mut self, max_part_size: Option<u64>, field_name: Option<String>) {
        self.max_part_size = max_part_size;
        self.part_bytes_read = 0;
        self.field_name = field_name;
    }

    pub(crate) fn check_request_size(&mut self, n: u64) -> crate::Result<()> {
        self.request_bytes_read = self.request_bytes_read.saturating_add(n);

        match self.max_request_size {
            Some(permitted) if self.request_bytes_read > permitted => Err(crate::Error::RequestSizeExceeded {
                actual: self.request_bytes_read,
                permitted,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_part_size(&mut self, n: u64) -> crate::Result<()> {
        self.part_bytes_read = self.part_bytes_read.saturating_add(n);

        match self.max_part_size {
            Some(permitted) if self.part_bytes_read > permitted => Err(crate::Error::PartSizeExceeded {
                actual: self.part_bytes_read,
                permitted,
                field_name: self.field_name.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn request_bytes_read(&self) -> u64 {
        self.request_bytes_read
    }

    pub(crate) fn part_bytes_read(&self) -> u64 {
        self.part_bytes_read
    }
}
