use crate::size_limit::SizeLimit;

/// Represents some rules to be applied on the stream and field's content
/// size to prevent DoS attacks.
///
/// # Examples
///
/// ```
/// use partstream::{Constraints, MultipartParser, SizeLimit};
///
/// let constraints = Constraints::new()
///     .allowed_fields(vec!["my_text_field", "my_file_field"])
///     .size_limit(
///         SizeLimit::new()
///             // Set 15mb as size limit for the whole stream body.
///             .whole_stream(15 * 1024 * 1024)
///             // Set 10mb as size limit for all fields.
///             .per_field(10 * 1024 * 1024)
///             // Set 30kb as size limit for a specific field only.
///             .for_field("my_text_field", 30 * 1024),
///     );
///
/// let parser = MultipartParser::with_constraints("X-BOUNDARY", constraints).unwrap();
/// # drop(parser);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub(crate) size_limit: SizeLimit,
    pub(crate) allowed_fields: Option<Vec<String>>,
}

impl Constraints {
    /// Creates a set of rules with default behaviour: no limits and every
    /// field name allowed.
    pub fn new() -> Constraints {
        Constraints::default()
    }

    /// Applies rules on the stream and field's content size.
    pub fn size_limit(self, size_limit: SizeLimit) -> Constraints {
        Constraints { size_limit, ..self }
    }

    /// Accepts only the given field names; any other part raises
    /// [`Error::UnknownField`](crate::Error::UnknownField).
    pub fn allowed_fields<N: Into<String>>(self, allowed_fields: Vec<N>) -> Constraints {
        let allowed_fields = allowed_fields.into_iter().map(|item| item.into()).collect();

        Constraints {
            allowed_fields: Some(allowed_fields),
            ..self
        }
    }

    pub(crate) fn is_it_allowed(&self, field: Option<&str>) -> bool {
        match self.allowed_fields {
            Some(ref allowed_fields) => field
                .map(|field| allowed_fields.iter().any(|item| item == field))
                .unwrap_or(false),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_fields() {
        let constraints = Constraints::new().allowed_fields(vec!["a", "b"]);
        assert!(constraints.is_it_allowed(Some("a")));
        assert!(!constraints.is_it_allowed(Some("c")));
        assert!(!constraints.is_it_allowed(None));

        assert!(Constraints::new().is_it_allowed(None));
    }
}
