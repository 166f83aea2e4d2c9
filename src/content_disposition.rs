use crate::constants;
use crate::headers::PartHeaders;

/// The `name` and `filename` parameters of a part's `Content-Disposition`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ContentDisposition {
    pub(crate) field_name: Option<String>,
    pub(crate) file_name: Option<String>,
}

impl ContentDisposition {
    pub(crate) fn parse(headers: &PartHeaders) -> crate::Result<ContentDisposition> {
        let value = match headers.get(constants::CONTENT_DISPOSITION) {
            Some(value) => value,
            None => return Ok(ContentDisposition::default()),
        };

        let mut disposition = ContentDisposition::default();

        for (key, val) in Params::new(value) {
            if key.eq_ignore_ascii_case("name") && disposition.field_name.is_none() {
                disposition.field_name = Some(val);
            } else if key.eq_ignore_ascii_case("filename") && disposition.file_name.is_none() {
                if val.contains('\0') {
                    return Err(crate::Error::InvalidFileName);
                }
                disposition.file_name = Some(val);
            }
        }

        Ok(disposition)
    }
}

/// Iterates over the `key=value` parameters following the disposition type.
struct Params<'a> {
    rest: &'a str,
}

impl<'a> Params<'a> {
    fn new(value: &'a str) -> Params<'a> {
        // Skip the disposition type itself.
        let rest = match value.find(';') {
            Some(idx) => &value[idx + 1..],
            None => "",
        };
        Params { rest }
    }
}

impl<'a> Iterator for Params<'a> {
    type Item = (&'a str, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.rest.trim_start_matches(|c| c == ' ' || c == '\t' || c == ';');
            if rest.is_empty() {
                self.rest = rest;
                return None;
            }

            let eq = match rest.find('=') {
                Some(eq) => eq,
                None => {
                    self.rest = "";
                    return None;
                }
            };
            let key = rest[..eq].trim();
            let after = rest[eq + 1..].trim_start();

            let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
                unquote(quoted)
            } else {
                let end = after.find(';').unwrap_or(after.len());
                (after[..end].trim_end().to_owned(), &after[end..])
            };
            self.rest = remaining;

            if key.is_empty() {
                continue;
            }
            return Some((key, value));
        }
    }
}

/// Reads a quoted-string body, honouring backslash escapes. Returns the value
/// and the input following the closing quote.
fn unquote(input: &str) -> (String, &str) {
    let mut value = String::new();
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return (value, &input[idx + 1..]);
        } else {
            value.push(c);
        }
    }

    (value, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disposition(value: &str) -> crate::Result<ContentDisposition> {
        let mut headers = PartHeaders::new();
        headers.append("Content-Disposition", value);
        ContentDisposition::parse(&headers)
    }

    #[test]
    fn test_field_name() {
        let cd = disposition(r#"form-data; name="my_field""#).unwrap();
        assert_eq!(cd.field_name.as_deref(), Some("my_field"));
        assert_eq!(cd.file_name, None);

        let cd = disposition(r#"form-data; name="my field"; filename="file abc.txt""#).unwrap();
        assert_eq!(cd.field_name.as_deref(), Some("my field"));
        assert_eq!(cd.file_name.as_deref(), Some("file abc.txt"));

        let cd = disposition("form-data; name=\"কখগ\"; filename=\"你好.txt\"").unwrap();
        assert_eq!(cd.field_name.as_deref(), Some("কখগ"));
        assert_eq!(cd.file_name.as_deref(), Some("你好.txt"));
    }

    #[test]
    fn test_unquoted_and_escaped() {
        let cd = disposition("form-data; NAME=token; filename=\"a\\\"b;c.txt\"").unwrap();
        assert_eq!(cd.field_name.as_deref(), Some("token"));
        assert_eq!(cd.file_name.as_deref(), Some("a\"b;c.txt"));
    }

    #[test]
    fn test_missing_header() {
        let cd = ContentDisposition::parse(&PartHeaders::new()).unwrap();
        assert_eq!(cd, ContentDisposition::default());
    }

    #[test]
    fn test_nul_in_file_name() {
        let err = disposition("form-data; name=\"f\"; filename=\"a\0b.txt\"").unwrap_err();
        assert_eq!(err, crate::Error::InvalidFileName);
    }
}
