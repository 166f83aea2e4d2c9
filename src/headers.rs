/// The header lines of a single part.
///
/// Names are matched case-insensitively. Distinct names keep the order in
/// which they first appeared, and a repeated name collects its values in
/// the order they were received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<HeaderEntry>,
    lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    key: String,
    name: String,
    values: Vec<String>,
}

impl PartHeaders {
    /// Creates an empty header container.
    pub fn new() -> PartHeaders {
        PartHeaders::default()
    }

    /// Appends a value for `name`, keeping any earlier values.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.lines += 1;

        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.values.push(value.into()),
            None => self.entries.push(HeaderEntry {
                key,
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// Returns the first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name)
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// Returns every value of `name` in append order.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entry(name)
            .into_iter()
            .flat_map(|entry| entry.values.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Iterates over `(name, value)` pairs. Names are reported with the
    /// spelling of their first occurrence.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|entry| entry.values.iter().map(move |value| (entry.name.as_str(), value.as_str())))
    }

    /// Iterates over the distinct header names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of header lines appended, counting every repeated value.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|entry| entry.key.eq_ignore_ascii_case(name))
    }
}
