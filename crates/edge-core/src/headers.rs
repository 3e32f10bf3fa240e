//! Immutable header collection.

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Error raised when a header name or value is not valid HTTP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid header {name:?}: {reason}")]
pub struct InvalidHeader {
    /// The offending header name.
    pub name: String,
    /// Why it was rejected.
    pub reason: String,
}

/// A case-insensitive multimap of HTTP headers with value semantics.
///
/// Every transformation consumes the set and returns a new one, so a set
/// handed to another component can never be changed behind its back.
/// Lookups accept any casing (`Cache-Control` and `cache-control` are the
/// same header).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    map: HeaderMap,
}

impl HeaderSet {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header set from name/value pairs, keeping repeated names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, InvalidHeader>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let (name, value) = parse_pair(name.as_ref(), value.as_ref())?;
            map.append(name, value);
        }
        Ok(Self { map })
    }

    /// Get the first value of a header as text.
    ///
    /// Values are read as UTF-8, so non-ASCII text such as `city=Kraków`
    /// is returned as-is.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }

    /// Get every value of a header as text.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.map
            .get_all(name)
            .iter()
            .filter_map(|v| std::str::from_utf8(v.as_bytes()).ok())
            .collect()
    }

    /// Every value of a header joined with `separator`.
    ///
    /// Bytes that are not UTF-8 are replaced rather than dropped. Returns
    /// `None` when the header is absent.
    pub fn joined(&self, name: &str, separator: &str) -> Option<String> {
        let values: Vec<String> = self
            .map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(separator))
        }
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Replace a header with a single value.
    pub fn try_with(mut self, name: &str, value: &str) -> Result<Self, InvalidHeader> {
        let (name, value) = parse_pair(name, value)?;
        self.map.insert(name, value);
        Ok(self)
    }

    /// Replace a header with a single value.
    ///
    /// Invalid names or values leave the set unchanged; use [`try_with`]
    /// when the input is not known to be well formed.
    ///
    /// [`try_with`]: HeaderSet::try_with
    pub fn with(mut self, name: &str, value: &str) -> Self {
        if let Ok((name, value)) = parse_pair(name, value) {
            self.map.insert(name, value);
        }
        self
    }

    /// Add a value without removing existing values of the same header.
    pub fn appended(mut self, name: &str, value: &str) -> Self {
        if let Ok((name, value)) = parse_pair(name, value) {
            self.map.append(name, value);
        }
        self
    }

    /// Remove every value of a header.
    pub fn without(mut self, name: &str) -> Self {
        self.map.remove(name);
        self
    }

    /// Move every value of `from` to `to`, replacing anything already under `to`.
    ///
    /// Does nothing when `from` is absent.
    pub fn with_renamed(mut self, from: &str, to: &str) -> Self {
        let Ok(target) = HeaderName::from_bytes(to.as_bytes()) else {
            return self;
        };
        let values: Vec<HeaderValue> = self.map.get_all(from).iter().cloned().collect();
        if values.is_empty() {
            return self;
        }
        self.map.remove(from);
        self.map.remove(&target);
        for value in values {
            self.map.append(target.clone(), value);
        }
        self
    }

    /// All headers as owned pairs, in storage order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.map
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    /// Number of header values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the set holds no headers.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl From<HeaderMap> for HeaderSet {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

impl From<HeaderSet> for HeaderMap {
    fn from(set: HeaderSet) -> Self {
        set.map
    }
}

fn parse_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), InvalidHeader> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((header_name, header_value))
}
