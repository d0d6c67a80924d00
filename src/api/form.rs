//! Form-encoded request bodies for create calls.

use std::fmt;

/// Ordered `application/x-www-form-urlencoded` fields.
///
/// Fields registered through [`Form::secret`] are masked in `Debug` output so
/// build-for-create forms can be logged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(&'static str, String)>,
    secrets: Vec<&'static str>,
}

impl Form {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    /// Adds the field only when set and non-empty
    #[must_use]
    pub fn opt(self, key: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.field(key, v),
            _ => self,
        }
    }

    #[must_use]
    pub fn number(self, key: &'static str, value: impl Into<u64>) -> Self {
        self.field(key, value.into().to_string())
    }

    #[must_use]
    pub fn opt_number(self, key: &'static str, value: Option<u32>) -> Self {
        match value {
            Some(v) => self.number(key, v),
            None => self,
        }
    }

    /// Booleans go over the wire as `1`/`0`
    #[must_use]
    pub fn flag(self, key: &'static str, value: bool) -> Self {
        self.field(key, if value { "1" } else { "0" })
    }

    #[must_use]
    pub fn secret(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.secrets.push(key);
        self.field(key, value)
    }

    #[must_use]
    pub fn opt_secret(self, key: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.secret(key, v),
            _ => self,
        }
    }

    #[must_use]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.fields {
            if self.secrets.contains(key) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
