use crate::workbook::Row;
use std::collections::HashMap;

/// Column names in the order they were first seen. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `name` was not present before.
    pub fn add(&mut self, name: &str) -> bool {
        if self.positions.contains_key(name) {
            return false;
        }
        self.positions.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        true
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Header {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut header = Header::new();
        for name in iter {
            header.add(name.as_ref());
        }
        header
    }
}

/// Builds the run-wide header from accepted rows as they arrive.
#[derive(Debug, Default)]
pub struct SchemaUnifier {
    header: Header,
}

impl SchemaUnifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many new columns the row introduced.
    pub fn observe(&mut self, row: &Row) -> usize {
        row.keys().filter(|key| self.header.add(key)).count()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn into_header(self) -> Header {
        self.header
    }
}
