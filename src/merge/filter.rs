use crate::config::RowConfig;
use crate::workbook::Row;

/// Exclusion policy applied to every parsed row, one row at a time.
pub trait RowFilter: Send + Sync {
    fn is_acceptable(&self, row: &Row) -> bool;
}

impl<F> RowFilter for F
where
    F: Fn(&Row) -> bool + Send + Sync,
{
    fn is_acceptable(&self, row: &Row) -> bool {
        self(row)
    }
}

/// Rejects a row when any value's text contains one of the needles.
#[derive(Debug, Clone)]
pub struct SubstringExclusion {
    needles: Vec<String>,
}

impl SubstringExclusion {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(Into::into)
                .filter(|n: &String| !n.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &RowConfig) -> Self {
        Self::new(config.exclude_substrings.iter().cloned())
    }

    pub fn needles(&self) -> &[String] {
        &self.needles
    }
}

impl Default for SubstringExclusion {
    fn default() -> Self {
        Self::new(["http://", "https://"])
    }
}

impl RowFilter for SubstringExclusion {
    fn is_acceptable(&self, row: &Row) -> bool {
        if self.needles.is_empty() {
            return true;
        }

        !row.values().any(|value| {
            let text = value.to_string();
            self.needles.iter().any(|needle| text.contains(needle.as_str()))
        })
    }
}
