use crate::workbook::{Row, Scalar};
use std::collections::HashSet;
use std::fmt::Write;

/// Canonical form of a row's content. Two rows share a key exactly when
/// they have the same keys in the same order with equal values of the
/// same type.
pub fn content_key(row: &Row) -> String {
    let mut key = String::new();
    for (name, value) in row.iter() {
        // Length prefixes keep "ab"+"c" distinct from "a"+"bc".
        let _ = write!(key, "{}:{}", name.len(), name);
        match value {
            Scalar::Empty => key.push('E'),
            Scalar::Text(s) => {
                let _ = write!(key, "T{}:{}", s.len(), s);
            }
            Scalar::Number(n) => {
                // -0.0 and 0.0 compare equal
                let bits = if *n == 0.0 { 0 } else { n.to_bits() };
                let _ = write!(key, "N{:016x}", bits);
            }
            Scalar::Bool(b) => key.push(if *b { 'B' } else { 'b' }),
        }
        key.push(';');
    }
    key
}

/// Keeps the first occurrence of every distinct row.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a given row content is offered.
    pub fn admit(&mut self, row: &Row) -> bool {
        self.seen.insert(content_key(row))
    }

    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}

/// Removes repeated rows, preserving the order of first occurrences.
pub fn dedup(rows: Vec<Row>) -> Vec<Row> {
    let mut deduplicator = Deduplicator::new();
    rows.into_iter().filter(|row| deduplicator.admit(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Scalar)]) -> Row {
        cells.iter().cloned().collect()
    }

    #[test]
    fn test_keeps_first_occurrence() {
        let a = row(&[("Name", Scalar::text("Ann")), ("Email", Scalar::text("a@x"))]);
        let b = row(&[("Name", Scalar::text("Bob")), ("Email", Scalar::text("b@x"))]);

        let result = dedup(vec![a.clone(), b.clone(), a.clone(), b.clone(), a.clone()]);
        assert_eq!(result, vec![a, b]);
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let rows = vec![
            row(&[("Id", Scalar::Number(1.0)), ("Ok", Scalar::Bool(true))]),
            row(&[("Id", Scalar::text("1")), ("Ok", Scalar::Bool(true))]),
            row(&[("Id", Scalar::Number(1.0)), ("Ok", Scalar::Bool(true))]),
            row(&[("Id", Scalar::Empty), ("Ok", Scalar::Bool(false))]),
            row(&[("Id", Scalar::Number(-0.0)), ("Ok", Scalar::Empty)]),
            row(&[("Id", Scalar::Number(0.0)), ("Ok", Scalar::Empty)]),
            row(&[("Id", Scalar::Empty), ("Ok", Scalar::Bool(false))]),
        ];

        let once = dedup(rows);
        assert_eq!(once.len(), 4);
        assert_eq!(dedup(once.clone()), once);
    }

    #[test]
    fn test_types_are_not_coerced() {
        let number = row(&[("Id", Scalar::Number(7.0))]);
        let text = row(&[("Id", Scalar::text("7"))]);
        let truthy = row(&[("Id", Scalar::Bool(true))]);
        let word = row(&[("Id", Scalar::text("true"))]);

        assert_eq!(dedup(vec![number, text, truthy, word]).len(), 4);
    }

    #[test]
    fn test_empty_differs_from_text() {
        let empty = row(&[("A", Scalar::Empty)]);
        let letter = row(&[("A", Scalar::text("E"))]);
        assert_eq!(dedup(vec![empty, letter]).len(), 2);
    }

    #[test]
    fn test_key_boundaries_are_unambiguous() {
        let left = row(&[("ab", Scalar::text("c"))]);
        let right = row(&[("a", Scalar::text("bc"))]);
        assert_ne!(content_key(&left), content_key(&right));

        let left = row(&[("a", Scalar::text("x;1:b")), ("c", Scalar::Empty)]);
        let right = row(&[("a", Scalar::text("x")), ("b", Scalar::Empty)]);
        assert_ne!(content_key(&left), content_key(&right));
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let pos = row(&[("n", Scalar::Number(0.0))]);
        let neg = row(&[("n", Scalar::Number(-0.0))]);
        assert_eq!(dedup(vec![pos, neg]).len(), 1);
    }

    #[test]
    fn test_deduplicator_counts_distinct() {
        let mut dedup = Deduplicator::new();
        let r = row(&[("a", Scalar::text("1"))]);
        assert!(dedup.admit(&r));
        assert!(!dedup.admit(&r));
        assert_eq!(dedup.distinct(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup(Vec::new()).is_empty());
    }
}
