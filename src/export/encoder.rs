use crate::error::{MergeError, Result};
use crate::merge::{normalize, MergedDataset};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io;

pub const DEFAULT_DELIMITER: u8 = b',';

/// Serializes a merged dataset as delimited text, header line first.
#[derive(Debug, Clone, Copy)]
pub struct TabularEncoder {
    delimiter: u8,
}

impl TabularEncoder {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Fails for anything that is not a single ASCII byte, or for the quote
    /// and line-break characters.
    pub fn with_delimiter(delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\r' | '\n') {
            return Err(MergeError::Config {
                message: format!("Unsupported delimiter {:?}", delimiter),
            });
        }

        Ok(Self {
            delimiter: delimiter as u8,
        })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter as char
    }

    pub fn encode(&self, dataset: &MergedDataset) -> Result<String> {
        if dataset.header.is_empty() {
            return Ok(String::new());
        }

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(dataset.header.iter())?;
        for row in &dataset.rows {
            // Assembled rows already follow the header; anything else is
            // projected first.
            if row.keys().eq(dataset.header.iter()) {
                writer.write_record(row.values().map(ToString::to_string))?;
            } else {
                let projected = normalize(&dataset.header, row);
                writer.write_record(projected.values().map(ToString::to_string))?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| MergeError::Io(e.into_error()))?;

        String::from_utf8(bytes)
            .map_err(|e| MergeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl Default for TabularEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Header;
    use crate::workbook::{Row, Scalar};
    use csv::ReaderBuilder;

    fn dataset(names: &[&str], rows: Vec<Vec<Scalar>>) -> MergedDataset {
        let header: Header = names.iter().collect();
        let rows = rows
            .into_iter()
            .map(|values| names.iter().copied().zip(values).collect::<Row>())
            .collect();
        MergedDataset { header, rows }
    }

    #[test]
    fn test_header_then_rows() {
        let data = dataset(
            &["Name", "Email"],
            vec![
                vec![Scalar::text("Ann"), Scalar::text("ann@example.com")],
                vec![Scalar::text("Bob"), Scalar::Empty],
            ],
        );

        let text = TabularEncoder::new().encode(&data).unwrap();
        assert_eq!(text, "Name,Email\nAnn,ann@example.com\nBob,\n");
    }

    #[test]
    fn test_rows_out_of_header_order_are_projected() {
        let header: Header = ["A", "B", "C"].iter().collect();
        let rows = vec![
            [("C", Scalar::text("3")), ("A", Scalar::text("1"))]
                .into_iter()
                .collect::<Row>(),
            [("A", Scalar::text("x")), ("B", Scalar::text("y")), ("C", Scalar::text("z"))]
                .into_iter()
                .collect::<Row>(),
        ];

        let text = TabularEncoder::new()
            .encode(&MergedDataset { header, rows })
            .unwrap();
        assert_eq!(text, "A,B,C\n1,,3\nx,y,z\n");
    }

    #[test]
    fn test_scalars_use_their_text_form() {
        let data = dataset(
            &["Id", "Score", "Active"],
            vec![vec![Scalar::Number(1.0), Scalar::Number(2.5), Scalar::Bool(false)]],
        );

        let text = TabularEncoder::new().encode(&data).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,2.5,false"));
    }

    #[test]
    fn test_quoting() {
        let data = dataset(
            &["A", "B", "C"],
            vec![vec![
                Scalar::text("x,y"),
                Scalar::text("say \"hi\""),
                Scalar::text("two\nlines"),
            ]],
        );

        let text = TabularEncoder::new().encode(&data).unwrap();
        assert_eq!(text, "A,B,C\n\"x,y\",\"say \"\"hi\"\"\",\"two\nlines\"\n");
    }

    #[test]
    fn test_custom_delimiter() {
        let data = dataset(
            &["A", "B"],
            vec![vec![Scalar::text("1;2"), Scalar::text("3,4")]],
        );

        let text = TabularEncoder::with_delimiter(';').unwrap().encode(&data).unwrap();
        assert_eq!(text, "A;B\n\"1;2\";3,4\n");
    }

    #[test]
    fn test_rejects_bad_delimiter() {
        assert!(TabularEncoder::with_delimiter('"').is_err());
        assert!(TabularEncoder::with_delimiter('\n').is_err());
        assert!(TabularEncoder::with_delimiter('é').is_err());
        assert_eq!(TabularEncoder::with_delimiter('\t').unwrap().delimiter(), '\t');
    }

    #[test]
    fn test_output_reads_back() {
        let data = dataset(
            &["Name", "Note"],
            vec![
                vec![Scalar::text("Ann"), Scalar::text("a, \"b\"\r\nc")],
                vec![Scalar::text("Bob"), Scalar::Number(3.0)],
            ],
        );

        let text = TabularEncoder::new().encode(&data).unwrap();
        let mut reader = ReaderBuilder::new().from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Name", "Note"]);

        let records: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        assert_eq!(
            records,
            vec![
                vec!["Ann".to_string(), "a, \"b\"\r\nc".to_string()],
                vec!["Bob".to_string(), "3".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_header_encodes_nothing() {
        let text = TabularEncoder::new().encode(&MergedDataset::default()).unwrap();
        assert!(text.is_empty());
    }
}
