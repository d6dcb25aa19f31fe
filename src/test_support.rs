//! Fixture builders shared by the unit tests.

use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Cell {
    S(&'static str),
    N(f64),
    B(bool),
    Blank,
}

/// Builds an .xlsx whose first sheet holds `rows` starting at A1.
pub(crate) fn xlsx(rows: &[Vec<Cell>]) -> Vec<u8> {
    xlsx_with_sheets(&[("Sheet1", rows)])
}

pub(crate) fn xlsx_with_sheets(sheets: &[(&str, &[Vec<Cell>])]) -> Vec<u8> {
    let mut workbook = Workbook::new();

    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();

        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match *cell {
                    Cell::S(s) => {
                        worksheet.write_string(r, c, s).unwrap();
                    }
                    Cell::N(n) => {
                        worksheet.write_number(r, c, n).unwrap();
                    }
                    Cell::B(b) => {
                        worksheet.write_boolean(r, c, b).unwrap();
                    }
                    Cell::Blank => {}
                }
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// A structurally valid .xlsx package that declares no sheets.
pub(crate) fn xlsx_without_sheets() -> Vec<u8> {
    zip_archive(&[
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#
                .to_vec(),
        ),
        (
            "_rels/.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                .to_vec(),
        ),
        (
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets/></workbook>"#
                .to_vec(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
                .to_vec(),
        ),
    ])
}

pub(crate) fn zip_archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, bytes) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// Header row followed by data rows, all as text cells. Empty strings
/// leave the cell blank.
pub(crate) fn text_sheet(header: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (r, row) in std::iter::once(header).chain(rows.iter().copied()).enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}
