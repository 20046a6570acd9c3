//! Builds small single-sheet workbooks for the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use zip::write::FileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Empty,
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn num(value: f64) -> Value {
    Value::Number(value)
}

pub fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

// Style 1 is the built-in short date format.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#;

fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn excel_serial(value: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("epoch");
    (value - epoch).num_days()
}

fn sheet_xml(rows: &[Vec<Value>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(c), r + 1);
            match value {
                Value::Text(text) => xml.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(text)
                )),
                Value::Number(number) => {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{number}</v></c>"#))
                }
                Value::Date(day) => xml.push_str(&format!(
                    r#"<c r="{reference}" s="1"><v>{}</v></c>"#,
                    excel_serial(*day)
                )),
                Value::Empty => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Serializes `rows` (header first) as an xlsx workbook with one sheet.
pub fn workbook(rows: &[Vec<Value>]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(rows)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).expect("start part");
        zip.write_all(body.as_bytes()).expect("write part");
    }
    zip.finish().expect("finish workbook").into_inner()
}

pub fn customers() -> Vec<Vec<Value>> {
    vec![
        vec![text("CustomerID"), text("Name"), text("SignupDate")],
        vec![num(1.0), text("Ada"), date(2023, 1, 5)],
        vec![num(2.0), text("Grace"), date(2023, 2, 11)],
        vec![num(3.0), text("Linus"), date(2023, 3, 1)],
    ]
}

pub fn products() -> Vec<Vec<Value>> {
    vec![
        vec![text("ProductID"), text("Name"), text("Price")],
        vec![num(10.0), text("Widget"), num(2.5)],
        vec![num(11.0), text("Gadget"), num(4.0)],
    ]
}

pub fn orders() -> Vec<Vec<Value>> {
    vec![
        vec![text("OrderID"), text("CustomerID"), text("OrderDate"), text("ShipDate")],
        vec![num(100.0), num(1.0), date(2024, 3, 7), date(2024, 3, 9)],
        vec![num(101.0), num(2.0), date(2024, 3, 8), date(2024, 3, 9)],
        vec![num(102.0), num(1.0), date(2024, 3, 7), date(2024, 3, 10)],
        vec![num(103.0), num(3.0), date(2024, 3, 11), Value::Empty],
    ]
}

pub fn order_details() -> Vec<Vec<Value>> {
    vec![
        vec![text("OrderID"), text("ProductID"), text("Quantity"), text("Discount")],
        vec![num(100.0), num(10.0), num(2.0), num(0.1)],
        vec![num(100.0), num(11.0), num(1.0), num(0.0)],
        vec![num(101.0), num(10.0), num(5.0), num(0.2)],
        vec![num(102.0), num(11.0), num(3.0), num(0.3)],
        vec![num(999.0), num(10.0), num(1.0), num(0.0)],
    ]
}
