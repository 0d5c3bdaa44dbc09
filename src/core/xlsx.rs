use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FIRST_WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Read the first worksheet of an `.xlsx` workbook as a dense table of cell
/// strings. Shared strings, inline strings, formula string results, and
/// boolean cells are resolved; everything else keeps its raw text (dates
/// therefore surface as serial numbers when the sheet stores them that way).
pub fn read_first_worksheet(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let file = std::fs::File::open(path)?;
    read_worksheet(file)
}

pub fn read_worksheet<R: Read + Seek>(reader: R) -> anyhow::Result<Vec<Vec<String>>> {
    let mut archive = zip::ZipArchive::new(reader)?;

    let shared_strings = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = match read_part(&mut archive, FIRST_WORKSHEET_PART)? {
        Some(xml) => xml,
        None => {
            let name = first_worksheet_name(&archive)
                .ok_or_else(|| anyhow::anyhow!("workbook contains no worksheets"))?;
            read_part(&mut archive, &name)?
                .ok_or_else(|| anyhow::anyhow!("failed to read worksheet {name}"))?
        }
    };

    parse_sheet(&sheet_xml, &shared_strings)
}

fn first_worksheet_name<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Option<String> {
    let mut names: Vec<&str> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .collect();
    names.sort_unstable();
    names.first().map(|name| name.to_string())
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn parse_shared_strings(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"si" => strings.push(current.clone()),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    let value = e.xml_content()?.into_owned();
                    current.push_str(&value);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }

        buf.clear();
    }

    Ok(strings)
}

fn parse_sheet(xml: &str, shared_strings: &[String]) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut cell_column = 0usize;
    let mut cell_type = String::new();
    let mut cell_value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    cell_column = current_row.len();
                    cell_type.clear();
                    cell_value.clear();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                let reference = String::from_utf8_lossy(&attr.value);
                                if let Some(column) = column_index(&reference) {
                                    cell_column = column;
                                }
                            }
                            b"t" => {
                                cell_type = String::from_utf8_lossy(&attr.value).into_owned();
                            }
                            _ => {}
                        }
                    }
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"row" => rows.push(std::mem::take(&mut current_row)),
                b"c" => {
                    let value = resolve_cell(&cell_type, &cell_value, shared_strings);
                    while current_row.len() < cell_column {
                        current_row.push(String::new());
                    }
                    current_row.push(value);
                }
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_value {
                    let value = e.xml_content()?.into_owned();
                    cell_value.push_str(&value);
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"row" {
                    rows.push(Vec::new());
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }

        buf.clear();
    }

    Ok(rows)
}

fn resolve_cell(cell_type: &str, raw: &str, shared_strings: &[String]) -> String {
    match cell_type {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx).cloned())
            .unwrap_or_else(|| raw.to_string()),
        "b" => match raw.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// `"B2"` → column 1. Returns `None` when the reference has no letter prefix.
fn column_index(reference: &str) -> Option<usize> {
    let mut acc = 0usize;
    let mut seen = false;

    for ch in reference.chars() {
        if ch.is_ascii_alphabetic() {
            seen = true;
            acc = acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
        } else {
            break;
        }
    }

    seen.then(|| acc - 1)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    fn workbook(shared_strings: Option<&str>, sheet: &str) -> Cursor<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();

            if let Some(xml) = shared_strings {
                writer.start_file(SHARED_STRINGS_PART, options).unwrap();
                writer.write_all(xml.as_bytes()).unwrap();
            }

            writer.start_file(FIRST_WORKSHEET_PART, options).unwrap();
            writer.write_all(sheet.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn reads_shared_and_inline_strings() {
        let shared = r#"<?xml version="1.0"?>
            <sst><si><t>求職者姓名</t></si><si><r><t>陳</t></r><r><t>小明</t></r></si></sst>"#;
        let sheet = r#"<?xml version="1.0"?>
            <worksheet><sheetData>
                <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>分數</t></is></c></row>
                <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>87.5</v></c></row>
            </sheetData></worksheet>"#;

        let rows = read_worksheet(workbook(Some(shared), sheet)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["求職者姓名", "分數"]);
        assert_eq!(rows[1], vec!["陳小明", "87.5"]);
    }

    #[test]
    fn pads_sparse_rows_by_cell_reference() {
        let sheet = r#"<?xml version="1.0"?>
            <worksheet><sheetData>
                <row r="1"><c r="A1"><v>a</v></c><c r="C1"><v>c</v></c></row>
                <row r="2"><c r="B2" t="b"><v>1</v></c></row>
            </sheetData></worksheet>"#;

        let rows = read_worksheet(workbook(None, sheet)).unwrap();
        assert_eq!(rows[0], vec!["a", "", "c"]);
        assert_eq!(rows[1], vec!["", "TRUE"]);
    }

    #[test]
    fn column_index_decodes_multi_letter_references() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("D4"), Some(3));
        assert_eq!(column_index("Z10"), Some(25));
        assert_eq!(column_index("AA2"), Some(26));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn missing_worksheet_is_an_error() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("xl/other.xml", options).unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        cursor.set_position(0);

        assert!(read_worksheet(cursor).is_err());
    }
}
