use std::io::{Cursor, Read};

use catalogue_export_server::catalogue::spreadsheet::build_order_sheet;
use catalogue_export_server::catalogue::{CaseSizeEntry, CaseSizeTable, ProductRecord};
use zip::ZipArchive;

fn read_part(workbook: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).expect("workbook is a zip archive");
    let mut part = archive.by_name(name).expect("part present");
    let mut xml = String::new();
    part.read_to_string(&mut xml).expect("part is utf-8");
    xml
}

/// Text of the `<v>` element of cell `reference`, if the cell exists.
fn cell_value<'a>(sheet: &'a str, reference: &str) -> Option<&'a str> {
    let start = sheet.find(&format!("<c r=\"{reference}\""))?;
    let rest = &sheet[start..];
    let cell_end = rest.find("</c>")?;
    let cell = &rest[..cell_end];
    let value_start = cell.find("<v>")? + 3;
    let value_end = cell.find("</v>")?;
    Some(&cell[value_start..value_end])
}

fn sample() -> (Vec<ProductRecord>, CaseSizeTable) {
    let mut case_sizes = CaseSizeTable::new();
    case_sizes.insert(
        "Masala Sticks".to_string(),
        CaseSizeEntry::new()
            .with("Carton Suffix", "(25 doz)")
            .with("CBM per Ctn", "0.0452"),
    );
    case_sizes.insert(
        "Dhoop".to_string(),
        CaseSizeEntry::new()
            .with("Carton Suffix", "nan")
            .with("CBM", "abc"),
    );
    let records = vec![
        ProductRecord::new("HEM", "Masala Sticks", "Rose Stick", 0),
        ProductRecord::new("HEM", "Masala Sticks", "Jasmine Stick", 1),
        ProductRecord::new("HEM", "Dhoop", "Loban Dhoop", 2),
    ];
    (records, case_sizes)
}

#[test]
fn test_rows_carry_live_formulas() {
    let (records, case_sizes) = sample();
    let workbook = build_order_sheet("Acme", &records, &case_sizes).unwrap();
    let sheet = read_part(&workbook, "xl/worksheets/sheet1.xml");

    assert!(sheet.contains("<f>D9*E9</f>"));
    assert!(sheet.contains("<f>D10*E10</f>"));
    assert!(sheet.contains("<f>D11*E11</f>"));
    assert!(sheet.contains("<f>SUM(F9:F11)</f>"));
    assert!(sheet.contains("<f>$C$2/30</f>"));
    assert!(sheet.contains("<f>$C$2/60</f>"));
    assert!(sheet.contains("<f>$C$2/70</f>"));
}

#[test]
fn test_reference_numbers_and_volumes() {
    let (records, case_sizes) = sample();
    let workbook = build_order_sheet("Acme", &records, &case_sizes).unwrap();
    let sheet = read_part(&workbook, "xl/worksheets/sheet1.xml");

    assert_eq!(cell_value(&sheet, "A9"), Some("1"));
    assert_eq!(cell_value(&sheet, "A10"), Some("2"));
    assert_eq!(cell_value(&sheet, "A11"), Some("3"));
    assert_eq!(cell_value(&sheet, "D9"), Some("0.045"));
    // Unparseable volume becomes zero.
    assert_eq!(cell_value(&sheet, "D11"), Some("0"));
    assert_eq!(cell_value(&sheet, "E9"), Some("0"));
    assert!(cell_value(&sheet, "A12").is_none());
}

#[test]
fn test_sheet_is_protected_and_frozen() {
    let (records, case_sizes) = sample();
    let workbook = build_order_sheet("Acme", &records, &case_sizes).unwrap();
    let sheet = read_part(&workbook, "xl/worksheets/sheet1.xml");
    let styles = read_part(&workbook, "xl/styles.xml");

    assert!(sheet.contains("<sheetProtection"));
    assert!(sheet.contains("state=\"frozen\""));
    assert!(sheet.contains("topLeftCell=\"A9\""));
    // The quantity input format is the only unlocked one.
    assert!(styles.contains("locked=\"0\""));
}

#[test]
fn test_names_get_carton_suffix() {
    let (records, case_sizes) = sample();
    let workbook = build_order_sheet("Acme", &records, &case_sizes).unwrap();
    let strings = read_part(&workbook, "xl/sharedStrings.xml");

    assert!(strings.contains("Order Sheet for: Acme"));
    assert!(strings.contains("Rose Stick (25 doz)"));
    assert!(strings.contains("Jasmine Stick (25 doz)"));
    assert!(strings.contains(">Loban Dhoop<"));
    assert!(!strings.contains("nan<"));
    assert!(strings.contains("Product Name + Carton Name"));
    assert!(strings.contains("40 FT HC (70 CBM)"));
}

#[test]
fn test_empty_order_sheet_keeps_layout() {
    let workbook = build_order_sheet("Acme", &[], &CaseSizeTable::new()).unwrap();
    let sheet = read_part(&workbook, "xl/worksheets/sheet1.xml");
    let strings = read_part(&workbook, "xl/sharedStrings.xml");

    assert!(sheet.contains("<f>SUM(F9:F9)</f>"));
    assert!(strings.contains("Ref No"));
    assert!(strings.contains("Total CBM"));
    assert!(cell_value(&sheet, "A9").is_none());
}

#[test]
fn test_sheet_name() {
    let workbook = build_order_sheet("Acme", &[], &CaseSizeTable::new()).unwrap();
    let book = read_part(&workbook, "xl/workbook.xml");
    assert!(book.contains("name=\"Order Sheet\""));
}

#[test]
fn test_oversized_text_is_capped_to_cell_limit() {
    let records = vec![ProductRecord::new("HEM", "Masala Sticks", "x".repeat(40_000), 0)];
    let client = "c".repeat(40_000);

    let workbook = build_order_sheet(&client, &records, &CaseSizeTable::new()).unwrap();
    let strings = read_part(&workbook, "xl/sharedStrings.xml");

    assert!(strings.contains(&"x".repeat(32_767)));
    assert!(!strings.contains(&"x".repeat(32_768)));
    assert!(!strings.contains(&"c".repeat(32_768)));
}
