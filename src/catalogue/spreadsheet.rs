//! Order sheet workbook.
//!
//! Layout (1-based rows): a summary block in B1:C6, headers on row 8, one
//! product per row from row 9. Only the quantity column is editable; totals
//! are live formulas so the sheet recalculates as the client fills it in.

use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatBorder, Workbook, XlsxError,
};

use super::attributes::{carton_volume, name_suffix};
use super::models::{CaseSizeTable, ProductRecord};

pub const SHEET_NAME: &str = "Order Sheet";

/// Zero-based row of the column headers (row 8 in the sheet).
pub const HEADER_ROW: u32 = 7;
/// Zero-based row of the first product (row 9 in the sheet).
pub const FIRST_DATA_ROW: u32 = 8;

pub const HEADERS: [&str; 6] = [
    "Ref No",
    "Category",
    "Product Name + Carton Name",
    "Carton per CBM",
    "Order Quantity (Cartons)",
    "Total CBM",
];
const COLUMN_WIDTHS: [f64; 6] = [8.0, 25.0, 50.0, 15.0, 15.0, 15.0];

const QUANTITY_COL: u16 = 4;
const TOTAL_COL: u16 = 5;

/// Container label and capacity in cubic metres.
pub const CONTAINERS: [(&str, u32); 3] = [
    ("20 FT (30 CBM)", 30),
    ("40 FT (60 CBM)", 60),
    ("40 FT HC (70 CBM)", 70),
];

/// Excel rejects cells longer than this many UTF-16 units.
const MAX_CELL_UNITS: usize = 32_767;

const HEADER_FILL: u32 = 0xD7E4BC;
const INPUT_FILL: u32 = 0xFFFCB7;

/// One product line on the order sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub ref_no: usize,
    pub category: String,
    /// Display name with the carton suffix appended when one is known.
    pub name: String,
    pub carton_volume: f64,
}

/// Order lines in record order; `ref_no` is the 1-based output position.
pub fn order_lines(records: &[ProductRecord], case_sizes: &CaseSizeTable) -> Vec<OrderLine> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let entry = case_sizes.get(&record.category);
            let base = record.display_name.trim();
            let name = match name_suffix(entry) {
                Some(suffix) => format!("{base} {suffix}"),
                None => base.to_string(),
            };
            OrderLine {
                ref_no: position + 1,
                category: record.category.clone(),
                name,
                carton_volume: carton_volume(entry),
            }
        })
        .collect()
}

/// Build the order sheet workbook and return its bytes.
///
/// Output is byte-for-byte reproducible for the same input: the document
/// properties carry a fixed creation date instead of the current time.
pub fn build_order_sheet(
    client_name: &str,
    records: &[ProductRecord],
    case_sizes: &CaseSizeTable,
) -> Result<Vec<u8>, XlsxError> {
    let lines = order_lines(records, case_sizes);

    let mut workbook = Workbook::new();
    let properties = DocProperties::new()
        .set_title(format!("{SHEET_NAME} for {client_name}"))
        .set_creation_datetime(&ExcelDateTime::from_ymd(2024, 1, 1)?);
    workbook.set_properties(&properties);

    let title_format = Format::new().set_bold().set_font_size(14);
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin);
    let bordered = Format::new().set_border(FormatBorder::Thin);
    let volume_format = Format::new().set_num_format("0.000");
    let count_format = Format::new()
        .set_bold()
        .set_num_format("0.00")
        .set_border(FormatBorder::Thin);
    let input_format = Format::new()
        .set_background_color(Color::RGB(INPUT_FILL))
        .set_border(FormatBorder::Thin)
        .set_unlocked();
    let total_format = Format::new()
        .set_border(FormatBorder::Thin)
        .set_num_format("0.000");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    worksheet.protect();
    worksheet.set_freeze_panes(FIRST_DATA_ROW, 0)?;
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    // Summary block.
    let title = format!("Order Sheet for: {client_name}");
    worksheet.write_string_with_format(0, 1, cell_text(&title), &title_format)?;
    worksheet.write_string(1, 1, "Total CBM:")?;
    worksheet.write_formula_with_format(1, 2, total_volume_formula(lines.len()).as_str(), &volume_format)?;
    worksheet.write_string_with_format(2, 1, "CONTAINER TYPE", &header_format)?;
    worksheet.write_string_with_format(2, 2, "ESTIMATED CONTAINERS", &header_format)?;
    for (offset, (label, capacity)) in CONTAINERS.iter().enumerate() {
        let row = 3 + offset as u32;
        worksheet.write_string_with_format(row, 1, *label, &bordered)?;
        worksheet.write_formula_with_format(row, 2, format!("=$C$2/{capacity}").as_str(), &count_format)?;
    }

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(HEADER_ROW, col as u16, *header, &header_format)?;
    }

    for (offset, line) in lines.iter().enumerate() {
        let row = FIRST_DATA_ROW + offset as u32;
        let sheet_row = row + 1;
        worksheet.write_number(row, 0, line.ref_no as f64)?;
        worksheet.write_string(row, 1, cell_text(&line.category))?;
        worksheet.write_string(row, 2, cell_text(&line.name))?;
        worksheet.write_number_with_format(row, 3, line.carton_volume, &volume_format)?;
        worksheet.write_number_with_format(row, QUANTITY_COL, 0.0, &input_format)?;
        worksheet.write_formula_with_format(
            row,
            TOTAL_COL,
            format!("=D{sheet_row}*E{sheet_row}").as_str(),
            &total_format,
        )?;
    }

    workbook.save_to_buffer()
}

/// `text` cut to the longest prefix a cell can hold.
fn cell_text(text: &str) -> &str {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > MAX_CELL_UNITS {
            log::warn!("truncating {} character cell text", text.chars().count());
            return &text[..index];
        }
    }
    text
}

/// `=SUM(F9:F<last data row>)`; an empty sheet still sums row 9.
pub fn total_volume_formula(line_count: usize) -> String {
    let first = FIRST_DATA_ROW + 1;
    let last = first + line_count.saturating_sub(1) as u32;
    format!("=SUM(F{first}:F{last})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::models::CaseSizeEntry;

    #[test]
    fn test_cell_text_caps_at_excel_limit() {
        assert_eq!(cell_text("Rose Stick"), "Rose Stick");
        let long = "a".repeat(40_000);
        assert_eq!(cell_text(&long).len(), MAX_CELL_UNITS);
        // Characters outside the BMP take two units each.
        let wide = "😀".repeat(20_000);
        assert_eq!(cell_text(&wide).chars().count(), MAX_CELL_UNITS / 2);
    }

    #[test]
    fn test_total_volume_formula_bounds() {
        assert_eq!(total_volume_formula(0), "=SUM(F9:F9)");
        assert_eq!(total_volume_formula(1), "=SUM(F9:F9)");
        assert_eq!(total_volume_formula(3), "=SUM(F9:F11)");
    }

    #[test]
    fn test_order_lines_apply_suffix_and_volume() {
        let mut case_sizes = CaseSizeTable::new();
        case_sizes.insert(
            "Masala Sticks".to_string(),
            CaseSizeEntry::new()
                .with("Carton Suffix", "(25 doz)")
                .with("CBM per Ctn", "0.04567"),
        );
        case_sizes.insert(
            "Cones".to_string(),
            CaseSizeEntry::new()
                .with("Carton Suffix", "nan")
                .with("CBM", "abc"),
        );
        let records = vec![
            ProductRecord::new("A", "Masala Sticks", " Rose Stick ", 0),
            ProductRecord::new("A", "Cones", "Sandal Cone", 1),
            ProductRecord::new("A", "Dhoop", "Loban Dhoop", 2),
        ];

        let lines = order_lines(&records, &case_sizes);
        assert_eq!(lines[0].name, "Rose Stick (25 doz)");
        assert_eq!(lines[0].carton_volume, 0.046);
        assert_eq!(lines[1].name, "Sandal Cone");
        assert_eq!(lines[1].carton_volume, 0.0);
        assert_eq!(lines[2].carton_volume, 0.0);
        assert_eq!(
            lines.iter().map(|l| l.ref_no).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_workbook_is_a_zip() {
        let bytes = build_order_sheet("Acme", &[], &CaseSizeTable::new()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
