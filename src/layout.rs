//! The invoice template, laid out on A4-like pages in millimeters from the top-left corner.
//!
//! Almost every region sits at a fixed coordinate. The line-item table is the only part
//! whose height depends on the content, so the totals and the notes are positioned from
//! the point where the table ends.

use crate::configuration::{to_unit_color, TemplateConfiguration};
use crate::currency::format_money;
use crate::error::ContextError;
use crate::fonts::{points_to_millimeters, FontSet, FontWeight};
use crate::invoice::InvoiceRecord;

const TITLE: &str = "INVOICE";
const TITLE_FONT_SIZE: f32 = 24.0;
const TITLE_Y: f32 = 20.0;
/// Right-aligned text ends this far from the right edge of the page.
const RIGHT_EDGE_INSET: f32 = 20.0;

const LOGO_ORIGIN: [f32; 2] = [15.0, 15.0];
const LOGO_SIZE: [f32; 2] = [50.0, 30.0];

const LABEL_FONT_SIZE: f32 = 10.0;
const VALUE_FONT_SIZE: f32 = 12.0;

const METADATA_LABEL_X: f32 = 150.0;
const INVOICE_NUMBER_ROW_Y: f32 = 40.0;
const DATE_ROW_Y: f32 = 50.0;
const DUE_DATE_ROW_Y: f32 = 70.0;
const PO_NUMBER_ROW_Y: f32 = 80.0;
const METADATA_ROW_STEP: f32 = 10.0;

const PARTY_X: f32 = 15.0;
const SENDER_LABEL_Y: f32 = 70.0;
const SENDER_FIRST_LINE_Y: f32 = 80.0;
const RECIPIENT_LABEL_Y: f32 = 110.0;
const RECIPIENT_FIRST_LINE_Y: f32 = 120.0;
const ADDRESS_LINE_HEIGHT: f32 = 6.0;

const TABLE_HEADERS: [&str; 4] = ["Item", "Quantity", "Rate", "Amount"];
const EMPTY_DESCRIPTION: &str = "Item";

/// Gap between the end of the table and the reference line of the block below it.
const TABLE_END_GAP: f32 = 10.0;
const SUBTOTAL_OFFSET: f32 = 10.0;
const TOTAL_OFFSET: f32 = 25.0;
const TOTAL_FONT_SIZE: f32 = 14.0;
const TOTALS_LABEL_X: f32 = 140.0;
const NOTES_OFFSET: f32 = 40.0;
const NOTES_BODY_OFFSET: f32 = 10.0;
const NOTES_X: f32 = 15.0;
const TERMS_X: f32 = 140.0;

/// Line height of multi-line text, as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.15;
/// Where the baseline sits within a line, as a fraction of the line height.
const BASELINE_RATIO: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Right,
}

/// A single drawing instruction. Coordinates are millimeters from the top-left corner of
/// the page; text positions are the left end of the baseline.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOperation {
    Text {
        page: usize,
        text: String,
        position: [f32; 2],
        font_weight: FontWeight,
        font_size: f32,
        color: [f32; 3],
    },
    Rectangle {
        page: usize,
        origin: [f32; 2],
        size: [f32; 2],
        fill_color: Option<[f32; 3]>,
        stroke: Option<Stroke>,
    },
    /// The box the logo is stretched over.
    Logo {
        page: usize,
        origin: [f32; 2],
        size: [f32; 2],
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: [f32; 3],
    pub width: f32,
}

/// The laid out invoice, ready to be painted.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceLayout {
    pub page_count: usize,
    pub operations: Vec<DrawOperation>,
    /// The page the line-item table ends on.
    pub table_end_page: usize,
    /// The vertical coordinate right below the last row of the table.
    pub table_end_y: f32,
}

impl InvoiceLayout {
    /// The text operations, in drawing order, as `(page, text, position)`.
    pub fn texts(&self) -> impl Iterator<Item = (usize, &str, [f32; 2])> + '_ {
        self.operations.iter().filter_map(|operation| match operation {
            DrawOperation::Text {
                page,
                text,
                position,
                ..
            } => Some((*page, text.as_str(), *position)),
            _ => None,
        })
    }

    /// The first text operation drawing exactly the given text.
    pub fn find_text(&self, wanted_text: &str) -> Option<(usize, [f32; 2])> {
        self.texts()
            .find(|(_, text, _)| *text == wanted_text)
            .map(|(page, _, position)| (page, position))
    }
}

/// Accumulates the draw operations while keeping track of the current page.
struct Canvas<'a> {
    fonts: &'a FontSet,
    page: usize,
    page_count: usize,
    operations: Vec<DrawOperation>,
}

impl<'a> Canvas<'a> {
    fn new(fonts: &'a FontSet) -> Self {
        Canvas {
            fonts,
            page: 0,
            page_count: 1,
            operations: Vec::new(),
        }
    }

    fn new_page(&mut self) {
        self.page = self.page_count;
        self.page_count += 1;
    }

    /// Draws a single line of text, `x` being the anchor the alignment refers to.
    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        alignment: TextAlignment,
        font_weight: FontWeight,
        font_size: f32,
        color: [f32; 3],
    ) {
        let left_x = match alignment {
            TextAlignment::Left => x,
            TextAlignment::Right => x - self.fonts.text_width(text, font_weight, font_size),
        };
        self.operations.push(DrawOperation::Text {
            page: self.page,
            text: text.to_string(),
            position: [left_x, y],
            font_weight,
            font_size,
            color,
        });
    }

    /// Draws every line of the text below the previous one, beginning at `first_line_y`.
    #[allow(clippy::too_many_arguments)]
    fn text_lines(
        &mut self,
        text: &str,
        x: f32,
        first_line_y: f32,
        line_height: f32,
        font_weight: FontWeight,
        font_size: f32,
        color: [f32; 3],
    ) {
        for (index, line) in text.lines().enumerate() {
            self.text(
                line,
                x,
                first_line_y + index as f32 * line_height,
                TextAlignment::Left,
                font_weight,
                font_size,
                color,
            );
        }
    }

    fn rectangle(
        &mut self,
        origin: [f32; 2],
        size: [f32; 2],
        fill_color: Option<[f32; 3]>,
        stroke: Option<Stroke>,
    ) {
        self.operations.push(DrawOperation::Rectangle {
            page: self.page,
            origin,
            size,
            fill_color,
            stroke,
        });
    }
}

/// The line height of text written with the given font size, in millimeters.
fn line_height(font_size: f32) -> f32 {
    points_to_millimeters(font_size) * LINE_HEIGHT_FACTOR
}

/// Quantities are printed in their shortest decimal form, without trailing zeros.
fn format_quantity(quantity: f64) -> String {
    // Negative zero prints as "-0"
    let quantity = quantity + 0.0;
    format!("{quantity}")
}

/// Breaks the text into lines that fit the width, breaking only between words. Words
/// longer than the width are kept whole on a line of their own.
pub fn wrap_text(text: &str, maximum_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut wrapped_lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                current_line.push_str(word);
                continue;
            }
            let candidate_line = format!("{current_line} {word}");
            if measure(&candidate_line) <= maximum_width {
                current_line = candidate_line;
            } else {
                wrapped_lines.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }
        wrapped_lines.push(current_line);
    }
    if wrapped_lines.is_empty() {
        wrapped_lines.push(String::new());
    }

    wrapped_lines
}

/// A column of the line-item table.
#[derive(Clone, Copy, Debug)]
struct TableColumn {
    x: f32,
    width: f32,
    alignment: TextAlignment,
}

impl TableColumn {
    /// Where the text of the cell is anchored, according to the alignment.
    fn text_anchor(&self, cell_padding: f32) -> f32 {
        match self.alignment {
            TextAlignment::Left => self.x + cell_padding,
            TextAlignment::Right => self.x + self.width - cell_padding,
        }
    }
}

/// The cells of one table row, each cell already split into lines.
type TableRow = [Vec<String>; 4];

/// Lays the invoice out following the fixed template. The logo box is only emitted
/// when `has_logo` is set; without a logo the space stays blank.
pub fn layout_invoice(
    invoice_record: &InvoiceRecord,
    has_logo: bool,
    configuration: &TemplateConfiguration,
    fonts: &FontSet,
) -> Result<InvoiceLayout, ContextError> {
    let mut canvas = Canvas::new(fonts);
    let label_color = to_unit_color(configuration.label_color);
    let value_color = to_unit_color(configuration.value_color);
    let right_edge = configuration.page_width - RIGHT_EDGE_INSET;
    let currency_symbol = invoice_record.currency_symbol();

    canvas.text(
        TITLE,
        right_edge,
        TITLE_Y,
        TextAlignment::Right,
        FontWeight::Regular,
        TITLE_FONT_SIZE,
        value_color,
    );

    if has_logo {
        canvas.operations.push(DrawOperation::Logo {
            page: canvas.page,
            origin: LOGO_ORIGIN,
            size: LOGO_SIZE,
        });
    }

    let metadata_fields = [
        ("#", Some(invoice_record.invoice_number.clone()), INVOICE_NUMBER_ROW_Y),
        ("Date", Some(format_date(invoice_record.date)?), DATE_ROW_Y),
        ("Due Date", Some(format_date(invoice_record.due_date)?), DUE_DATE_ROW_Y),
        (
            "PO Number",
            invoice_record.po_number().map(str::to_string),
            PO_NUMBER_ROW_Y,
        ),
    ];
    let mut flowing_row_y = INVOICE_NUMBER_ROW_Y;
    for (label, value, fixed_row_y) in metadata_fields {
        let Some(value) = value else {
            continue;
        };
        let row_y = if configuration.collapse_empty_metadata {
            flowing_row_y
        } else {
            fixed_row_y
        };
        flowing_row_y += METADATA_ROW_STEP;

        canvas.text(
            label,
            METADATA_LABEL_X,
            row_y,
            TextAlignment::Left,
            FontWeight::Regular,
            LABEL_FONT_SIZE,
            label_color,
        );
        canvas.text(
            &value,
            right_edge,
            row_y,
            TextAlignment::Right,
            FontWeight::Regular,
            VALUE_FONT_SIZE,
            value_color,
        );
    }

    for (label, label_y, party, first_line_y) in [
        (
            "Who is this from?",
            SENDER_LABEL_Y,
            &invoice_record.sender,
            SENDER_FIRST_LINE_Y,
        ),
        (
            "Bill To",
            RECIPIENT_LABEL_Y,
            &invoice_record.recipient,
            RECIPIENT_FIRST_LINE_Y,
        ),
    ] {
        canvas.text(
            label,
            PARTY_X,
            label_y,
            TextAlignment::Left,
            FontWeight::Regular,
            LABEL_FONT_SIZE,
            label_color,
        );
        canvas.text_lines(
            party,
            PARTY_X,
            first_line_y,
            ADDRESS_LINE_HEIGHT,
            FontWeight::Regular,
            VALUE_FONT_SIZE,
            value_color,
        );
    }

    let table_end_y = layout_line_item_table(&mut canvas, invoice_record, configuration)?;
    let table_end_page = canvas.page;

    let notes = invoice_record.notes();
    let terms = invoice_record.terms();
    let mut final_y = table_end_y + TABLE_END_GAP;
    let footer_bottom = |final_y: f32| {
        let body_line_count = [notes, terms]
            .into_iter()
            .flatten()
            .map(|text| text.lines().count().max(1))
            .max();
        match body_line_count {
            Some(body_line_count) => {
                final_y
                    + NOTES_OFFSET
                    + NOTES_BODY_OFFSET
                    + (body_line_count - 1) as f32 * line_height(VALUE_FONT_SIZE)
            }
            None => final_y + TOTAL_OFFSET,
        }
    };
    if footer_bottom(final_y) > configuration.page_height - configuration.page_margin {
        log::debug!(
            "The totals do not fit below the table on page {}, moving them to a new page",
            canvas.page + 1
        );
        canvas.new_page();
        final_y = configuration.page_margin;
    }

    let formatted_total = format_money(currency_symbol, invoice_record.total());
    canvas.text(
        "Subtotal",
        TOTALS_LABEL_X,
        final_y + SUBTOTAL_OFFSET,
        TextAlignment::Left,
        FontWeight::Regular,
        VALUE_FONT_SIZE,
        value_color,
    );
    canvas.text(
        &formatted_total,
        right_edge,
        final_y + SUBTOTAL_OFFSET,
        TextAlignment::Right,
        FontWeight::Regular,
        VALUE_FONT_SIZE,
        value_color,
    );
    canvas.text(
        "Total",
        TOTALS_LABEL_X,
        final_y + TOTAL_OFFSET,
        TextAlignment::Left,
        FontWeight::Bold,
        TOTAL_FONT_SIZE,
        value_color,
    );
    canvas.text(
        &formatted_total,
        right_edge,
        final_y + TOTAL_OFFSET,
        TextAlignment::Right,
        FontWeight::Bold,
        TOTAL_FONT_SIZE,
        value_color,
    );

    let notes_y = final_y + NOTES_OFFSET;
    for (label, text, x) in [("Notes", notes, NOTES_X), ("Payment Terms", terms, TERMS_X)] {
        let Some(text) = text else {
            continue;
        };
        canvas.text(
            label,
            x,
            notes_y,
            TextAlignment::Left,
            FontWeight::Regular,
            LABEL_FONT_SIZE,
            label_color,
        );
        canvas.text_lines(
            text,
            x,
            notes_y + NOTES_BODY_OFFSET,
            line_height(VALUE_FONT_SIZE),
            FontWeight::Regular,
            VALUE_FONT_SIZE,
            value_color,
        );
    }

    Ok(InvoiceLayout {
        page_count: canvas.page_count,
        operations: canvas.operations,
        table_end_page,
        table_end_y,
    })
}

/// Lays out the header and one row per line item, continuing on new pages as needed.
/// Returns the vertical coordinate right below the last row.
fn layout_line_item_table(
    canvas: &mut Canvas<'_>,
    invoice_record: &InvoiceRecord,
    configuration: &TemplateConfiguration,
) -> Result<f32, ContextError> {
    let table_style = &configuration.table;
    let padding = table_style.cell_padding;
    let description_width = configuration.content_width()
        - table_style.quantity_column_width
        - table_style.rate_column_width
        - table_style.amount_column_width;
    if description_width <= 2.0 * padding {
        return Err(ContextError::with_context(format!(
            "The line-item table does not fit in the page: {:.2}mm are left for the descriptions",
            description_width
        )));
    }

    let mut columns = Vec::with_capacity(4);
    let mut column_x = configuration.page_margin;
    for (width, alignment) in [
        (description_width, TextAlignment::Left),
        (table_style.quantity_column_width, TextAlignment::Right),
        (table_style.rate_column_width, TextAlignment::Right),
        (table_style.amount_column_width, TextAlignment::Right),
    ] {
        columns.push(TableColumn {
            x: column_x,
            width,
            alignment,
        });
        column_x += width;
    }

    let fonts = canvas.fonts;
    let font_size = table_style.font_size;
    let row_line_height = line_height(font_size);
    let currency_symbol = invoice_record.currency_symbol();
    let header_row: TableRow = TABLE_HEADERS.map(|header| vec![header.to_string()]);
    let body_rows: Vec<TableRow> = invoice_record
        .items
        .iter()
        .map(|item| {
            let description = if item.description.is_empty() {
                EMPTY_DESCRIPTION
            } else {
                item.description.as_str()
            };
            [
                wrap_text(description, description_width - 2.0 * padding, |text| {
                    fonts.text_width(text, FontWeight::Regular, font_size)
                }),
                vec![format_quantity(item.quantity)],
                vec![format_money(currency_symbol, item.rate)],
                vec![format_money(currency_symbol, item.amount())],
            ]
        })
        .collect();
    let row_height = |row: &TableRow| {
        let line_count = row.iter().map(Vec::len).max().unwrap_or(1);
        line_count as f32 * row_line_height + 2.0 * padding
    };

    let header_style = CellStyle {
        font_weight: FontWeight::Bold,
        text_color: to_unit_color(table_style.header_text_color),
        fill_color: Some(to_unit_color(table_style.header_fill_color)),
        stroke: None,
    };
    let body_style = CellStyle {
        font_weight: FontWeight::Regular,
        text_color: to_unit_color(table_style.body_text_color),
        fill_color: None,
        stroke: Some(Stroke {
            color: to_unit_color(table_style.line_color),
            width: table_style.line_width,
        }),
    };
    let bottom_limit = configuration.page_height - configuration.page_margin;

    let mut y = table_style.start_y;
    let mut rows_on_page = 0;
    layout_table_row(
        canvas,
        &columns,
        &header_row,
        y,
        row_height(&header_row),
        &header_style,
        padding,
        font_size,
    );
    y += row_height(&header_row);

    for body_row in body_rows.iter() {
        let body_row_height = row_height(body_row);
        if y + body_row_height > bottom_limit && rows_on_page > 0 {
            log::debug!(
                "The line-item table continues on page {}",
                canvas.page_count + 1
            );
            canvas.new_page();
            y = configuration.page_margin;
            rows_on_page = 0;
            layout_table_row(
                canvas,
                &columns,
                &header_row,
                y,
                row_height(&header_row),
                &header_style,
                padding,
                font_size,
            );
            y += row_height(&header_row);
        }
        layout_table_row(
            canvas,
            &columns,
            body_row,
            y,
            body_row_height,
            &body_style,
            padding,
            font_size,
        );
        y += body_row_height;
        rows_on_page += 1;
    }

    Ok(y)
}

struct CellStyle {
    font_weight: FontWeight,
    text_color: [f32; 3],
    fill_color: Option<[f32; 3]>,
    stroke: Option<Stroke>,
}

#[allow(clippy::too_many_arguments)]
fn layout_table_row(
    canvas: &mut Canvas<'_>,
    columns: &[TableColumn],
    row: &TableRow,
    row_y: f32,
    row_height: f32,
    cell_style: &CellStyle,
    padding: f32,
    font_size: f32,
) {
    let row_line_height = line_height(font_size);
    for (column, cell_lines) in columns.iter().zip(row.iter()) {
        canvas.rectangle(
            [column.x, row_y],
            [column.width, row_height],
            cell_style.fill_color,
            cell_style.stroke,
        );
        for (line_index, line) in cell_lines.iter().enumerate() {
            let line_top = row_y + padding + line_index as f32 * row_line_height;
            canvas.text(
                line,
                column.text_anchor(padding),
                line_top + row_line_height * BASELINE_RATIO,
                column.alignment,
                cell_style.font_weight,
                font_size,
                cell_style.text_color,
            );
        }
    }
}

fn format_date(date: time::Date) -> Result<String, ContextError> {
    date.format(time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|error| ContextError::with_error("Unable to format the invoice date", &error))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::invoice::LineItem;

    fn sample_record() -> InvoiceRecord {
        InvoiceRecord {
            sender: "Acme Ltd\n1 Main Street\nSpringfield".into(),
            recipient: "Globex Corporation".into(),
            items: vec![LineItem::new("A", 2.0, 10.0), LineItem::new("B", 1.0, 5.0)],
            currency: "EUR".into(),
            invoice_number: "7".into(),
            date: date!(2024 - 03 - 01),
            due_date: date!(2024 - 03 - 31),
            ..InvoiceRecord::default()
        }
    }

    fn layout(record: &InvoiceRecord) -> InvoiceLayout {
        layout_invoice(
            record,
            false,
            &TemplateConfiguration::default(),
            &FontSet::standard(),
        )
        .unwrap()
    }

    #[test]
    fn title_is_right_aligned_on_the_right_edge() {
        let invoice_layout = layout(&sample_record());
        let (page, [x, y]) = invoice_layout.find_text("INVOICE").unwrap();
        let title_width = FontSet::standard().text_width("INVOICE", FontWeight::Regular, 24.0);

        assert_eq!(page, 0);
        assert_eq!(y, 20.0);
        assert!((x + title_width - 190.0).abs() < 1e-3);
    }

    #[test]
    fn metadata_rows_keep_their_fixed_positions() {
        let invoice_layout = layout(&sample_record());

        assert_eq!(invoice_layout.find_text("#"), Some((0, [150.0, 40.0])));
        assert_eq!(invoice_layout.find_text("Date"), Some((0, [150.0, 50.0])));
        assert_eq!(invoice_layout.find_text("Due Date"), Some((0, [150.0, 70.0])));
        assert_eq!(invoice_layout.find_text("PO Number"), None);
        assert_eq!(invoice_layout.find_text("2024-03-31").unwrap().1[1], 70.0);
    }

    #[test]
    fn collapsed_metadata_flows_into_the_free_rows() {
        let record = InvoiceRecord {
            po_number: Some("PO-1".into()),
            ..sample_record()
        };
        let configuration = TemplateConfiguration {
            collapse_empty_metadata: true,
            ..TemplateConfiguration::default()
        };
        let invoice_layout =
            layout_invoice(&record, false, &configuration, &FontSet::standard()).unwrap();

        assert_eq!(invoice_layout.find_text("Due Date"), Some((0, [150.0, 60.0])));
        assert_eq!(invoice_layout.find_text("PO Number"), Some((0, [150.0, 70.0])));
    }

    #[test]
    fn party_lines_grow_downwards() {
        let invoice_layout = layout(&sample_record());

        assert_eq!(invoice_layout.find_text("Acme Ltd"), Some((0, [15.0, 80.0])));
        assert_eq!(invoice_layout.find_text("1 Main Street"), Some((0, [15.0, 86.0])));
        assert_eq!(invoice_layout.find_text("Springfield"), Some((0, [15.0, 92.0])));
        assert_eq!(
            invoice_layout.find_text("Globex Corporation"),
            Some((0, [15.0, 120.0]))
        );
    }

    #[test]
    fn totals_follow_the_end_of_the_table() {
        let short_layout = layout(&sample_record());
        let mut longer_record = sample_record();
        longer_record.items.push(LineItem::new("C", 1.0, 0.0));
        let longer_layout = layout(&longer_record);

        let row_height = line_height(12.0) + 2.0 * 3.0;
        assert!(
            (longer_layout.table_end_y - short_layout.table_end_y - row_height).abs() < 1e-3
        );
        let (_, [_, subtotal_y]) = short_layout.find_text("Subtotal").unwrap();
        let (_, [_, total_y]) = short_layout.find_text("Total").unwrap();
        assert!((subtotal_y - short_layout.table_end_y - 20.0).abs() < 1e-3);
        assert!((total_y - short_layout.table_end_y - 35.0).abs() < 1e-3);
        let (_, [_, longer_subtotal_y]) = longer_layout.find_text("Subtotal").unwrap();
        assert!((longer_subtotal_y - subtotal_y - row_height).abs() < 1e-3);
    }

    #[test]
    fn subtotal_and_total_print_the_same_amount() {
        let invoice_layout = layout(&sample_record());
        let amounts: Vec<&str> = invoice_layout
            .texts()
            .map(|(_, text, _)| text)
            .filter(|text| *text == "€25.00")
            .collect();

        assert_eq!(amounts.len(), 2);
        let total_weights: Vec<FontWeight> = invoice_layout
            .operations
            .iter()
            .filter_map(|operation| match operation {
                DrawOperation::Text {
                    text, font_weight, ..
                } if text == "€25.00" => Some(*font_weight),
                _ => None,
            })
            .collect();
        assert_eq!(
            total_weights,
            vec![FontWeight::Regular, FontWeight::Bold]
        );
    }

    #[test]
    fn table_cells_are_formatted_with_the_currency_symbol() {
        let invoice_layout = layout(&sample_record());
        let texts: Vec<&str> = invoice_layout.texts().map(|(_, text, _)| text).collect();

        for expected in [
            "Item", "Quantity", "Rate", "Amount", "A", "2", "€10.00", "€20.00", "€5.00",
        ] {
            assert!(texts.contains(&expected), "{:?} is missing", expected);
        }
    }

    #[test]
    fn empty_descriptions_are_printed_as_item() {
        let record = InvoiceRecord {
            items: vec![LineItem::new("", 1.0, 1.0)],
            ..sample_record()
        };
        let invoice_layout = layout(&record);
        let item_texts = invoice_layout
            .texts()
            .filter(|(_, text, _)| *text == "Item")
            .count();

        // The header and the row itself
        assert_eq!(item_texts, 2);
    }

    #[test]
    fn notes_and_terms_are_independent() {
        let record = InvoiceRecord {
            notes: Some("Thank you\nfor your business".into()),
            ..sample_record()
        };
        let invoice_layout = layout(&record);
        let notes_y = invoice_layout.table_end_y + 10.0 + 40.0;

        assert_eq!(invoice_layout.find_text("Notes"), Some((0, [15.0, notes_y])));
        assert_eq!(
            invoice_layout.find_text("Thank you"),
            Some((0, [15.0, notes_y + 10.0]))
        );
        let (_, [_, second_line_y]) = invoice_layout.find_text("for your business").unwrap();
        assert!((second_line_y - notes_y - 10.0 - line_height(12.0)).abs() < 1e-4);
        assert_eq!(invoice_layout.find_text("Payment Terms"), None);
    }

    #[test]
    fn whitespace_notes_keep_their_label() {
        let record = InvoiceRecord {
            notes: Some(" ".into()),
            ..sample_record()
        };
        let invoice_layout = layout(&record);
        let notes_y = invoice_layout.table_end_y + 10.0 + 40.0;

        assert_eq!(invoice_layout.find_text("Notes"), Some((0, [15.0, notes_y])));
        assert_eq!(invoice_layout.find_text("Payment Terms"), None);
    }

    #[test]
    fn absent_optional_regions_are_omitted() {
        let invoice_layout = layout(&sample_record());

        assert_eq!(invoice_layout.find_text("Notes"), None);
        assert_eq!(invoice_layout.find_text("Payment Terms"), None);
        assert!(!invoice_layout
            .operations
            .iter()
            .any(|operation| matches!(operation, DrawOperation::Logo { .. })));
    }

    #[test]
    fn logo_box_is_fixed_in_the_top_left_corner() {
        let invoice_layout = layout_invoice(
            &sample_record(),
            true,
            &TemplateConfiguration::default(),
            &FontSet::standard(),
        )
        .unwrap();

        assert!(invoice_layout.operations.contains(&DrawOperation::Logo {
            page: 0,
            origin: [15.0, 15.0],
            size: [50.0, 30.0],
        }));
        // The rest of the template does not move
        assert_eq!(
            invoice_layout.find_text("Acme Ltd"),
            layout(&sample_record()).find_text("Acme Ltd")
        );
    }

    #[test]
    fn long_tables_continue_on_new_pages() {
        let record = InvoiceRecord {
            items: (0..40)
                .map(|index| LineItem::new(format!("Service {index}"), 1.0, 10.0))
                .collect(),
            ..sample_record()
        };
        let invoice_layout = layout(&record);

        assert!(invoice_layout.page_count > 1);
        assert_eq!(invoice_layout.table_end_page, invoice_layout.page_count - 1);
        let (last_row_page, _) = invoice_layout.find_text("Service 39").unwrap();
        assert_eq!(last_row_page, invoice_layout.table_end_page);
        let header_count = invoice_layout
            .texts()
            .filter(|(_, text, _)| *text == "Quantity")
            .count();
        assert_eq!(header_count, invoice_layout.page_count);
        for (_, _, [_, y]) in invoice_layout.texts() {
            assert!(y < 297.0);
        }
    }

    #[test]
    fn totals_that_do_not_fit_move_to_a_new_page() {
        let record = InvoiceRecord {
            items: (0..5)
                .map(|index| LineItem::new(format!("Service {index}"), 1.0, 10.0))
                .collect(),
            notes: Some("a\nb\nc".into()),
            ..sample_record()
        };
        let configuration = TemplateConfiguration::default();
        let invoice_layout = layout(&record);

        assert_eq!(invoice_layout.table_end_page, 0);
        assert_eq!(invoice_layout.page_count, 2);
        let (subtotal_page, [_, subtotal_y]) = invoice_layout.find_text("Subtotal").unwrap();
        assert_eq!(subtotal_page, invoice_layout.table_end_page + 1);
        assert!((subtotal_y - (configuration.page_margin + 10.0)).abs() < 1e-3);
        let (notes_page, _) = invoice_layout.find_text("c").unwrap();
        assert_eq!(notes_page, subtotal_page);
        let (last_row_page, _) = invoice_layout.find_text("Service 4").unwrap();
        assert_eq!(last_row_page, 0);
        for (_, _, [_, y]) in invoice_layout.texts() {
            assert!(y <= configuration.page_height - configuration.page_margin);
        }
    }

    #[test]
    fn long_descriptions_wrap_inside_their_cell() {
        let description = "Consulting services ".repeat(8);
        let record = InvoiceRecord {
            items: vec![LineItem::new(description.trim(), 1.0, 1.0)],
            ..sample_record()
        };
        let single_line_layout = layout(&InvoiceRecord {
            items: vec![LineItem::new("Consulting", 1.0, 1.0)],
            ..sample_record()
        });
        let wrapped_layout = layout(&record);
        let fonts = FontSet::standard();

        let description_lines: Vec<&str> = wrapped_layout
            .texts()
            .map(|(_, text, _)| text)
            .filter(|text| text.contains("Consulting") || text.contains("services"))
            .collect();
        assert!(description_lines.len() > 1);
        for line in description_lines {
            // The description column minus the padding on both sides
            assert!(fonts.text_width(line, FontWeight::Regular, 12.0) <= 65.8);
        }
        assert!(wrapped_layout.table_end_y > single_line_layout.table_end_y);
    }

    #[test]
    fn tables_wider_than_the_page_fail() {
        let configuration = TemplateConfiguration {
            page_width: 120.0,
            ..TemplateConfiguration::default()
        };
        let error = layout_invoice(&sample_record(), false, &configuration, &FontSet::standard())
            .unwrap_err();

        assert!(error.context.starts_with("The line-item table does not fit in the page"));
    }

    #[test]
    fn wrapping_keeps_words_whole() {
        let measure = |text: &str| text.chars().count() as f32;

        assert_eq!(
            wrap_text("one two three four", 9.0, measure),
            vec!["one two", "three", "four"]
        );
        assert_eq!(
            wrap_text("incomprehensibilities", 5.0, measure),
            vec!["incomprehensibilities"]
        );
        assert_eq!(wrap_text("", 5.0, measure), vec![""]);
        assert_eq!(wrap_text("a\nb", 5.0, measure), vec!["a", "b"]);
    }

    #[test]
    fn quantities_are_printed_without_trailing_zeros() {
        assert_eq!(format_quantity(2.0), "2");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(0.0), "0");
        assert_eq!(format_quantity(-0.0), "0");
    }
}
