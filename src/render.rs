use std::path::{Path, PathBuf};

use crate::configuration::TemplateConfiguration;
use crate::error::ContextError;
use crate::fonts::{FontSet, FontWeight};
use crate::invoice::InvoiceRecord;
use crate::layout::{layout_invoice, DrawOperation, InvoiceLayout};
use crate::pdf::{DocumentInformation, ImageXObject, PdfDocument};

/// Renders the invoice into a PDF document, ready to be saved.
///
/// Everything needed is taken from the record and the configuration: the logo is already
/// encoded in the record, so no file is read unless TrueType fonts are configured. The
/// document identifier and dates derive from the record, which makes the output of two
/// renderings of the same record identical.
pub fn render_invoice(
    invoice_record: &InvoiceRecord,
    configuration: &TemplateConfiguration,
) -> Result<PdfDocument, ContextError> {
    let fonts = FontSet::from_configuration(configuration.fonts.as_ref())?;
    let logo_image = invoice_record
        .logo
        .as_ref()
        .map(|logo| logo.decode_image())
        .transpose()?;
    let invoice_layout = layout_invoice(
        invoice_record,
        logo_image.is_some(),
        configuration,
        &fonts,
    )?;
    log::debug!(
        "Laid out invoice {:?} over {} page(s), the table ends at {:.2}mm on page {}",
        invoice_record.invoice_number,
        invoice_layout.page_count,
        invoice_layout.table_end_y,
        invoice_layout.table_end_page + 1
    );

    let replaced_text_count = count_replaced_texts(&invoice_layout, &fonts);
    if !fonts.regular.can_encode(invoice_record.currency_symbol()) {
        log::warn!(
            "The currency symbol {:?} of {} is not available in the fonts and is replaced, \
             configure TrueType fonts to print it",
            invoice_record.currency_symbol(),
            invoice_record.currency
        );
    } else if replaced_text_count > 0 {
        log::warn!(
            "{} text(s) of the invoice have characters the fonts replace",
            replaced_text_count
        );
    }

    let mut pdf_document = PdfDocument::new(document_identifier(invoice_record));
    for _ in 0..invoice_layout.page_count {
        pdf_document.add_page(configuration.page_width, configuration.page_height);
    }
    let regular_font_index = pdf_document.add_font(fonts.regular.clone());
    let bold_font_index = pdf_document.add_font(fonts.bold.clone());
    let logo_image_index = logo_image
        .map(|logo_image| pdf_document.add_image(&ImageXObject::from_dynamic_image(&logo_image)));

    // The layout measures from the top of the page and the PDF from the bottom
    let page_height = configuration.page_height;
    for draw_operation in invoice_layout.operations.iter() {
        match draw_operation {
            DrawOperation::Text {
                page,
                text,
                position: [x, y],
                font_weight,
                font_size,
                color,
            } => {
                let font_index = match font_weight {
                    FontWeight::Regular => regular_font_index,
                    FontWeight::Bold => bold_font_index,
                };
                pdf_document.write_text_to_page(
                    *page,
                    *color,
                    text,
                    font_index,
                    *font_size,
                    [*x, page_height - y],
                )?;
            }
            DrawOperation::Rectangle {
                page,
                origin: [x, y],
                size,
                fill_color,
                stroke,
            } => {
                pdf_document.draw_rectangle_on_page(
                    *page,
                    [*x, page_height - y - size[1]],
                    *size,
                    *fill_color,
                    stroke.map(|stroke| (stroke.color, stroke.width)),
                )?;
            }
            DrawOperation::Logo {
                page,
                origin: [x, y],
                size,
            } => {
                let logo_image_index = logo_image_index.ok_or_else(|| {
                    ContextError::with_context("The layout has a logo box but there is no logo")
                })?;
                pdf_document.draw_image_on_page(
                    *page,
                    logo_image_index,
                    [*x, page_height - y - size[1]],
                    *size,
                )?;
            }
        }
    }

    let document_information = DocumentInformation {
        title: format!("Invoice {}", invoice_record.invoice_number),
        author: first_line(&invoice_record.sender),
        subject: format!("Invoice for {}", first_line(&invoice_record.recipient)),
        creation_date: invoice_record.date.midnight().assume_utc(),
    };
    pdf_document.write_all(invoice_record.date.to_string(), &document_information)?;
    pdf_document.optimize();

    Ok(pdf_document)
}

pub fn render_invoice_to_bytes(
    invoice_record: &InvoiceRecord,
    configuration: &TemplateConfiguration,
) -> Result<Vec<u8>, ContextError> {
    render_invoice(invoice_record, configuration)?.save_to_bytes()
}

/// Renders the invoice and saves it as `invoice-{number}.pdf` in the output directory,
/// which is created if needed, returning the path of the saved file.
///
/// The document is written to an intermediate `.swp` file which is then renamed, so an
/// existing invoice with the same name is replaced only once the new one is complete.
pub fn save_invoice(
    invoice_record: &InvoiceRecord,
    configuration: &TemplateConfiguration,
    output_directory: &Path,
) -> Result<PathBuf, ContextError> {
    let pdf_document_bytes = render_invoice_to_bytes(invoice_record, configuration)?;

    std::fs::create_dir_all(output_directory).map_err(|error| {
        ContextError::with_error(
            format!("Unable to create the output directory {:?}", output_directory),
            &error,
        )
    })?;
    let pdf_path = output_directory.join(invoice_record.file_name());
    let swap_path = output_directory.join(format!("{}.swp", invoice_record.file_name()));

    std::fs::write(&swap_path, &pdf_document_bytes).map_err(|error| {
        ContextError::with_error(format!("Unable to write the file {:?}", swap_path), &error)
    })?;
    if let Err(error) = std::fs::rename(&swap_path, &pdf_path) {
        let _ = std::fs::remove_file(&swap_path);
        return Err(ContextError::with_error(
            format!("Unable to save the invoice to {:?}", pdf_path),
            &error,
        ));
    }
    log::info!(
        "Saved the invoice to {:?} ({} bytes)",
        pdf_path,
        pdf_document_bytes.len()
    );

    Ok(pdf_path)
}

/// The number of texts which cannot be printed as they are with the fonts.
fn count_replaced_texts(invoice_layout: &InvoiceLayout, fonts: &FontSet) -> usize {
    invoice_layout
        .operations
        .iter()
        .filter(|draw_operation| match draw_operation {
            DrawOperation::Text {
                text, font_weight, ..
            } => !fonts.face(*font_weight).can_encode(text),
            _ => false,
        })
        .count()
}

fn document_identifier(invoice_record: &InvoiceRecord) -> String {
    invoice_record
        .file_name()
        .trim_end_matches(".pdf")
        .to_string()
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}
