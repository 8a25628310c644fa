use lopdf::content::Operation;
use nalgebra_glm as glm;
use std::{
    collections::{BTreeMap, BTreeSet},
    io::BufWriter,
    mem,
};
use time::OffsetDateTime;

use crate::error::ContextError;
use crate::fonts::{millimeters_to_points, FontFace};

/// The low-level image representation for a PDF document.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Width of the image in pixels.
    pub width: u32,
    /// Height of the image in pixels.
    pub height: u32,
    /// Either `DeviceRGB` or `DeviceGray`.
    pub color_space: &'static str,
    /// Bits per color component, always 8 for the images decoded by this crate.
    pub bits_per_component: u8,
    /// Should the image be interpolated when scaled?
    pub interpolate: bool,
    /// The raw samples, row by row.
    pub image_data: Vec<u8>,
    /// The alpha channel as a grayscale image, `None` for opaque images.
    pub soft_mask: Option<Box<ImageXObject>>,
}

impl ImageXObject {
    /// Converts a decoded image into raw RGB samples, splitting its alpha channel into
    /// a soft mask when it has one.
    pub fn from_dynamic_image(image: &image::DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        if !image.color().has_alpha() {
            return ImageXObject {
                width,
                height,
                color_space: "DeviceRGB",
                bits_per_component: 8,
                interpolate: true,
                image_data: image.to_rgb8().into_raw(),
                soft_mask: None,
            };
        }

        let rgba_image = image.to_rgba8();
        let mut color_samples = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha_samples = Vec::with_capacity((width * height) as usize);
        for pixel in rgba_image.pixels() {
            let [red, green, blue, alpha] = pixel.0;
            color_samples.extend_from_slice(&[red, green, blue]);
            alpha_samples.push(alpha);
        }

        ImageXObject {
            width,
            height,
            color_space: "DeviceRGB",
            bits_per_component: 8,
            interpolate: true,
            image_data: color_samples,
            soft_mask: Some(Box::new(ImageXObject {
                width,
                height,
                color_space: "DeviceGray",
                bits_per_component: 8,
                interpolate: true,
                image_data: alpha_samples,
                soft_mask: None,
            })),
        }
    }

    /// Inserts the image (and its soft mask first, if any) into the document.
    fn insert_into_document(&self, inner_document: &mut lopdf::Document) -> lopdf::ObjectId {
        use lopdf::Object::*;

        let mut image_dictionary = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".into())),
            ("Subtype", Name("Image".into())),
            ("Width", Integer(self.width as i64)),
            ("Height", Integer(self.height as i64)),
            ("ColorSpace", Name(self.color_space.into())),
            ("BitsPerComponent", Integer(self.bits_per_component as i64)),
            ("Interpolate", Boolean(self.interpolate)),
        ]);
        if let Some(soft_mask) = &self.soft_mask {
            let soft_mask_id = soft_mask.insert_into_document(inner_document);
            image_dictionary.set("SMask", Reference(soft_mask_id));
        }

        inner_document.add_object(lopdf::Stream::new(
            image_dictionary,
            self.image_data.clone(),
        ))
    }
}

/// The name under which an image is referenced from the content streams.
fn image_resource_name(image_index: usize) -> String {
    format!("Im{image_index}")
}

/// The name under which a font is referenced from the content streams.
fn font_resource_name(font_index: usize) -> String {
    format!("F{font_index}")
}

/// The representation of a PDF page, with its content operations in painting order.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    pub(crate) operations: Vec<Operation>,
    /// Indices of the images drawn on this page.
    pub(crate) image_indices: BTreeSet<usize>,
}

impl PdfPage {
    fn content_stream(&self) -> Result<lopdf::Stream, ContextError> {
        let stream_content = lopdf::content::Content {
            operations: self.operations.clone(),
        };
        let encoded_content = stream_content.encode().map_err(|error| {
            ContextError::with_error("Failed to encode the page content", &error)
        })?;

        Ok(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content))
    }
}

/// The entries of the document information dictionary.
#[derive(Debug, Clone)]
pub struct DocumentInformation {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creation_date: OffsetDateTime,
}

/// A PDF document under construction on top of the underlying `lopdf::Document`.
///
/// Pages, fonts and images are registered first and referred to by index afterwards.
/// Positions and sizes are given in millimeters from the bottom-left corner of the page.
pub struct PdfDocument {
    /// Font resource name to the reserved object ID and the face.
    fonts: BTreeMap<String, (lopdf::ObjectId, FontFace)>,
    images: Vec<lopdf::ObjectId>,
    /// The underlying PDF document, exposed as an escape hatch.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used in order to set the PDF `ID` tag.
    pub identifier: String,
    pub(crate) pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` following version 1.5 of the PDF specification.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            fonts: BTreeMap::default(),
            images: Vec::new(),
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
        }
    }

    /// Adds a page of given width and height in millimeters and returns its index.
    pub fn add_page(&mut self, page_width: f32, page_height: f32) -> usize {
        self.pages.push(PdfPage {
            width: millimeters_to_points(page_width),
            height: millimeters_to_points(page_height),
            operations: Vec::new(),
            image_indices: BTreeSet::new(),
        });

        self.pages.len() - 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Registers a font and returns its index. The font data is only written out by `write_all`.
    pub fn add_font(&mut self, font_face: FontFace) -> usize {
        let font_index = self.fonts.len();
        let font_object_id = self.inner_document.new_object_id();
        self.fonts.insert(
            font_resource_name(font_index),
            (font_object_id, font_face),
        );

        font_index
    }

    /// Inserts an image into the document and returns its index, to be drawn with `draw_image_on_page`.
    pub fn add_image(&mut self, image: &ImageXObject) -> usize {
        let image_id = image.insert_into_document(&mut self.inner_document);
        self.images.push(image_id);

        self.images.len() - 1
    }

    /// Writes the text with its baseline beginning at the caret position.
    #[allow(clippy::too_many_arguments)]
    pub fn write_text_to_page(
        &mut self,
        page_index: usize,
        color: [f32; 3],
        text: &str,
        font_index: usize,
        font_size: f32,
        caret_position: [f32; 2],
    ) -> Result<(), ContextError> {
        let encoded_text = self.get_font(font_index)?.encode_text(text);
        let [x, y] = caret_position;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![font_resource_name(font_index).into(), font_size.into()],
                ),
                Operation::new(
                    "Td",
                    vec![
                        millimeters_to_points(x).into(),
                        millimeters_to_points(y).into(),
                    ],
                ),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new(
                    "Tj",
                    vec![lopdf::Object::String(
                        encoded_text,
                        lopdf::StringFormat::Hexadecimal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        )
    }

    /// Draws a rectangle whose bottom-left corner is at the origin, filled and/or stroked.
    pub fn draw_rectangle_on_page(
        &mut self,
        page_index: usize,
        origin: [f32; 2],
        size: [f32; 2],
        fill_color: Option<[f32; 3]>,
        stroke: Option<([f32; 3], f32)>,
    ) -> Result<(), ContextError> {
        let painting_operator = match (fill_color, stroke) {
            (Some(_), Some(_)) => "B",
            (Some(_), None) => "f",
            (None, Some(_)) => "S",
            (None, None) => return Ok(()),
        };

        let mut operations = vec![Operation::new("q", vec![])];
        if let Some([r, g, b]) = fill_color {
            operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        }
        if let Some(([r, g, b], line_width)) = stroke {
            operations.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
            operations.push(Operation::new(
                "w",
                vec![millimeters_to_points(line_width).into()],
            ));
        }
        operations.push(Operation::new(
            "re",
            [origin[0], origin[1], size[0], size[1]]
                .into_iter()
                .map(|length| millimeters_to_points(length).into())
                .collect(),
        ));
        operations.push(Operation::new(painting_operator, vec![]));
        operations.push(Operation::new("Q", vec![]));

        self.add_operations_to_page(page_index, operations)
    }

    /// Draws a previously added image stretched over the given box.
    pub fn draw_image_on_page(
        &mut self,
        page_index: usize,
        image_index: usize,
        origin: [f32; 2],
        size: [f32; 2],
    ) -> Result<(), ContextError> {
        if image_index >= self.images.len() {
            return Err(ContextError::with_context(format!(
                "Failed to find the image with index {}",
                image_index
            )));
        }

        // Images are painted in the unit square, so the transformation scales it to the
        // box and then moves it into place
        let transform = glm::translation2d(&glm::vec2(
            millimeters_to_points(origin[0]),
            millimeters_to_points(origin[1]),
        )) * glm::scaling2d(&glm::vec2(
            millimeters_to_points(size[0]),
            millimeters_to_points(size[1]),
        ));
        let transform_operands = [
            transform[(0, 0)],
            transform[(1, 0)],
            transform[(0, 1)],
            transform[(1, 1)],
            transform[(0, 2)],
            transform[(1, 2)],
        ]
        .into_iter()
        .map(lopdf::Object::from)
        .collect();

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("cm", transform_operands),
                Operation::new("Do", vec![image_resource_name(image_index).into()]),
                Operation::new("Q", vec![]),
            ],
        )?;
        self.get_mut_page(page_index)?
            .image_indices
            .insert(image_index);

        Ok(())
    }

    /// Write the pages, fonts and document information into the underlying document.
    /// The instance ID is the second half of the PDF `ID` tag.
    pub fn write_all(
        &mut self,
        instance_id: String,
        document_information: &DocumentInformation,
    ) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let literal = |text: &str| String(text.as_bytes().to_vec(), Literal);
        let creation_date = to_pdf_timestamp_format(&document_information.creation_date);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            ("CreationDate", literal(&creation_date)),
            ("ModDate", literal(&creation_date)),
            ("Title", to_pdf_text_string(&document_information.title)),
            ("Author", to_pdf_text_string(&document_information.author)),
            ("Subject", to_pdf_text_string(&document_information.subject)),
            ("Creator", literal("invoicr")),
            ("Producer", literal("invoicr")),
            ("Identifier", literal(&self.identifier)),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                literal(&self.identifier),
                String(instance_id.into_bytes(), Literal),
            ]),
        );

        let fonts_dictionary = self.insert_fonts_into_document();
        let fonts_dictionary_id = self.inner_document.add_object(fonts_dictionary);

        let mut page_ids = Vec::<lopdf::Object>::new();
        for page in self.pages.iter() {
            let page_box = || -> lopdf::Object {
                vec![0.into(), 0.into(), page.width.into(), page.height.into()].into()
            };
            let mut page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                ("MediaBox", page_box()),
                ("TrimBox", page_box()),
                ("CropBox", page_box()),
                ("Parent", Reference(pages_id)),
            ]);

            let mut resource_dictionary =
                lopdf::Dictionary::from_iter(vec![("Font", Reference(fonts_dictionary_id))]);
            if !page.image_indices.is_empty() {
                let mut xobjects_dictionary = lopdf::Dictionary::new();
                for image_index in page.image_indices.iter() {
                    let image_id = self.images.get(*image_index).ok_or_else(|| {
                        ContextError::with_context(format!(
                            "Failed to find the image with index {}",
                            image_index
                        ))
                    })?;
                    xobjects_dictionary.set(image_resource_name(*image_index), Reference(*image_id));
                }
                resource_dictionary.set("XObject", Dictionary(xobjects_dictionary));
            }
            page_dictionary.set("Resources", Dictionary(resource_dictionary));

            let page_content_id = self.inner_document.add_object(page.content_stream()?);
            page_dictionary.set("Contents", Reference(page_content_id));

            page_ids.push(Reference(self.inner_document.add_object(page_dictionary)));
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(self.pages.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Optimize the PDF document (only superficially), compressing its streams.
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.delete_zero_length_streams();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Converts the fonts into a dictionary and inserts them into the document.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        let mut font_dictionary = lopdf::Dictionary::new();

        for (font_id, (font_object_id, font_face)) in self.fonts.iter() {
            let collected_font_dictionary =
                font_face.insert_into_document(font_id, &mut self.inner_document);

            self.inner_document.objects.insert(
                *font_object_id,
                lopdf::Object::Dictionary(collected_font_dictionary),
            );
            font_dictionary.set(font_id.clone(), lopdf::Object::Reference(*font_object_id));
        }
        font_dictionary
    }

    fn add_operations_to_page(
        &mut self,
        page_index: usize,
        operations: Vec<Operation>,
    ) -> Result<(), ContextError> {
        self.get_mut_page(page_index)?.operations.extend(operations);

        Ok(())
    }

    fn get_font(&self, font_index: usize) -> Result<&FontFace, ContextError> {
        self.fonts
            .get(&font_resource_name(font_index))
            .map(|(_, font_face)| font_face)
            .ok_or_else(|| {
                ContextError::with_context(format!(
                    "Failed to find font {} into the fonts map",
                    font_index
                ))
            })
    }

    fn get_mut_page(&mut self, page_index: usize) -> Result<&mut PdfPage, ContextError> {
        self.pages.get_mut(page_index).ok_or_else(|| {
            ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            ))
        })
    }
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
/// Text strings outside of ASCII are written in UTF-16BE behind a byte order mark.
fn to_pdf_text_string(text: &str) -> lopdf::Object {
    if text.is_ascii() {
        return lopdf::Object::String(text.as_bytes().to_vec(), lopdf::StringFormat::Literal);
    }
    let mut text_bytes = vec![0xFE, 0xFF];
    for code_unit in text.encode_utf16() {
        text_bytes.extend_from_slice(&code_unit.to_be_bytes());
    }

    lopdf::Object::String(text_bytes, lopdf::StringFormat::Hexadecimal)
}

fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::fonts::StandardFont;

    fn information() -> DocumentInformation {
        DocumentInformation {
            title: "Invoice 7".into(),
            author: "Acme".into(),
            subject: "Invoice".into(),
            creation_date: datetime!(2024-05-05 15:02:24 UTC),
        }
    }

    #[test]
    fn timestamps_follow_the_pdf_date_format() {
        assert_eq!(
            to_pdf_timestamp_format(&datetime!(2017-05-05 15:02:24 +2)),
            "D:20170505150224+02'00'"
        );
    }

    #[test]
    fn written_document_can_be_loaded_back() {
        let mut pdf_document = PdfDocument::new("invoice-7".into());
        let first_page = pdf_document.add_page(210.0, 297.0);
        let second_page = pdf_document.add_page(210.0, 297.0);
        let font_index = pdf_document.add_font(FontFace::Standard(StandardFont::Helvetica));
        pdf_document
            .write_text_to_page(first_page, [0.0; 3], "Hello", font_index, 12.0, [15.0, 200.0])
            .unwrap();
        pdf_document
            .draw_rectangle_on_page(second_page, [10.0, 10.0], [50.0, 8.0], Some([0.5; 3]), None)
            .unwrap();
        pdf_document.write_all("1".into(), &information()).unwrap();
        pdf_document.optimize();

        let pdf_document_bytes = pdf_document.save_to_bytes().unwrap();
        assert!(pdf_document_bytes.starts_with(b"%PDF-1.5"));
        let loaded_document = lopdf::Document::load_mem(&pdf_document_bytes).unwrap();
        assert_eq!(loaded_document.get_pages().len(), 2);
    }

    #[test]
    fn non_ascii_information_is_written_in_utf16() {
        let mut pdf_document = PdfDocument::new("invoice-7".into());
        pdf_document.add_page(210.0, 297.0);
        let document_information = DocumentInformation {
            author: "Zürich AG".into(),
            ..information()
        };
        pdf_document.write_all("1".into(), &document_information).unwrap();

        let pdf_document_bytes = pdf_document.save_to_bytes().unwrap();
        let loaded_document = lopdf::Document::load_mem(&pdf_document_bytes).unwrap();
        let info_id = loaded_document
            .trailer
            .get(b"Info")
            .and_then(lopdf::Object::as_reference)
            .unwrap();
        let info = loaded_document.get_dictionary(info_id).unwrap();
        let author = info.get(b"Author").and_then(lopdf::Object::as_str).unwrap();
        let expected_author: Vec<u8> = [0xFE, 0xFF]
            .into_iter()
            .chain("Zürich AG".encode_utf16().flat_map(u16::to_be_bytes))
            .collect();
        assert_eq!(author, expected_author.as_slice());
        // ASCII values stay readable as they are
        let title = info.get(b"Title").and_then(lopdf::Object::as_str).unwrap();
        assert_eq!(title, b"Invoice 7");
    }

    #[test]
    fn unknown_pages_and_fonts_are_reported() {
        let mut pdf_document = PdfDocument::new("invoice".into());
        let error = pdf_document
            .write_text_to_page(0, [0.0; 3], "Hello", 0, 12.0, [0.0, 0.0])
            .unwrap_err();
        assert_eq!(error.context, "Failed to find font 0 into the fonts map");

        pdf_document.add_font(FontFace::Standard(StandardFont::Helvetica));
        let error = pdf_document
            .write_text_to_page(3, [0.0; 3], "Hello", 0, 12.0, [0.0, 0.0])
            .unwrap_err();
        assert_eq!(error.context, "Failed to find the page with index 3");
    }

    #[test]
    fn images_are_placed_through_the_transformation_matrix() {
        let mut pdf_document = PdfDocument::new("invoice".into());
        let page_index = pdf_document.add_page(210.0, 297.0);
        let image = image::DynamicImage::new_rgba8(4, 2);
        let image_index = pdf_document.add_image(&ImageXObject::from_dynamic_image(&image));
        pdf_document
            .draw_image_on_page(page_index, image_index, [15.0, 252.0], [50.0, 30.0])
            .unwrap();

        let page = &pdf_document.pages[page_index];
        let transform = page
            .operations
            .iter()
            .find(|operation| operation.operator == "cm")
            .unwrap();
        let operands: Vec<f32> = transform
            .operands
            .iter()
            .map(|operand| operand.as_float().unwrap())
            .collect();
        let expected = [
            millimeters_to_points(50.0),
            0.0,
            0.0,
            millimeters_to_points(30.0),
            millimeters_to_points(15.0),
            millimeters_to_points(252.0),
        ];
        for (operand, expected) in operands.iter().zip(expected) {
            assert!((operand - expected).abs() < 1e-3, "{} != {}", operand, expected);
        }
        assert!(page.image_indices.contains(&image_index));
    }

    #[test]
    fn transparent_images_carry_a_soft_mask() {
        let opaque = ImageXObject::from_dynamic_image(&image::DynamicImage::new_rgb8(3, 3));
        let transparent = ImageXObject::from_dynamic_image(&image::DynamicImage::new_rgba8(3, 3));

        assert!(opaque.soft_mask.is_none());
        assert_eq!(opaque.image_data.len(), 27);
        assert_eq!(transparent.image_data.len(), 27);
        assert_eq!(
            transparent.soft_mask.map(|soft_mask| soft_mask.image_data.len()),
            Some(9)
        );
    }
}
