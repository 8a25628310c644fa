use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// The adjustable parts of the invoice template. Lengths are in millimeters and font
/// sizes in points; every field can be omitted from the JSON file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateConfiguration {
    pub page_width: f32,
    pub page_height: f32,
    /// The margin the line-item table keeps from every edge of the page.
    pub page_margin: f32,
    pub label_color: [u8; 3],
    pub value_color: [u8; 3],
    pub table: TableStyle,
    /// TrueType fonts to embed instead of the standard Helvetica.
    pub fonts: Option<FontsConfiguration>,
    /// When set, metadata fields without a value give their row to the following ones.
    pub collapse_empty_metadata: bool,
}

impl Default for TemplateConfiguration {
    fn default() -> Self {
        TemplateConfiguration {
            page_width: 210.0,
            page_height: 297.0,
            page_margin: 14.11,
            label_color: [80, 80, 80],
            value_color: [40, 40, 40],
            table: TableStyle::default(),
            fonts: None,
            collapse_empty_metadata: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TableStyle {
    /// Where the header row of the table begins on the first page.
    pub start_y: f32,
    pub font_size: f32,
    pub cell_padding: f32,
    pub header_fill_color: [u8; 3],
    pub header_text_color: [u8; 3],
    pub body_text_color: [u8; 3],
    pub line_color: [u8; 3],
    pub line_width: f32,
    pub quantity_column_width: f32,
    pub rate_column_width: f32,
    pub amount_column_width: f32,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            start_y: 150.0,
            font_size: 12.0,
            cell_padding: 3.0,
            header_fill_color: [40, 40, 40],
            header_text_color: [255, 255, 255],
            body_text_color: [80, 80, 80],
            line_color: [200, 200, 200],
            line_width: 0.1,
            quantity_column_width: 30.0,
            rate_column_width: 40.0,
            amount_column_width: 40.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontsConfiguration {
    pub regular_font_path: PathBuf,
    pub bold_font_path: PathBuf,
}

impl TemplateConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;
        let configuration: TemplateConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;

        Ok(configuration)
    }

    /// The width left to the table once the margins are taken away.
    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.page_margin
    }
}

/// Converts an 8-bit RGB color into the unit range the PDF color operators expect.
pub fn to_unit_color(color: [u8; 3]) -> [f32; 3] {
    color.map(|component| component as f32 / 255.0)
}
