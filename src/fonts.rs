use lopdf::{Object, StringFormat};
use owned_ttf_parser::{AsFaceRef as _, Face, OwnedFace};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};
use unicode_normalization::UnicodeNormalization as _;

use crate::configuration::FontsConfiguration;
use crate::error::ContextError;

/// The number of PDF points in a millimeter.
pub const POINTS_PER_MILLIMETER: f32 = 2.834646;

/// Converts millimeters to points, which is the unit the PDF format works with.
pub fn millimeters_to_points(millimeters: f32) -> f32 {
    millimeters * POINTS_PER_MILLIMETER
}

/// Converts points to millimeters, which is the unit the invoice template works with.
pub fn points_to_millimeters(points: f32) -> f32 {
    points / POINTS_PER_MILLIMETER
}

/// The two weights the invoice template is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// The fonts every PDF reader ships with, which need not be embedded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

// Advance widths in thousandths of an em, for the codes 0x20 to 0x7E.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

impl StandardFont {
    /// The name under which PDF readers know the font.
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// The advance width of a WinAnsi encoded character, in thousandths of an em.
    fn glyph_width(&self, code: u8) -> u16 {
        let widths = match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match code {
            0x20..=0x7E => widths[(code - 0x20) as usize],
            // Outside printable ASCII the widths are approximated
            0x85 | 0x89 | 0x97 | 0x99 => 1000,
            0x95 => 350,
            0xA0 => 278,
            _ => 556,
        }
    }

    fn can_encode(&self, text: &str) -> bool {
        text.nfc().all(|character| win_ansi_code(character).is_some())
    }

    /// Encodes the text in the WinAnsi encoding, replacing what it cannot represent.
    fn encode_text(&self, text: &str) -> Vec<u8> {
        text.nfc()
            .map(|character| {
                win_ansi_code(character).unwrap_or_else(|| {
                    log::debug!(
                        "Unable to find the character {:?} in the font {}, replacing it",
                        character,
                        self.base_font_name()
                    );
                    b'?'
                })
            })
            .collect()
    }
}

/// Maps a character to its code in the WinAnsi encoding, if it has one.
fn win_ansi_code(character: char) -> Option<u8> {
    match character as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        _ => match character {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            'ƒ' => Some(0x83),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '†' => Some(0x86),
            '‡' => Some(0x87),
            'ˆ' => Some(0x88),
            '‰' => Some(0x89),
            'Š' => Some(0x8A),
            '‹' => Some(0x8B),
            'Œ' => Some(0x8C),
            'Ž' => Some(0x8E),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '˜' => Some(0x98),
            '™' => Some(0x99),
            'š' => Some(0x9A),
            '›' => Some(0x9B),
            'œ' => Some(0x9C),
            'ž' => Some(0x9E),
            'Ÿ' => Some(0x9F),
            '\t' => Some(b' '),
            _ => None,
        },
    }
}

/// The (insofar) relevant vertical metrics of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct FontMetrics {
    pub ascent: i16,
    pub descent: i16,
    pub units_per_em: u16,
}

/// The (insofar) relevant metrics associated to a single glyph of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlyphMetrics {
    pub width: u32,
    pub height: u32,
}

/// A font face parsed from a TrueType font.
#[derive(Clone, Debug)]
struct TtfFontFace {
    inner: Arc<OwnedFace>,
    units_per_em: u16,
}

impl TtfFontFace {
    fn from_bytes(data: &[u8]) -> Result<Self, ContextError> {
        let face = OwnedFace::from_vec(data.to_vec(), 0)
            .map_err(|error| ContextError::with_error("Failed to parse the font", &error))?;
        let units_per_em = face.as_face_ref().units_per_em();

        Ok(Self {
            inner: Arc::new(face),
            units_per_em,
        })
    }

    fn face(&self) -> &Face<'_> {
        self.inner.as_face_ref()
    }

    fn font_metrics(&self) -> FontMetrics {
        FontMetrics {
            ascent: self.face().ascender(),
            descent: self.face().descender(),
            units_per_em: self.units_per_em,
        }
    }

    fn glyph_id(&self, codepoint: char) -> Option<u16> {
        self.face()
            .glyph_index(codepoint)
            .map(|glyph_id| glyph_id.0)
    }

    fn glyph_count(&self) -> u16 {
        self.face().number_of_glyphs()
    }

    /// Retrieve the mapping between the glyph IDs and the characters they draw, using
    /// only the unicode subtables of the font.
    fn glyph_ids(&self) -> HashMap<u16, char> {
        let font_subtables = self.face().tables().cmap.map(|cmap| {
            cmap.subtables
                .into_iter()
                .filter(|font_subtable| font_subtable.is_unicode())
        });
        let Some(font_subtables) = font_subtables else {
            return HashMap::new();
        };

        let mut gid_to_codepoint_map =
            HashMap::with_capacity(self.face().number_of_glyphs().into());
        for font_subtable in font_subtables {
            font_subtable.codepoints(|codepoint| {
                if let Ok(character) = char::try_from(codepoint) {
                    if let Some(glyph_index) = font_subtable
                        .glyph_index(codepoint)
                        .filter(|index| index.0 > 0)
                    {
                        gid_to_codepoint_map
                            .entry(glyph_index.0)
                            .or_insert(character);
                    }
                }
            })
        }

        gid_to_codepoint_map
    }

    fn glyph_metrics(&self, glyph_id: u16) -> Option<GlyphMetrics> {
        let glyph_id = owned_ttf_parser::GlyphId(glyph_id);
        let width = self.face().glyph_hor_advance(glyph_id)? as u32;
        // Fonts without a bounding box for the glyph default to a full em
        let height = self
            .face()
            .glyph_bounding_box(glyph_id)
            .map(|bounding_box| bounding_box.y_max - bounding_box.y_min - self.face().descender())
            .unwrap_or(1000) as u32;

        Some(GlyphMetrics { width, height })
    }
}

/// A TrueType font embedded into the document, addressed through 2-byte glyph IDs.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    bytes: Vec<u8>,
    ttf_face: TtfFontFace,
}

impl EmbeddedFont {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContextError> {
        let ttf_face = TtfFontFace::from_bytes(&bytes)?;
        Ok(EmbeddedFont { bytes, ttf_face })
    }

    pub fn from_path(font_path: &Path) -> Result<Self, ContextError> {
        let font_bytes = std::fs::read(font_path).map_err(|error| {
            ContextError::with_error(format!("Failed to read the font {:?}", font_path), &error)
        })?;
        Self::from_bytes(font_bytes).map_err(|error| {
            ContextError::with_error(format!("Failed to load the font {:?}", font_path), &error)
        })
    }

    fn text_width_in_font_units(&self, text: &str) -> u32 {
        text.nfc()
            .filter_map(|character| self.ttf_face.glyph_id(character))
            .filter_map(|glyph_id| self.ttf_face.glyph_metrics(glyph_id))
            .map(|glyph_metrics| glyph_metrics.width)
            .sum()
    }

    fn can_encode(&self, text: &str) -> bool {
        text.nfc()
            .all(|character| self.ttf_face.glyph_id(character).is_some())
    }

    fn encode_text(&self, text: &str) -> Vec<u8> {
        let mut glyph_id_bytes = Vec::new();
        for character in text.nfc() {
            if let Some(glyph_id) = self.ttf_face.glyph_id(character) {
                glyph_id_bytes.extend_from_slice(&glyph_id.to_be_bytes());
            } else {
                log::debug!("Unable to find the character {:?} in the font", character)
            }
        }
        glyph_id_bytes
    }

    /// Inserts the font program, its descriptor and its unicode mapping into the document,
    /// returning the dictionary of the composite font.
    fn insert_into_document(
        &self,
        face_identifier: &str,
        inner_document: &mut lopdf::Document,
    ) -> lopdf::Dictionary {
        use lopdf::Object::*;

        let face_metrics = self.ttf_face.font_metrics();

        let font_stream = lopdf::Stream::new(
            lopdf::Dictionary::from_iter(vec![("Length1", Integer(self.bytes.len() as i64))]),
            self.bytes.clone(),
        )
        .with_compression(false);

        let mut maximum_character_height = 0;
        let mut total_width = 0;
        // Glyph ID to the character it draws and its width
        let mut gid_to_glyph_properties_map = BTreeMap::<u32, (u32, u32)>::new();
        gid_to_glyph_properties_map.insert(0, (0, 1000));

        for (glyph_id, character) in self.ttf_face.glyph_ids() {
            if let Some(glyph_metrics) = self.ttf_face.glyph_metrics(glyph_id) {
                maximum_character_height = maximum_character_height.max(glyph_metrics.height);
                total_width += glyph_metrics.width;
                gid_to_glyph_properties_map
                    .insert(glyph_id as u32, (character as u32, glyph_metrics.width));
            }
        }

        // The `bfchar` blocks of the unicode mapping hold at most 100 entries, and every
        // entry of a block must share the high byte of its glyph ID
        let mut current_high_byte: u32 = 0;
        let mut all_cmap_blocks = Vec::new();
        let mut current_cmap_block = Vec::new();
        for (glyph_id, (character, _)) in gid_to_glyph_properties_map.iter() {
            if glyph_id >> 8 != current_high_byte || current_cmap_block.len() >= 100 {
                all_cmap_blocks.push(std::mem::take(&mut current_cmap_block));
                current_high_byte = glyph_id >> 8;
            }
            current_cmap_block.push((*glyph_id, *character));
        }
        all_cmap_blocks.push(current_cmap_block);

        let cid_to_unicode_map = generate_cid_to_unicode_map(face_identifier, all_cmap_blocks);
        let cid_to_unicode_map_stream_id = inner_document.add_object(lopdf::Stream::new(
            lopdf::Dictionary::new(),
            cid_to_unicode_map.into_bytes(),
        ));

        // Widths are written as runs of consecutive glyph IDs: `20 [21 99 34]` gives the
        // widths of the glyphs 20, 21 and 22, scaled to a 1000 unit em
        let font_scaling = 1000.0 / (face_metrics.units_per_em as f32);
        let mut width_objects = Vec::<Object>::new();
        let mut run_first_glyph_id = 0;
        let mut run_next_glyph_id = 0;
        let mut run_widths = Vec::<Object>::new();
        for glyph_id in 0..self.ttf_face.glyph_count() {
            let Some(GlyphMetrics { width, .. }) = self.ttf_face.glyph_metrics(glyph_id) else {
                log::warn!("Glyph ID {} has no width, skipping it", glyph_id);
                continue;
            };
            if glyph_id != run_next_glyph_id {
                width_objects.push(Integer(run_first_glyph_id as i64));
                width_objects.push(Array(std::mem::take(&mut run_widths)));
                run_first_glyph_id = glyph_id;
            }
            run_widths.push(Integer((width as f32 * font_scaling) as i64));
            run_next_glyph_id = glyph_id + 1;
        }
        width_objects.push(Integer(run_first_glyph_id as i64));
        width_objects.push(Array(run_widths));

        let font_bounding_box = vec![
            Integer(0),
            Integer(maximum_character_height as i64),
            Integer(total_width as i64),
            Integer(maximum_character_height as i64),
        ];
        let font_descriptor = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("FontDescriptor".into())),
            ("FontName", Name(face_identifier.into())),
            ("Ascent", Integer(i64::from(face_metrics.ascent))),
            ("Descent", Integer(i64::from(face_metrics.descent))),
            ("CapHeight", Integer(i64::from(face_metrics.ascent))),
            ("ItalicAngle", Integer(0)),
            ("Flags", Integer(32)),
            ("StemV", Integer(80)),
            ("FontFile2", Reference(inner_document.add_object(font_stream))),
            ("FontBBox", Array(font_bounding_box)),
        ]);
        let font_descriptor_id = inner_document.add_object(font_descriptor);

        let descendant_font = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("CIDFontType2".into())),
            ("BaseFont", Name(face_identifier.into())),
            (
                "CIDSystemInfo",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    ("Registry", String("Adobe".into(), StringFormat::Literal)),
                    ("Ordering", String("Identity".into(), StringFormat::Literal)),
                    ("Supplement", Integer(0)),
                ])),
            ),
            ("W", Array(width_objects)),
            ("DW", Integer(1000)),
            ("FontDescriptor", Reference(font_descriptor_id)),
        ]);

        lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("Type0".into())),
            ("BaseFont", Name(face_identifier.into())),
            ("Encoding", Name("Identity-H".into())),
            ("DescendantFonts", Array(vec![Dictionary(descendant_font)])),
            ("ToUnicode", Reference(cid_to_unicode_map_stream_id)),
        ])
    }
}

type GlyphId = u32;
type UnicodeCodePoint = u32;
type CmapBlock = Vec<(GlyphId, UnicodeCodePoint)>;

/// Generates the character map that lets PDF readers extract the text drawn with glyph IDs.
fn generate_cid_to_unicode_map(face_name: &str, all_cmap_blocks: Vec<CmapBlock>) -> String {
    let mut cid_to_unicode_map =
        format!(include_str!("../assets/gid_to_unicode_beg.txt"), face_name);

    for cmap_block in all_cmap_blocks
        .into_iter()
        .filter(|block| !block.is_empty())
    {
        cid_to_unicode_map.push_str(&format!("{} beginbfchar\r\n", cmap_block.len()));
        for (glyph_id, unicode) in cmap_block {
            cid_to_unicode_map.push_str(&format!("<{glyph_id:04x}> <{unicode:04x}>\n"));
        }
        cid_to_unicode_map.push_str("endbfchar\r\n");
    }

    cid_to_unicode_map.push_str(include_str!("../assets/gid_to_unicode_end.txt"));
    cid_to_unicode_map
}

/// A font the document text can be written in.
#[derive(Debug, Clone)]
pub enum FontFace {
    Standard(StandardFont),
    Embedded(EmbeddedFont),
}

impl FontFace {
    /// The width of the text once written with the given font size (in points), in millimeters.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let width_in_em = match self {
            FontFace::Standard(standard_font) => {
                let thousandths: u32 = standard_font
                    .encode_text(text)
                    .into_iter()
                    .map(|code| standard_font.glyph_width(code) as u32)
                    .sum();
                thousandths as f32 / 1000.0
            }
            FontFace::Embedded(embedded_font) => {
                embedded_font.text_width_in_font_units(text) as f32
                    / embedded_font.ttf_face.units_per_em as f32
            }
        };
        points_to_millimeters(width_in_em * font_size)
    }

    /// Whether every character of the text is printed as itself, not replaced or dropped.
    pub fn can_encode(&self, text: &str) -> bool {
        match self {
            FontFace::Standard(standard_font) => standard_font.can_encode(text),
            FontFace::Embedded(embedded_font) => embedded_font.can_encode(text),
        }
    }

    /// The bytes of the text as the `Tj` operator expects them for this font.
    pub fn encode_text(&self, text: &str) -> Vec<u8> {
        match self {
            FontFace::Standard(standard_font) => standard_font.encode_text(text),
            FontFace::Embedded(embedded_font) => embedded_font.encode_text(text),
        }
    }

    /// Inserts whatever the font needs into the document and returns its font dictionary.
    pub(crate) fn insert_into_document(
        &self,
        face_identifier: &str,
        inner_document: &mut lopdf::Document,
    ) -> lopdf::Dictionary {
        match self {
            FontFace::Standard(standard_font) => lopdf::Dictionary::from_iter(vec![
                ("Type", Object::Name("Font".into())),
                ("Subtype", Object::Name("Type1".into())),
                (
                    "BaseFont",
                    Object::Name(standard_font.base_font_name().into()),
                ),
                ("Encoding", Object::Name("WinAnsiEncoding".into())),
            ]),
            FontFace::Embedded(embedded_font) => {
                embedded_font.insert_into_document(face_identifier, inner_document)
            }
        }
    }
}

/// The regular and bold faces the invoice is written with.
#[derive(Debug, Clone)]
pub struct FontSet {
    pub regular: FontFace,
    pub bold: FontFace,
}

impl FontSet {
    /// Helvetica and Helvetica-Bold, which need no font file.
    pub fn standard() -> Self {
        FontSet {
            regular: FontFace::Standard(StandardFont::Helvetica),
            bold: FontFace::Standard(StandardFont::HelveticaBold),
        }
    }

    /// Loads the configured TrueType fonts, or the standard ones when none is configured.
    pub fn from_configuration(
        fonts_configuration: Option<&FontsConfiguration>,
    ) -> Result<Self, ContextError> {
        let Some(fonts_configuration) = fonts_configuration else {
            return Ok(Self::standard());
        };
        log::debug!("Loading the fonts {:?}", fonts_configuration);

        Ok(FontSet {
            regular: FontFace::Embedded(EmbeddedFont::from_path(
                &fonts_configuration.regular_font_path,
            )?),
            bold: FontFace::Embedded(EmbeddedFont::from_path(
                &fonts_configuration.bold_font_path,
            )?),
        })
    }

    pub fn face(&self, font_weight: FontWeight) -> &FontFace {
        match font_weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }

    /// The width in millimeters of the text written with the given weight and size in points.
    pub fn text_width(&self, text: &str, font_weight: FontWeight, font_size: f32) -> f32 {
        self.face(font_weight).text_width(text, font_size)
    }
}
