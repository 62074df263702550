use crate::error::{ReportError, Result};
use crate::types::Pt;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Families the report layout draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Arimo,
    CanvaSans,
    IbmPlexSans,
    ItcAvantGardeCondensed,
}

impl FontFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontFamily::Arimo => "Arimo",
            FontFamily::CanvaSans => "CanvaSans",
            FontFamily::IbmPlexSans => "IBMPlexSans",
            FontFamily::ItcAvantGardeCondensed => "ITCAvantGardeCondensed",
        }
    }
}

/// Font files shipped with the report assets, by family and weight.
pub const REPORT_FONT_FILES: [(FontFamily, FontWeight, &str); 5] = [
    (FontFamily::IbmPlexSans, FontWeight::Bold, "IBMPlexSans-Bold.ttf"),
    (FontFamily::ItcAvantGardeCondensed, FontWeight::Normal, "ITC-CE-Book.otf"),
    (FontFamily::ItcAvantGardeCondensed, FontWeight::Bold, "ITCAvantGardeStd-Bold.ttf"),
    (FontFamily::CanvaSans, FontWeight::Normal, "CanvaSans-Regular.otf"),
    (FontFamily::Arimo, FontWeight::Bold, "Arimo-Bold.ttf"),
];

/// Canvas font name for a family/weight pair, e.g. `Arimo-Bold`.
pub fn font_key(family: FontFamily, weight: FontWeight) -> String {
    match weight {
        FontWeight::Normal => family.as_str().to_string(),
        FontWeight::Bold => format!("{}-Bold", family.as_str()),
    }
}

/// Base-14 substitute used when a font key has no registered program.
pub fn base14_fallback(key: &str) -> &'static str {
    if key.ends_with("-Bold") {
        "Helvetica-Bold"
    } else {
        "Helvetica"
    }
}

#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) key: String,
    pub(crate) postscript_name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every known report font found in `dir`. Missing or
    /// unreadable files are skipped and drawn with a base-14 substitute.
    pub fn register_report_fonts(&mut self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        let mut registered = 0;
        for (family, weight, file) in REPORT_FONT_FILES {
            let path = dir.join(file);
            match self.register_file(family, weight, &path) {
                Ok(()) => registered += 1,
                Err(err) => log::warn!("font {} not registered: {}", path.display(), err),
            }
        }
        registered
    }

    pub fn register_file(
        &mut self,
        family: FontFamily,
        weight: FontWeight,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let data = fs::read(path.as_ref())?;
        self.register_bytes(family, weight, data)
    }

    pub fn register_bytes(
        &mut self,
        family: FontFamily,
        weight: FontWeight,
        data: Vec<u8>,
    ) -> Result<()> {
        let key = font_key(family, weight);
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| ReportError::Asset(format!("invalid font data for {key}: {err}")))?;
        let postscript_name = face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|name| name.to_string())
            .unwrap_or_else(|| key.clone());
        let (metrics, program_kind) = FontMetrics::from_face(&face);
        drop(face);

        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            key: key.clone(),
            postscript_name,
            data,
            metrics,
            program_kind,
        });
        self.lookup.insert(key, index);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Canvas font name for `family` at `weight`, falling back to the
    /// family's other weight when only that one is registered.
    pub fn key_for(&self, family: FontFamily, weight: FontWeight) -> String {
        let key = font_key(family, weight);
        if self.lookup.contains_key(&key) {
            return key;
        }
        let other = match weight {
            FontWeight::Normal => FontWeight::Bold,
            FontWeight::Bold => FontWeight::Normal,
        };
        let other_key = font_key(family, other);
        if self.lookup.contains_key(&other_key) {
            other_key
        } else {
            key
        }
    }

    pub(crate) fn resolve(&self, key: &str) -> Option<&RegisteredFont> {
        self.lookup.get(key).and_then(|index| self.fonts.get(*index))
    }

    /// Advance width of `text` set at `font_size` with `char_spacing` added
    /// after every character.
    pub fn measure_text_width(
        &self,
        key: &str,
        font_size: Pt,
        char_spacing: Pt,
        text: &str,
    ) -> Pt {
        let mut units: i64 = 0;
        let mut count: i64 = 0;
        match self.resolve(key) {
            Some(font) => {
                for ch in text.chars() {
                    units += font.metrics.advance_for_char(ch) as i64;
                    count += 1;
                }
            }
            None => {
                for ch in text.chars() {
                    units += base14_width(key, ch) as i64;
                    count += 1;
                }
            }
        }
        let spacing = Pt::from_milli_i64(char_spacing.to_milli_i64().saturating_mul(count));
        font_size.mul_per_mille(units) + spacing
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let widths = (first_char..=last_char)
            .map(|code| {
                winansi_to_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|id| face.glyph_hor_advance(id))
                    .map(|advance| (advance as f32 * scale).round().clamp(0.0, u16::MAX as f32) as u16)
                    .unwrap_or(0)
            })
            .collect::<Vec<_>>();
        let missing_width = widths.first().copied().unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);

        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                first_char,
                last_char,
                widths,
                ascent,
                descent,
                cap_height,
                italic_angle,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
            },
            program_kind,
        )
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        let Some(code) = char_to_winansi(ch) else {
            return self.missing_width;
        };
        if code < self.first_char || code > self.last_char {
            return self.missing_width;
        }
        let idx = (code - self.first_char) as usize;
        match self.widths.get(idx).copied() {
            Some(0) | None => self.missing_width,
            Some(width) => width,
        }
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    (value as f32 * scale).round() as i16
}

// cp1252 code points 0x80..=0x9F; zero marks an unassigned slot.
const WINANSI_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

pub(crate) fn winansi_to_char(code: u8) -> Option<char> {
    match code {
        0x80..=0x9F => {
            let cp = WINANSI_HIGH[(code - 0x80) as usize];
            if cp == 0 { None } else { char::from_u32(cp) }
        }
        _ => Some(code as char),
    }
}

pub(crate) fn char_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    match cp {
        0x00..=0x7F | 0xA0..=0xFF => Some(cp as u8),
        _ => WINANSI_HIGH
            .iter()
            .position(|value| *value == cp && cp != 0)
            .map(|idx| 0x80 + idx as u8),
    }
}

// Base-14 AFM advance widths for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Advance of `ch` in the base-14 face `key` falls back to.
fn base14_width(key: &str, ch: char) -> u16 {
    let widths = if base14_fallback(key) == "Helvetica-Bold" {
        &HELVETICA_BOLD_WIDTHS
    } else {
        &HELVETICA_WIDTHS
    };
    match ch {
        ' '..='~' => widths[ch as usize - 0x20],
        '\u{00A0}' => widths[0],
        _ => widths[('n' as usize) - 0x20],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_weight_suffix() {
        assert_eq!(font_key(FontFamily::Arimo, FontWeight::Bold), "Arimo-Bold");
        assert_eq!(
            font_key(FontFamily::ItcAvantGardeCondensed, FontWeight::Normal),
            "ITCAvantGardeCondensed"
        );
        assert_eq!(base14_fallback("IBMPlexSans-Bold"), "Helvetica-Bold");
        assert_eq!(base14_fallback("CanvaSans"), "Helvetica");
    }

    #[test]
    fn unregistered_font_measures_with_helvetica_widths() {
        let registry = FontRegistry::new();
        let width = registry.measure_text_width("Arimo", Pt::from_f32(10.0), Pt::ZERO, "Il");
        // (278 + 222) / 1000 * 10
        assert_eq!(width.to_milli_i64(), 5_000);
        let spaced = registry.measure_text_width("Arimo", Pt::from_f32(10.0), Pt::from_f32(0.5), "Il");
        assert_eq!(spaced.to_milli_i64(), 6_000);
    }

    #[test]
    fn unregistered_bold_keys_measure_with_bold_widths() {
        let registry = FontRegistry::new();
        let key = registry.key_for(FontFamily::IbmPlexSans, FontWeight::Bold);
        assert_eq!(base14_fallback(&key), "Helvetica-Bold");
        let size = Pt::from_f32(6.0);
        let text = "1.20 Carat little ring";
        let bold = registry.measure_text_width(&key, size, Pt::ZERO, text);
        let regular = registry.measure_text_width("IBMPlexSans", size, Pt::ZERO, text);
        assert!(bold > regular);
        // "Il" in Helvetica-Bold: (278 + 611) / 1000 * 10
        let il = registry.measure_text_width(&key, Pt::from_f32(10.0), Pt::ZERO, "Il");
        assert_eq!(il.to_milli_i64(), 8_890);
    }

    #[test]
    fn winansi_round_trips_high_range() {
        assert_eq!(char_to_winansi('\u{20AC}'), Some(0x80));
        assert_eq!(winansi_to_char(0x80), Some('\u{20AC}'));
        assert_eq!(char_to_winansi('\u{00A0}'), Some(0xA0));
        assert_eq!(char_to_winansi('\u{4E2D}'), None);
        assert_eq!(winansi_to_char(0x81), None);
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(FontFamily::Arimo, FontWeight::Bold, vec![0, 1, 2, 3])
            .unwrap_err();
        assert!(err.to_string().contains("Arimo-Bold"));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregistered_weights_keep_their_own_key() {
        let registry = FontRegistry::new();
        assert_eq!(registry.key_for(FontFamily::Arimo, FontWeight::Normal), "Arimo");
        assert_eq!(
            registry.key_for(FontFamily::IbmPlexSans, FontWeight::Bold),
            "IBMPlexSans-Bold"
        );
    }

    #[test]
    fn missing_font_directory_registers_nothing() {
        let mut registry = FontRegistry::new();
        let dir = std::env::temp_dir().join(format!("gemreport_no_fonts_{}", std::process::id()));
        assert_eq!(registry.register_report_fonts(&dir), 0);
    }
}
