use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use usvg::fontdb;

// Tried in order after the configured family; fontdb stops at the first hit.
const SYSTEM_FAMILIES: &[&str] = &["DejaVu Sans", "Noto Sans", "Liberation Sans", "Arial"];

#[derive(Clone)]
pub struct OverlayFont {
    data: Arc<Vec<u8>>,
    index: u32,
    family: String,
    units_per_em: f64,
}

impl fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayFont")
            .field("family", &self.family)
            .field("index", &self.index)
            .finish()
    }
}

impl OverlayFont {
    pub fn load(path: Option<&Path>, family: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let data = std::fs::read(path)
                    .with_context(|| format!("failed to read font: {}", path.display()))?;
                Self::from_data(data, 0, family)
                    .with_context(|| format!("failed to parse font: {}", path.display()))
            }
            None => Self::from_system(family),
        }
    }

    pub fn from_system(family: Option<&str>) -> Result<Self> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let mut families: Vec<fontdb::Family<'_>> = family
            .into_iter()
            .map(fontdb::Family::Name)
            .collect();
        families.extend(SYSTEM_FAMILIES.iter().map(|name| fontdb::Family::Name(name)));
        families.push(fontdb::Family::SansSerif);

        let id = db
            .query(&fontdb::Query {
                families: &families,
                ..Default::default()
            })
            .ok_or_else(|| match family {
                Some(name) => anyhow!("font family not installed: {}", name),
                None => anyhow!("no sans-serif font installed"),
            })?;
        let (data, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| anyhow!("font data unavailable"))?;
        let name = db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()));
        Self::from_data(data, index, name.as_deref())
    }

    pub fn from_data(data: Vec<u8>, index: u32, family: Option<&str>) -> Result<Self> {
        let face = Face::parse(&data, index).map_err(|err| anyhow!("{}", err))?;
        let units_per_em = f64::from(face.units_per_em().max(1));
        let family = family
            .map(str::to_string)
            .or_else(|| face_family(&face))
            .unwrap_or_else(|| "sans-serif".to_string());
        Ok(Self {
            data: Arc::new(data),
            index,
            family,
            units_per_em,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    // Glyphs the face lacks are estimated, scaled into its units.
    pub fn measure(&self, text: &str, font_size: f64) -> f64 {
        let Ok(face) = Face::parse(&self.data, self.index) else {
            return estimate_width(text, font_size);
        };
        let units: f64 = text
            .chars()
            .filter(|ch| !ch.is_control())
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(f64::from)
                    .unwrap_or_else(|| em_width(ch) * self.units_per_em)
            })
            .sum();
        units / self.units_per_em * font_size
    }
}

pub fn measure_text_width(text: &str, font_size: f64, font: Option<&OverlayFont>) -> f64 {
    match font {
        Some(font) => font.measure(text, font_size),
        None => estimate_width(text, font_size),
    }
}

fn estimate_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .filter(|ch| !ch.is_control())
        .map(em_width)
        .sum::<f64>()
        * font_size
}

fn em_width(ch: char) -> f64 {
    match ch {
        ' ' | '\t' => 0.3,
        'A'..='Z' | '0'..='9' => 0.62,
        'a'..='z' => 0.52,
        _ if ch.is_ascii() => 0.35,
        '\u{1100}'..='\u{115F}'
        | '\u{2E80}'..='\u{A4CF}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FF60}' => 1.0,
        _ => 0.6,
    }
}

fn face_family(face: &Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .find_map(|name| name.to_string())
}
