//! Text measurement against the faces of a `fontdb` database.

use statedag_render::text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use usvg::fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};

const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Splits a CSS `font-family` list into unquoted names.
pub fn split_families(list: &str) -> Vec<String> {
    list.split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn family(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" => Family::SansSerif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

/// Widths from the horizontal glyph advances of the best matching face.
///
/// Characters without a glyph take the `.notdef` advance. When no face matches the
/// requested families the measurement falls back to [`DeterministicTextMeasurer`].
pub struct FontdbTextMeasurer {
    db: Arc<Database>,
    default_families: Vec<String>,
    /// Face bytes copied out of the database once per face.
    faces: Mutex<HashMap<ID, Arc<(Vec<u8>, u32)>>>,
    fallback: DeterministicTextMeasurer,
}

impl std::fmt::Debug for FontdbTextMeasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontdbTextMeasurer")
            .field("faces", &self.db.len())
            .field("default_families", &self.default_families)
            .finish_non_exhaustive()
    }
}

impl FontdbTextMeasurer {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            default_families: vec!["sans-serif".to_string()],
            faces: Mutex::new(HashMap::new()),
            fallback: DeterministicTextMeasurer::default(),
        }
    }

    /// Measurer over the fonts installed on this machine.
    pub fn system() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts for text measurement");
        Self::new(Arc::new(db))
    }

    /// Families used when a [`TextStyle`] names none, as a CSS `font-family` list.
    pub fn with_default_families(mut self, families: &str) -> Self {
        let families = split_families(families);
        if !families.is_empty() {
            self.default_families = families;
        }
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The face text in `style` would be drawn with, if any.
    pub fn face_for(&self, style: &TextStyle) -> Option<ID> {
        let names = match style.font_family.as_deref().map(split_families) {
            Some(names) if !names.is_empty() => names,
            _ => self.default_families.clone(),
        };
        let families: Vec<Family<'_>> = names.iter().map(|n| family(n)).collect();
        self.db.query(&Query {
            families: &families,
            weight: Weight(style.font_weight.unwrap_or(400)),
            stretch: Stretch::Normal,
            style: Style::Normal,
        })
    }

    fn face_data(&self, id: ID) -> Option<Arc<(Vec<u8>, u32)>> {
        let mut faces = self.faces.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(data) = faces.get(&id) {
            return Some(data.clone());
        }
        let data = Arc::new(self.db.with_face_data(id, |bytes, index| (bytes.to_vec(), index))?);
        faces.insert(id, data.clone());
        Some(data)
    }

    /// Widest line of `lines`, in pixels at `font_size`.
    fn advance(&self, id: ID, lines: &[&str], font_size: f64) -> Option<f64> {
        let data = self.face_data(id)?;
        let face = ttf_parser::Face::parse(&data.0, data.1).ok()?;
        let units_per_em = f64::from(face.units_per_em().max(1));
        let notdef = face.glyph_hor_advance(ttf_parser::GlyphId(0)).unwrap_or(0);
        let widest = lines
            .iter()
            .map(|line| {
                line.chars()
                    .map(|ch| {
                        face.glyph_index(ch)
                            .and_then(|g| face.glyph_hor_advance(g))
                            .unwrap_or(notdef) as u64
                    })
                    .sum::<u64>()
            })
            .max()
            .unwrap_or(0);
        Some(widest as f64 * font_size / units_per_em)
    }
}

impl TextMeasurer for FontdbTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let lines = DeterministicTextMeasurer::normalized_text_lines(text);
        let font_size = style.font_size.max(1.0);
        let Some(width) = self
            .face_for(style)
            .and_then(|id| self.advance(id, &lines, font_size))
        else {
            return self.fallback.measure(text, style);
        };
        TextMetrics {
            width,
            height: lines.len() as f64 * font_size * LINE_HEIGHT_FACTOR,
            line_count: lines.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statedag_render::text::truncate_to_width;

    fn has_positive_advances(db: &Database, id: ID, chars: &str) -> bool {
        db.with_face_data(id, |bytes, index| {
            let Ok(face) = ttf_parser::Face::parse(bytes, index) else {
                return false;
            };
            chars.chars().all(|ch| {
                face.glyph_index(ch)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .is_some_and(|a| a > 0)
            })
        })
        .unwrap_or(false)
    }

    /// A family whose resolved face has real advances for the test text.
    fn usable_system_family(measurer: &FontdbTextMeasurer) -> Option<TextStyle> {
        let db = measurer.database();
        db.faces().find_map(|info| {
            let name = &info.families.first()?.0;
            let style = TextStyle::sized(12.0).family(format!("\"{name}\""));
            let id = measurer.face_for(&style)?;
            has_positive_advances(db, id, "customerlifetimvau_").then_some(style)
        })
    }

    #[test]
    fn families_are_split_and_unquoted() {
        assert_eq!(
            split_families("\"Source Sans 3\", Poppins, 'Noto Sans' , sans-serif"),
            vec!["Source Sans 3", "Poppins", "Noto Sans", "sans-serif"]
        );
        assert!(split_families(" , ").is_empty());
    }

    #[test]
    fn empty_database_falls_back_to_the_estimate() {
        let measurer = FontdbTextMeasurer::new(Arc::new(Database::new()));
        let style = TextStyle::sized(12.0).weight(500);
        assert!(measurer.face_for(&style).is_none());
        assert_eq!(
            measurer.measure("customer_id", &style).width,
            DeterministicTextMeasurer::default()
                .measure("customer_id", &style)
                .width
        );
    }

    #[test]
    fn widths_and_truncation_follow_real_glyph_advances() {
        let measurer = FontdbTextMeasurer::system();
        let Some(style) = usable_system_family(&measurer) else {
            eprintln!("no usable system font installed; skipping");
            return;
        };
        let face_id = measurer.face_for(&style).expect("face");

        let text = "customer_lifetime_value";
        let expected = measurer
            .database()
            .with_face_data(face_id, |bytes, index| {
                let face = ttf_parser::Face::parse(bytes, index).expect("parse face");
                let units: u64 = text
                    .chars()
                    .map(|ch| {
                        face.glyph_index(ch)
                            .and_then(|g| face.glyph_hor_advance(g))
                            .expect("advance") as u64
                    })
                    .sum();
                units as f64 * 12.0 / f64::from(face.units_per_em().max(1))
            })
            .expect("face data");
        let measured = measurer.measure(text, &style);
        assert!((measured.width - expected).abs() < 1e-9, "{measured:?} vs {expected}");
        assert_ne!(
            measured.width,
            DeterministicTextMeasurer::default().measure(text, &style).width
        );

        let budget = measurer.measure("customer_life…", &style).width;
        assert_eq!(
            truncate_to_width(&measurer, text, &style, budget),
            "customer_life…"
        );
    }
}
