use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Color, ColorU8, Pixmap, PremultipliedColorU8};

/// Loads a TrueType/OpenType font from disk.
pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Source-over in premultiplied space.
pub(crate) fn blend_over(
    src: PremultipliedColorU8,
    dst: PremultipliedColorU8,
) -> PremultipliedColorU8 {
    let inv = 255 - u32::from(src.alpha());
    let mix = |s: u8, d: u8| (u32::from(s) + (u32::from(d) * inv + 127) / 255).min(255) as u8;
    PremultipliedColorU8::from_rgba(
        mix(src.red(), dst.red()),
        mix(src.green(), dst.green()),
        mix(src.blue(), dst.blue()),
        mix(src.alpha(), dst.alpha()),
    )
    .unwrap_or(src)
}

/// Rasterizes one line of text into a tight transparent pixmap. Returns
/// `None` when nothing in `text` has an outline.
pub fn render_text_pixmap(
    text: &str,
    font_size: f32,
    font: &FontArc,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // layout with the baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let first = outlines.first()?.px_bounds();
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (first.min.x, first.min.y, first.max.x, first.max.y);
    for out in &outlines[1..] {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();
    let base = color.to_color_u8();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i64;
            let iy = (y as f32 + b.min.y - min_y).floor() as i64;
            if ix < 0 || iy < 0 || ix >= i64::from(w) || iy >= i64::from(h) {
                return;
            }
            let i = iy as usize * stride + ix as usize;
            let alpha = (cov.clamp(0.0, 1.0) * f32::from(base.alpha())) as u8;
            let src =
                ColorU8::from_rgba(base.red(), base.green(), base.blue(), alpha).premultiply();
            dst[i] = blend_over(src, dst[i]);
        });
    }

    Some(pm)
}

/// Rendered labels keyed by their text.
pub struct TextCache {
    font: FontArc,
    size_px: f32,
    color: Color,
    map: HashMap<String, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            color: Color::WHITE,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(&mut self, text: &str) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(text) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(
            text,
            self.size_px,
            &self.font,
            self.color,
        )?);
        self.map.insert(text.to_string(), Arc::clone(&pm));
        Some(pm)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
