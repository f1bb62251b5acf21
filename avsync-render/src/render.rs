use crate::layout::ResponseLayout;
use crate::text::{TextCache, blend_over};
use ab_glyph::FontArc;
use anyhow::{Result, ensure};
use avsync_core::{SessionStage, UserResponse};
use avsync_experiment::{SessionSummary, VisibleSet};
use avsync_timing::Timer;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Everything one frame shows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scene<'a> {
    pub stage: SessionStage,
    pub visible: VisibleSet,
    pub progress: Option<(usize, usize)>,
    pub summary: Option<&'a SessionSummary>,
    pub hovered: Option<UserResponse>,
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    fixation: Arc<Pixmap>,
    stimulus: Arc<Pixmap>,
    layout: ResponseLayout,
    text: Option<TextCache>,

    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    first_frame: bool,
}

impl SkiaRenderer {
    /// `font` is optional; without one the text on stage screens and
    /// controls is left out.
    pub fn new(width: u32, height: u32, stimulus: Pixmap, font: Option<FontArc>) -> Result<Self> {
        let canvas = Self::blank_canvas(width, height)?;
        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            fixation: Arc::new(fixation_cross()?),
            stimulus: Arc::new(stimulus),
            layout: ResponseLayout::new(width, height),
            text: font.map(|f| TextCache::new(f, 32.0)),
            canvas,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
        })
    }

    fn blank_canvas(width: u32, height: u32) -> Result<Pixmap> {
        let mut canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow::anyhow!("cannot allocate {width}x{height} canvas"))?;
        canvas.fill(Color::BLACK);
        Ok(canvas)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Self::blank_canvas(new_width, new_height)?;
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.layout = ResponseLayout::new(new_width, new_height);
        self.dirty_regions.clear();
        self.first_frame = true;
        Ok(())
    }

    pub fn layout(&self) -> &ResponseLayout {
        &self.layout
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draws `scene` and copies the changed regions into `frame_buffer`
    /// (RGBA8, same size as the renderer).
    pub fn render_frame<T: Timer>(
        &mut self,
        scene: &Scene<'_>,
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        ensure!(
            frame_buffer.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, expected {}",
            frame_buffer.len(),
            self.canvas.data().len()
        );
        let start = timer.now();

        if self.first_frame {
            self.first_frame = false;
            self.canvas.fill(Color::BLACK);
            frame_buffer.copy_from_slice(self.canvas.data());
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);
        let t = timer.now();
        self.clear_dirty(&old_dirty);
        let clear = timer.elapsed(t);

        let t = timer.now();
        self.draw_scene(scene);
        let draw = timer.elapsed(t);

        let mut present = old_dirty;
        present.extend_from_slice(&self.dirty_regions);
        coalesce_dirty(&mut present);

        let t = timer.now();
        for rect in &present {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let copy = timer.elapsed(t);

        Ok(FrameStats {
            clear,
            draw,
            copy,
            total: timer.elapsed(start),
            dirty_count: present.len(),
        })
    }

    fn draw_scene(&mut self, scene: &Scene<'_>) {
        match scene.stage {
            SessionStage::Enrollment | SessionStage::Questionnaire => {
                self.draw_lines(&["Preparing session..."], self.center.1);
            }
            SessionStage::Instructions => {
                self.draw_lines(
                    &[
                        "Watch the flash and listen for the beep.",
                        "Were they together, or was there a delay?",
                        "Press SPACE to begin",
                    ],
                    self.center.1 - 60.0,
                );
            }
            SessionStage::Trials => {
                if scene.visible.fixation {
                    let fixation = Arc::clone(&self.fixation);
                    self.blit(&fixation, self.center);
                }
                if scene.visible.stimulus {
                    let stimulus = Arc::clone(&self.stimulus);
                    self.blit(&stimulus, self.center);
                }
                if scene.visible.response_controls {
                    self.draw_controls(scene.hovered);
                }
                if let Some((current, total)) = scene.progress {
                    self.draw_text(&format!("Trial: {current}/{total}"), (self.center.0, 40.0));
                }
            }
            SessionStage::Complete => {
                let mut lines: Vec<String> = scene
                    .summary
                    .map(|s| s.lines().to_vec())
                    .unwrap_or_default();
                lines.push("Press R to restart or ESC to exit".to_string());
                let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
                self.draw_lines(&refs, self.center.1 - 60.0);
            }
        }
    }

    fn draw_controls(&mut self, hovered: Option<UserResponse>) {
        let mut paint = Paint::default();
        paint.anti_alias = false;
        for button in *self.layout.buttons() {
            let shade = if hovered == Some(button.response) { 110 } else { 70 };
            paint.set_color_rgba8(shade, shade, shade, 255);
            let Some(rect) = button.rect() else {
                continue;
            };
            self.canvas.fill_rect(rect, &paint, Transform::identity(), None);
            self.dirty_regions.push(rect);
            self.draw_text(button.label, button.center());
        }
    }

    fn draw_lines(&mut self, lines: &[&str], top: f32) {
        for (i, line) in lines.iter().enumerate() {
            self.draw_text(line, (self.center.0, top + i as f32 * 48.0));
        }
    }

    fn draw_text(&mut self, text: &str, pos: (f32, f32)) {
        let Some(pm) = self.text.as_mut().and_then(|cache| cache.get_or_render(text)) else {
            return;
        };
        self.blit(&pm, pos);
    }

    /// Composites `src` centered on `pos`, clipped to the canvas.
    fn blit(&mut self, src: &Pixmap, pos: (f32, f32)) {
        let (w, h) = (src.width() as i64, src.height() as i64);
        let (cw, ch) = (self.width as i64, self.height as i64);
        let x0 = (pos.0 - w as f32 * 0.5).floor() as i64;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i64;

        let dst_x = x0.max(0);
        let dst_y = y0.max(0);
        let dst_x_end = (x0 + w).min(cw);
        let dst_y_end = (y0 + h).min(ch);
        if dst_x_end <= dst_x || dst_y_end <= dst_y {
            return;
        }
        let (src_x, src_y) = (dst_x - x0, dst_y - y0);
        let copy_w = (dst_x_end - dst_x) as usize;

        let src_px = src.pixels();
        let dst_px = self.canvas.pixels_mut();
        for row in 0..(dst_y_end - dst_y) {
            let s = ((src_y + row) * w + src_x) as usize;
            let d = ((dst_y + row) * cw + dst_x) as usize;
            let src_row = &src_px[s..s + copy_w];
            let dst_row = &mut dst_px[d..d + copy_w];
            if src_row.iter().all(|p| p.alpha() == 255) {
                dst_row.copy_from_slice(src_row);
            } else {
                for (dp, sp) in dst_row.iter_mut().zip(src_row) {
                    *dp = blend_over(*sp, *dp);
                }
            }
        }

        if let Some(rect) = Rect::from_xywh(
            dst_x as f32,
            dst_y as f32,
            copy_w as f32,
            (dst_y_end - dst_y) as f32,
        ) {
            self.dirty_regions.push(rect);
        }
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        let data = self.canvas.data_mut();
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = clip(*rect, self.width, self.height) else {
                continue;
            };
            for y in y0..y1 {
                let off = y * stride;
                for px in data[off + x0 * 4..off + x1 * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&BACKGROUND);
                }
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = clip(dirty, self.width, self.height) else {
            return;
        };
        let stride = self.width as usize * 4;
        let data = self.canvas.data();
        for y in y0..y1 {
            let range = y * stride + x0 * 4..y * stride + x1 * 4;
            frame_buffer[range.clone()].copy_from_slice(&data[range]);
        }
    }
}

/// Pixel bounds of `rect` inside a `width`x`height` canvas.
fn clip(rect: Rect, width: u32, height: u32) -> Option<(usize, usize, usize, usize)> {
    let (w, h) = (width as f32, height as f32);
    let x0 = rect.x().floor().clamp(0.0, w) as usize;
    let y0 = rect.y().floor().clamp(0.0, h) as usize;
    let x1 = rect.right().ceil().clamp(0.0, w) as usize;
    let y1 = rect.bottom().ceil().clamp(0.0, h) as usize;
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

/// Merges touching rects that share a row band.
fn coalesce_dirty(rects: &mut Vec<Rect>) {
    rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
    let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
    for r in rects.drain(..) {
        if let Some(last) = out.last_mut() {
            let same_row =
                (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
            let touching = r.x() <= last.right() + 1.0;
            if same_row && touching {
                let nx = last.x().min(r.x());
                let nx2 = last.right().max(r.right());
                if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                    *last = merged;
                    continue;
                }
            }
        }
        out.push(r);
    }
    *rects = out;
}

/// 40x40 white cross with 2 px bars.
fn fixation_cross() -> Result<Pixmap> {
    let size = 40u32;
    let mut pm = Pixmap::new(size, size).ok_or_else(|| anyhow::anyhow!("fixation pixmap"))?;
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::WHITE);

    let bars = [
        Rect::from_xywh(0.0, (size as f32 - 2.0) * 0.5, size as f32, 2.0),
        Rect::from_xywh((size as f32 - 2.0) * 0.5, 0.0, 2.0, size as f32),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}
