use avsync_core::{ConfigError, StimulusRef};
use tiny_skia::{Color, ColorU8, FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::info;

pub const BUILTIN_DISK: &str = "builtin:disk";
pub const DISK_RADIUS: f32 = 80.0;

fn invalid(stimulus: &StimulusRef, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidStimulus {
        handle: stimulus.as_str().to_string(),
        reason: reason.into(),
    }
}

/// Resolves a stimulus handle to the pixmap shown during presentation.
/// `builtin:disk` draws a white disk; anything else is an image path.
pub fn load_stimulus(stimulus: &StimulusRef) -> Result<Pixmap, ConfigError> {
    if stimulus.is_empty() {
        return Err(ConfigError::EmptyStimulus);
    }
    let handle = stimulus.as_str().trim();
    if handle == BUILTIN_DISK {
        return disk_pixmap(DISK_RADIUS, Color::WHITE)
            .ok_or_else(|| invalid(stimulus, "cannot allocate disk"));
    }

    let image = image::open(handle)
        .map_err(|e| invalid(stimulus, e.to_string()))?
        .into_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(invalid(stimulus, "image has no pixels"));
    }
    let mut pm = Pixmap::new(image.width(), image.height())
        .ok_or_else(|| invalid(stimulus, "image too large"))?;
    for (dst, px) in pm.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = px.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    info!("Loaded stimulus {} ({}x{})", handle, pm.width(), pm.height());
    Ok(pm)
}

pub fn disk_pixmap(radius: f32, color: Color) -> Option<Pixmap> {
    let size = (radius * 2.0).ceil() as u32;
    let mut pixmap = Pixmap::new(size, size)?;
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    let mut pb = PathBuilder::new();
    pb.push_circle(radius, radius, radius);
    pixmap.fill_path(
        &pb.finish()?,
        &paint,
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Some(pixmap)
}
