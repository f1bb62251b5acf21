pub mod layout;
pub mod render;
pub mod stimulus;
pub mod text;

pub use layout::{Button, ResponseLayout};
pub use render::{FrameStats, Scene, SkiaRenderer};
pub use stimulus::{BUILTIN_DISK, load_stimulus};
pub use text::{TextCache, load_font, render_text_pixmap};
