pub mod timeline;
pub mod timer;

pub use timeline::{Scheduled, Timeline};
pub use timer::{
    ms_to_ns, ns_to_ms, FrameTimingStats, HighPrecisionTimer, Timer, VirtualTimer,
};
