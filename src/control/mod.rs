//! Control surface and autostart

pub mod autostart;
pub mod surface;

pub use autostart::{
    platform_autostart, AutostartProvider, LaunchAgentAutostart, MemoryAutostart,
    UnsupportedAutostart, XdgAutostart, DEFAULT_LABEL,
};
pub use surface::{validate_threshold, ControlSurface, ErrorPayload};
