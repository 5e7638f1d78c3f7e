//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, title/tab/status bars and overlays
//! - `input`: keyboard event handling
//! - `styles`: colors and text styling
//! - `tabs`: per-tab content (overview cards, tasks, payments, activity)

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
