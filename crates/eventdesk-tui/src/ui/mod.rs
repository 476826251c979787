//! Terminal UI module using ratatui.
//!
//! - `render`: Main frame rendering, layout and global overlays
//! - `events`: The paginated events table and the detail pane
//! - `dialogs`: Add/edit, registration and delete dialogs
//! - `input`: Keyboard event handling
//! - `styles`: Color schemes and text styling

pub mod dialogs;
pub mod events;
pub mod input;
pub mod render;
pub mod styles;
