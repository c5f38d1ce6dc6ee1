//! Small shared utilities.

mod text;

pub use text::strip_control_chars;
