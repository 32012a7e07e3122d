//! Theme derivation: descriptor types and the derivation engine.

pub mod descriptor;
pub mod engine;

pub use descriptor::{ThemeCategory, ThemeDescriptor, ThemePalette};
pub use engine::{CachedTheme, ThemeEngine, ThemeMode};
