//! Cross-cutting utilities (file-system helpers).

pub mod fs;
