/// glyphgrid application layer.
///
/// The frame loop ([`session::Session`]), config hot-reload, headless PNG
/// export, and the interactive terminal editor.

pub mod app;
pub mod cli;
pub mod export;
pub mod hotreload;
pub mod session;
