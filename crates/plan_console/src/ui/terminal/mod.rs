pub mod app;
pub mod continuation;
pub mod escape;
pub mod indicator;
pub mod keys;
pub mod line_editor;
pub mod output_gate;
pub mod screen;
pub mod select_menu;
pub mod session_context;
pub mod streaming;
pub mod style;
pub mod tui;
pub mod welcome_banner;
