//! Keyboard shortcut constants for consistent documentation.

pub const SUBMIT: &str = "Enter";
pub const CONTEXT_MENU: &str = "F2";
pub const THEME: &str = "F3";
pub const QUIT: &str = "Esc";
pub const FOCUS_QUERY: &str = "/";

// Pages and chart
pub const PAGE_NEXT: &str = "Tab";
pub const PAGE_PREV: &str = "Shift+Tab";
pub const CHART_CURSOR: &str = "Left/Right";
pub const CHART_JUMP: &str = "Enter";

// Rows
pub const ROW_NAV: &str = "Up/Down";
pub const OPEN: &str = "o";
pub const COMMAND: &str = "y";
pub const EXPORT: &str = "e";
