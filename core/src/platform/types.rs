use serde::{Deserialize, Serialize};

/// Identity of a visible OS window: owning process name plus its 1-based
/// window index within that process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRef {
    pub app_name: String,
    pub window_title: String,
    #[serde(default)]
    pub index: Option<u32>,
}

impl WindowRef {
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>, index: Option<u32>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
            index,
        }
    }

    pub fn window_index(&self) -> u32 {
        self.index.unwrap_or(1)
    }

    pub fn is_same_window(&self, other: &WindowRef) -> bool {
        self.app_name.eq_ignore_ascii_case(&other.app_name)
            && self.window_index() == other.window_index()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmostWindow {
    pub app_name: String,
    pub window_title: String,
}

impl FrontmostWindow {
    /// The frontmost window is always the first window of its process.
    pub fn as_window_ref(&self) -> WindowRef {
        WindowRef::new(self.app_name.clone(), self.window_title.clone(), Some(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowBounds {
    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// Region of the screen in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Paste,
    Tab,
    Char(char),
}
