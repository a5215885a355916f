//! Tool system for the canvas.

mod shortcuts;

pub use shortcuts::{Command, Shortcut, ShortcutRegistry, resolve_shortcut};

use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Text,
    Shape,
    Image,
    Document,
}

impl ToolKind {
    /// Tool bound to a single-key shortcut.
    pub fn from_shortcut(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'v' => Some(ToolKind::Select),
            't' => Some(ToolKind::Text),
            's' => Some(ToolKind::Shape),
            'i' => Some(ToolKind::Image),
            'd' => Some(ToolKind::Document),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Text => "text",
            ToolKind::Shape => "shape",
            ToolKind::Image => "image",
            ToolKind::Document => "document",
        }
    }
}

/// A prompt the host must show when a tool is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPrompt {
    /// Ask the user which shape to place.
    ShapeChooser,
    /// Open a file picker; `images_only` restricts it to image files.
    FilePicker { images_only: bool },
}

/// Tracks the active tool and whether it is waiting on a host prompt.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    awaiting: Option<ToolPrompt>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tools. Returns the prompt the new tool needs, if any.
    pub fn set_tool(&mut self, tool: ToolKind) -> Option<ToolPrompt> {
        self.current_tool = tool;
        self.awaiting = match tool {
            ToolKind::Shape => Some(ToolPrompt::ShapeChooser),
            ToolKind::Image => Some(ToolPrompt::FilePicker { images_only: true }),
            ToolKind::Document => Some(ToolPrompt::FilePicker { images_only: false }),
            ToolKind::Select | ToolKind::Text => None,
        };
        self.awaiting
    }

    /// The prompt still outstanding for the current tool.
    pub fn awaiting(&self) -> Option<ToolPrompt> {
        self.awaiting
    }

    /// Prompt finished or was dismissed: go back to selecting.
    pub fn finish(&mut self) {
        self.current_tool = ToolKind::Select;
        self.awaiting = None;
    }

    /// Prompt for the tool at a canvas click, for tools that prompt again
    /// on every click.
    pub fn prompt_on_click(&self) -> Option<ToolPrompt> {
        match self.current_tool {
            ToolKind::Image => Some(ToolPrompt::FilePicker { images_only: true }),
            ToolKind::Document => Some(ToolPrompt::FilePicker { images_only: false }),
            _ => None,
        }
    }
}
