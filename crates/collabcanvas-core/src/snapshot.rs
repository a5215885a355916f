//! Persisted document form.

use crate::element::Element;
use serde::{Deserialize, Serialize};

/// Canvas color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

fn default_zoom() -> f64 {
    1.0
}

/// View settings saved alongside the elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            zoom: default_zoom(),
        }
    }
}

/// A value copy of the whole document: `{elements, settings}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub settings: ViewSettings,
}

impl DocumentSnapshot {
    pub fn new(elements: Vec<Element>, settings: ViewSettings) -> Self {
        Self { elements, settings }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Compare element lists only, ignoring view settings.
    pub fn same_elements(&self, other: &DocumentSnapshot) -> bool {
        self.elements == other.elements
    }
}
