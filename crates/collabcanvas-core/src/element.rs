//! Canvas elements and their kind-specific payloads.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use uuid::Uuid;

/// Free-form style properties (`fontSize`, `backgroundColor`, ...).
pub type Style = Map<String, Value>;

/// Default stacking order for elements persisted without one.
pub const DEFAULT_Z_INDEX: i64 = 1;

/// Placeholder text for freshly created text elements.
pub const DEFAULT_TEXT: &str = "Double click to edit";

/// Unique identifier for an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Generate a fresh element identifier.
    pub fn generate() -> Self {
        Self(format!("element_{}", Uuid::new_v4().simple()))
    }

    /// Generate a fresh identifier for a group element.
    pub fn generate_group() -> Self {
        Self(format!("group_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Element kind, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Shape,
    Image,
    Document,
    Group,
}

/// Shape variants offered by the shape chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Circle,
    Triangle,
    Diamond,
    Arrow,
    Line,
}

impl ShapeType {
    pub const ALL: [ShapeType; 6] = [
        ShapeType::Rectangle,
        ShapeType::Circle,
        ShapeType::Triangle,
        ShapeType::Diamond,
        ShapeType::Arrow,
        ShapeType::Line,
    ];

    /// Size a new shape of this type starts with.
    pub fn default_size(self) -> Size {
        match self {
            ShapeType::Rectangle => Size::new(150.0, 100.0),
            ShapeType::Circle => Size::new(100.0, 100.0),
            ShapeType::Triangle => Size::new(100.0, 87.0),
            ShapeType::Diamond => Size::new(100.0, 100.0),
            ShapeType::Arrow => Size::new(120.0, 60.0),
            ShapeType::Line => Size::new(150.0, 2.0),
        }
    }

    /// Fill color a new shape of this type starts with.
    pub fn fill_color(self) -> &'static str {
        match self {
            ShapeType::Rectangle => "#007bff",
            ShapeType::Circle => "#28a745",
            ShapeType::Triangle => "#ffc107",
            ShapeType::Diamond => "#dc3545",
            ShapeType::Arrow => "#6f42c1",
            ShapeType::Line => "#17a2b8",
        }
    }

    pub fn border_radius(self) -> &'static str {
        match self {
            ShapeType::Circle => "50%",
            _ => "4px",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeType::Rectangle => "rectangle",
            ShapeType::Circle => "circle",
            ShapeType::Triangle => "triangle",
            ShapeType::Diamond => "diamond",
            ShapeType::Arrow => "arrow",
            ShapeType::Line => "line",
        }
    }
}

fn default_z_index() -> i64 {
    DEFAULT_Z_INDEX
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A visual object on the canvas.
///
/// Serializes to the persisted element form:
/// `{id, type, x, y, width, height, content, style, zIndex}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub style: Style,
    #[serde(rename = "zIndex", default = "default_z_index")]
    pub z_index: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
}

impl Element {
    /// Axis-aligned bounds in canvas coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Check if a canvas point lies inside the element (edges included).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    pub fn is_group(&self) -> bool {
        self.kind == ElementKind::Group
    }

    /// Member identifiers of a group element. Empty for other kinds.
    pub fn group_members(&self) -> Vec<ElementId> {
        if !self.is_group() {
            return Vec::new();
        }
        self.content
            .get("elements")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(ElementId::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Shape type of a shape element, if recognized.
    pub fn shape_type(&self) -> Option<ShapeType> {
        if self.kind != ElementKind::Shape {
            return None;
        }
        self.content
            .get("shapeType")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Text of a text element.
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            ElementKind::Text => self.content.as_str(),
            _ => None,
        }
    }
}

/// An element about to be inserted into the store.
///
/// The identifier and stacking order are assigned by the store when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub id: Option<ElementId>,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: Value,
    pub style: Style,
    pub z_index: Option<i64>,
    pub locked: bool,
}

impl NewElement {
    pub fn new(kind: ElementKind, origin: Point, size: Size) -> Self {
        Self {
            id: None,
            kind,
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
            content: Value::Null,
            style: Style::new(),
            z_index: None,
            locked: false,
        }
    }

    /// A text element with the default placeholder and font settings.
    pub fn text(origin: Point) -> Self {
        let mut style = Style::new();
        style.insert("fontSize".into(), json!("16px"));
        style.insert("fontFamily".into(), json!("Arial, sans-serif"));
        style.insert("color".into(), json!("#333333"));
        style.insert("textAlign".into(), json!("left"));
        style.insert("fontWeight".into(), json!("normal"));

        let mut element = Self::new(ElementKind::Text, origin, Size::new(200.0, 50.0));
        element.content = json!(DEFAULT_TEXT);
        element.style = style;
        element
    }

    pub fn shape(shape_type: ShapeType, origin: Point) -> Self {
        let mut style = Style::new();
        style.insert("backgroundColor".into(), json!(shape_type.fill_color()));
        style.insert("borderRadius".into(), json!(shape_type.border_radius()));

        let mut element = Self::new(ElementKind::Shape, origin, shape_type.default_size());
        element.content = json!({ "shapeType": shape_type.name() });
        element.style = style;
        element
    }

    pub fn image(origin: Point, src: &str, alt: &str) -> Self {
        let mut element = Self::new(ElementKind::Image, origin, Size::new(200.0, 150.0));
        element.content = json!({ "src": src, "alt": alt });
        element
    }

    pub fn document(origin: Point, file_name: &str, file_type: &str, file_size: u64, url: &str) -> Self {
        let mut element = Self::new(ElementKind::Document, origin, Size::new(200.0, 120.0));
        element.content = json!({
            "fileName": file_name,
            "fileType": file_type,
            "fileSize": file_size,
            "url": url,
        });
        element
    }

    /// A group element spanning `bounds` with the given members.
    pub fn group(members: &[ElementId], bounds: Rect) -> Self {
        let mut element = Self::new(ElementKind::Group, bounds.origin(), bounds.size());
        element.id = Some(ElementId::generate_group());
        element.content = json!({ "elements": members });
        element
    }

    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = Some(z_index);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.width = size.width;
        self.height = size.height;
        self
    }
}

impl From<Element> for NewElement {
    fn from(element: Element) -> Self {
        Self {
            id: Some(element.id),
            kind: element.kind,
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
            content: element.content,
            style: element.style,
            z_index: Some(element.z_index),
            locked: element.locked,
        }
    }
}

/// A partial update. Only the fields that are set are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub content: Option<Value>,
    pub style: Option<Style>,
    pub z_index: Option<i64>,
    pub locked: Option<bool>,
}

impl ElementPatch {
    pub fn position(point: Point) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Default::default()
        }
    }

    pub fn frame(rect: Rect) -> Self {
        Self {
            x: Some(rect.x0),
            y: Some(rect.y0),
            width: Some(rect.width()),
            height: Some(rect.height()),
            ..Default::default()
        }
    }

    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn style_property(key: &str, value: Value) -> Self {
        let mut style = Style::new();
        style.insert(key.to_string(), value);
        Self {
            style: Some(style),
            ..Default::default()
        }
    }

    pub fn z_index(z_index: i64) -> Self {
        Self {
            z_index: Some(z_index),
            ..Default::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this patch to an element.
    ///
    /// Style keys merge into the existing style. Object content merges
    /// key-wise; any other content replaces the old value. Sizes that are not
    /// finite and positive are ignored, as are non-finite coordinates.
    pub fn apply(&self, element: &mut Element) {
        if let Some(x) = self.x.filter(|v| v.is_finite()) {
            element.x = x;
        }
        if let Some(y) = self.y.filter(|v| v.is_finite()) {
            element.y = y;
        }
        if let Some(width) = self.width.filter(|v| is_valid_extent(*v)) {
            element.width = width;
        }
        if let Some(height) = self.height.filter(|v| is_valid_extent(*v)) {
            element.height = height;
        }
        if let Some(content) = &self.content {
            match (&mut element.content, content) {
                (Value::Object(existing), Value::Object(incoming)) => {
                    for (key, value) in incoming {
                        existing.insert(key.clone(), value.clone());
                    }
                }
                (slot, incoming) => *slot = incoming.clone(),
            }
        }
        if let Some(style) = &self.style {
            for (key, value) in style {
                element.style.insert(key.clone(), value.clone());
            }
        }
        if let Some(z_index) = self.z_index {
            element.z_index = z_index;
        }
        if let Some(locked) = self.locked {
            element.locked = locked;
        }
    }
}

/// Width and height must be finite and strictly positive.
pub fn is_valid_extent(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Union of the bounds of the given elements.
pub fn union_bounds<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Option<Rect> {
    elements
        .into_iter()
        .map(Element::bounds)
        .reduce(|acc, r| acc.union(r))
}
