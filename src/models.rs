use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlapping region, or `None` when the boxes are disjoint. Touching
    /// edges yield a zero-area intersection.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    pub fn expand(&self, margin: &Margin) -> Rect {
        Rect::new(
            self.x - margin.left,
            self.y - margin.top,
            self.width + margin.left + margin.right,
            self.height + margin.top + margin.bottom,
        )
    }
}

/// Root margin around the viewport; negative values shrink it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margin {
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTask {
    pub element: ElementId,
    pub start: i64,
    pub end: i64,
    pub duration: Duration,
    pub suffix: String,
}

impl AnimationTask {
    pub fn new(element: ElementId, start: i64, end: i64, duration: Duration) -> Self {
        Self {
            element,
            start,
            end,
            duration,
            suffix: String::new(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub field: ElementId,
    pub error: Option<ValidationError>,
    pub message: String,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportObservation {
    pub element: ElementId,
    pub intersecting: bool,
    pub triggered: bool,
}

impl ViewportObservation {
    pub fn new(element: ElementId) -> Self {
        Self {
            element,
            intersecting: false,
            triggered: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Email,
    Other,
}

impl FieldType {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("text") => Self::Text,
            Some(kind) if kind.eq_ignore_ascii_case("email") => Self::Email,
            Some(_) => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub required: bool,
    pub kind: FieldType,
}

impl FieldSpec {
    pub fn is_constrained(&self) -> bool {
        self.required || self.kind == FieldType::Email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_intersect_with_zero_area() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 5.0, 5.0);
        let hit = a.intersection(&b).expect("edges touch");
        assert_eq!(hit.area(), 0.0);
        assert!(a.intersection(&Rect::new(11.0, 0.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn negative_margin_shrinks_root() {
        let root = Rect::new(0.0, 0.0, 800.0, 600.0).expand(&Margin::new(0.0, 0.0, -50.0, 0.0));
        assert_eq!(root.bottom(), 550.0);
        assert_eq!(root.width, 800.0);
    }

    #[test]
    fn field_type_parsing() {
        assert_eq!(FieldType::parse(None), FieldType::Text);
        assert_eq!(FieldType::parse(Some("EMAIL")), FieldType::Email);
        assert_eq!(FieldType::parse(Some("tel")), FieldType::Other);
    }
}
