use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Corners")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Unchecked corners as they appear in detection scripts.
#[derive(Deserialize)]
struct Corners {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl TryFrom<Corners> for BoundingBox {
    type Error = String;

    fn try_from(c: Corners) -> Result<Self, Self::Error> {
        BoundingBox::new(c.x1, c.y1, c.x2, c.y2).ok_or_else(|| {
            format!(
                "degenerate bounding box ({}, {}, {}, {})",
                c.x1, c.y1, c.x2, c.y2
            )
        })
    }
}

impl BoundingBox {
    /// Returns `None` for degenerate boxes.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Build from float corners, clamped to a `width` x `height` frame.
    pub fn from_corners_clamped(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        let clamp = |v: f32, max: u32| -> i32 {
            if v.is_finite() {
                v.max(0.0).min(max as f32) as i32
            } else {
                0
            }
        };
        Self::new(
            clamp(x1, width),
            clamp(y1, height),
            clamp(x2, width),
            clamp(y2, height),
        )
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        let inter = ((r - l).max(0) as i64) * ((b - t).max(0) as i64);
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }
}

/// One candidate object found in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// Model score in `0.0..=1.0`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// Caption drawn next to the box, e.g. `horse (0.62)`.
    pub fn caption(&self) -> String {
        format!("{} ({:.2})", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes_are_rejected() {
        assert!(BoundingBox::new(0, 0, 10, 10).is_some());
        assert!(BoundingBox::new(10, 0, 10, 10).is_none());
        assert!(BoundingBox::new(0, 5, 10, 2).is_none());
    }

    #[test]
    fn deserializing_checks_corners() {
        let bbox: BoundingBox =
            serde_json::from_str(r#"{"x1": 1, "y1": 2, "x2": 3, "y2": 4}"#).unwrap();
        assert_eq!(bbox, BoundingBox::new(1, 2, 3, 4).unwrap());
        let err = serde_json::from_str::<BoundingBox>(r#"{"x1": 5, "y1": 0, "x2": 5, "y2": 4}"#)
            .unwrap_err();
        assert!(err.to_string().contains("degenerate bounding box"));
    }

    #[test]
    fn float_corners_are_clamped_to_frame() {
        let bbox = BoundingBox::from_corners_clamped(-5.0, 3.7, 700.2, 80.0, 640, 480)
            .expect("bbox");
        assert_eq!(bbox, BoundingBox { x1: 0, y1: 3, x2: 640, y2: 80 });
        assert!(BoundingBox::from_corners_clamped(f32::NAN, 0.0, 0.0, 1.0, 10, 10).is_none());
    }

    #[test]
    fn iou_of_overlapping_boxes() {
        let a = BoundingBox::new(0, 0, 10, 10).unwrap();
        let b = BoundingBox::new(5, 0, 15, 10).unwrap();
        let iou = a.iou(&b);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn caption_uses_two_decimals() {
        let det = Detection::new(BoundingBox::new(0, 0, 1, 1).unwrap(), "horse", 0.618);
        assert_eq!(det.caption(), "horse (0.62)");
    }
}
