//! Alert policy.
//!
//! Decides, per frame, whether an animal alert holds and whether it is new
//! compared to the previous frame. The policy itself is a pure function; the
//! session owns the [`AlertState`] and applies each decision to it.

use crate::detect::Detection;

/// Labels that raise an alert.
pub const ANIMAL_VOCABULARY: [&str; 10] = [
    "dog", "cat", "cow", "elephant", "horse", "sheep", "bear", "zebra", "giraffe", "tiger",
];

/// Banner shown while an alert is active.
pub const ALERT_BANNER: &str = "⚠️ Animal Detected Ahead! Slow Down!";

pub fn is_animal(label: &str) -> bool {
    ANIMAL_VOCABULARY.contains(&label)
}

/// Detections that count towards an alert, in detector order.
pub fn qualifying<'a>(
    detections: &'a [Detection],
    threshold: f32,
) -> impl Iterator<Item = &'a Detection> + 'a {
    detections
        .iter()
        .filter(move |det| det.confidence >= threshold && is_animal(&det.label))
}

/// Outcome of evaluating one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertDecision {
    pub is_alert: bool,
    /// Label of the last qualifying detection, when alerting.
    pub label: Option<String>,
    /// Alerting with a label different from the previous frame's.
    pub is_new: bool,
}

/// Evaluate one frame's detections.
///
/// The alert label is taken from the *last* qualifying detection in the order
/// the detector returned them, not the most confident one.
pub fn evaluate(
    detections: &[Detection],
    threshold: f32,
    previous_label: Option<&str>,
) -> AlertDecision {
    let label = qualifying(detections, threshold)
        .last()
        .map(|det| det.label.clone());
    match label {
        Some(label) => AlertDecision {
            is_alert: true,
            is_new: previous_label != Some(label.as_str()),
            label: Some(label),
        },
        None => AlertDecision::default(),
    }
}

/// Alert memory carried across frames of one detection run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertState {
    last_alerted_label: Option<String>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alerted_label(&self) -> Option<&str> {
        self.last_alerted_label.as_deref()
    }

    /// Evaluate `detections` against the remembered label.
    pub fn evaluate(&self, detections: &[Detection], threshold: f32) -> AlertDecision {
        evaluate(detections, threshold, self.last_alerted_label())
    }

    /// Remember the decision's label, or forget it when the frame had no alert.
    pub fn observe(&mut self, decision: &AlertDecision) {
        self.last_alerted_label = if decision.is_alert {
            decision.label.clone()
        } else {
            None
        };
    }

    pub fn reset(&mut self) {
        self.last_alerted_label = None;
    }
}
