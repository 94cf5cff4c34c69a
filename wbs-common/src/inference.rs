//! Missing-weight inference
//!
//! When a box's label yields a product but no weight, the weight still owed
//! on that invoice line is spread over the boxes still owed:
//!
//! - `remaining_weight = quantity_kg - Σ(known weights of other boxes of the item)`
//! - `remaining_boxes = expected_boxes - count(those boxes) - 1` (this box)
//! - `remaining_boxes <= 0`: this is the last box, suggest the whole remainder
//! - otherwise: suggest `remaining_weight / (remaining_boxes + 1)`
//!
//! The result is a suggestion for the person resolving the box; it is never
//! written to the session automatically.

/// Suggest a weight for one more box of an item
///
/// `other_known_weights` are the weights of the item's other boxes whose
/// weight is known. Returns `None` when nothing positive is left to assign.
pub fn infer_weight(
    quantity_kg: f64,
    expected_boxes: u32,
    other_known_weights: &[f64],
) -> Option<f64> {
    let known: f64 = other_known_weights.iter().sum();
    let remaining_weight = quantity_kg - known;
    if !remaining_weight.is_finite() || remaining_weight <= 0.0 {
        return None;
    }

    let remaining_boxes = i64::from(expected_boxes) - other_known_weights.len() as i64 - 1;
    if remaining_boxes <= 0 {
        Some(remaining_weight)
    } else {
        Some(remaining_weight / (remaining_boxes + 1) as f64)
    }
}
