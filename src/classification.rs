//! Post-processing for the outputs of classification models.

use crate::value::LabeledValues;

/// Decay rate used by [`smooth_classification`] when none is specified.
pub const DEFAULT_DECAY: f32 = 0.8;

/// Threshold used by [`smooth_classification`] when none is specified.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Return up to `n` entries with the highest values at or above `threshold`,
/// ordered from highest to lowest.
///
/// Entries with equal values keep their label order.
pub fn top_n(values: &LabeledValues, n: usize, threshold: f32) -> Vec<(String, f32)> {
    let mut entries: Vec<(&str, f32)> = values.iter().filter(|(_, v)| *v >= threshold).collect();
    entries.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    entries
        .into_iter()
        .take(n)
        .map(|(label, v)| (label.to_string(), v))
        .collect()
}

/// Apply exponential decay smoothing to successive classification results.
///
/// Each output value is `decay * previous + (1 - decay) * current`, where a
/// label missing from either input counts as zero. Entries below `threshold`
/// are dropped. Labels from `previous` come first, followed by labels that
/// only appear in `current`.
pub fn smooth_classification(
    previous: &LabeledValues,
    current: &LabeledValues,
    decay: f32,
    threshold: f32,
) -> LabeledValues {
    let update = 1. - decay;
    let mut combined: LabeledValues = previous
        .iter()
        .map(|(label, v)| (label.to_string(), v * decay))
        .collect();

    for (label, v) in current.iter() {
        let prev = combined.get(label).unwrap_or(0.);
        combined.insert(label, prev + v * update);
    }

    combined
        .into_vec()
        .into_iter()
        .filter(|(_, v)| *v >= threshold)
        .collect()
}
