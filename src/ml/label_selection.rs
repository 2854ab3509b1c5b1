//! 出力ベクトルからのラベル選択

use serde::Serialize;

use crate::model::InferenceConfig;

/// モデル出力（ラベル表と同じ順のconfidence）
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVector(pub Vec<f32>);

impl OutputVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for OutputVector {
    fn from(values: Vec<f32>) -> Self {
        OutputVector(values)
    }
}

/// 選択されたラベル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelSelection {
    pub index: usize,
    pub label: String,
    /// 採用されたクラスのconfidence（フォールバック時は `None`）
    pub confidence: Option<f32>,
    /// しきい値を超えるクラスが無かった
    pub fallback: bool,
}

/// しきい値以上のクラスのうち最大のものを返す
///
/// 同値の最大が複数ある場合は小さいインデックスを優先する。
/// NaN は採用されない。
pub fn best_accepted(confidences: &[f32], threshold: f32) -> Option<(usize, f32)> {
    confidences
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, c)| c >= threshold)
        .fold(None, |best, (i, c)| match best {
            Some((_, best_c)) if best_c >= c => best,
            _ => Some((i, c)),
        })
}

/// 出力ベクトルからラベルを選択
///
/// 採用クラスが無い、またはラベル表の範囲外の場合は `config.fallback_index` のラベルを返す。
pub fn select_label(output: &OutputVector, config: &InferenceConfig) -> LabelSelection {
    let accepted = best_accepted(output.as_slice(), config.acceptance_threshold).and_then(
        |(index, confidence)| Some((index, config.class_index_to_label(index)?, confidence)),
    );

    match accepted {
        Some((index, label, confidence)) => LabelSelection {
            index,
            label: label.to_string(),
            confidence: Some(confidence),
            fallback: false,
        },
        None => LabelSelection {
            index: config.fallback_index,
            label: config.fallback_label().to_string(),
            confidence: None,
            fallback: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(values: [f32; 8]) -> LabelSelection {
        select_label(&OutputVector(values.to_vec()), &InferenceConfig::default())
    }

    #[test]
    fn test_single_accepted_class() {
        let s = select([0.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.1, 0.0]);
        assert_eq!(s.index, 2);
        assert_eq!(s.label, "Cutting Weevil");
        assert_eq!(s.confidence, Some(0.9));
        assert!(!s.fallback);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let s = select([0.85, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.label, "Anthracnose");
    }

    #[test]
    fn test_fallback_when_nothing_accepted() {
        let s = select([0.84, 0.1, 0.0, 0.0, 0.0, 0.0, 0.05, 0.01]);
        assert_eq!(s.index, 5);
        assert_eq!(s.label, "Healthy Leaf");
        assert_eq!(s.confidence, None);
        assert!(s.fallback);
    }

    #[test]
    fn test_highest_accepted_wins() {
        let s = select([0.0, 0.86, 0.0, 0.0, 0.0, 0.0, 0.97, 0.0]);
        assert_eq!(s.label, "Powdery Mildew");
    }

    #[test]
    fn test_tie_prefers_lower_index() {
        let s = select([0.0, 0.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.9]);
        assert_eq!(s.index, 3);
        assert_eq!(s.label, "Die Back");
    }

    #[test]
    fn test_nan_is_never_accepted() {
        let s = select([f32::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(s.fallback);
        assert_eq!(best_accepted(&[f32::NAN, 0.9], 0.85), Some((1, 0.9)));
    }

    #[test]
    fn test_custom_threshold_and_fallback() {
        let mut config = InferenceConfig::default();
        config.acceptance_threshold = 0.5;
        config.fallback_index = 0;
        let s = select_label(&OutputVector(vec![0.0, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]), &config);
        assert_eq!(s.index, 1);
        let s = select_label(&OutputVector(vec![0.4; 8]), &config);
        assert_eq!(s.label, "Anthracnose");
        assert!(s.fallback);
    }

    #[test]
    fn test_index_outside_label_table_falls_back() {
        let mut output = vec![0.0; 8];
        output.push(0.99);
        let s = select_label(&OutputVector(output), &InferenceConfig::default());
        assert!(s.fallback);
        assert_eq!(s.label, "Healthy Leaf");
    }
}
