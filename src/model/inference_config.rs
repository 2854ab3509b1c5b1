//! 推論設定
//!
//! モデルメタデータとアプリ設定から、分類に必要な値（ラベル表・入力サイズ・
//! 採用しきい値・フォールバック）をまとめます。

use serde::Serialize;

use crate::error::{DrLeafError, Result};
use crate::model::config::{ClassifierSettings, SquarePolicy};
use crate::model::model_metadata::ModelMetadata;

/// 分類に使う設定値
#[derive(Debug, Clone, Serialize)]
pub struct InferenceConfig {
    /// 出力インデックス順のクラスラベル
    pub class_labels: Vec<String>,
    /// モデル入力の一辺
    pub input_size: usize,
    /// 採用しきい値
    pub acceptance_threshold: f32,
    /// 採用クラスが無い場合のインデックス
    pub fallback_index: usize,
    /// 正方形化ポリシー
    pub square_policy: SquarePolicy,
}

impl InferenceConfig {
    /// 設定のみから作成（メタデータを持たないモデル用）
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self> {
        Self::build(settings.class_labels.clone(), settings.image_size, settings)
    }

    /// メタデータと設定から作成
    ///
    /// ラベル表と入力サイズはモデルアーカイブの値を優先する。
    pub fn from_metadata(metadata: &ModelMetadata, settings: &ClassifierSettings) -> Result<Self> {
        let labels = if metadata.class_labels.is_empty() {
            settings.class_labels.clone()
        } else {
            metadata.class_labels.clone()
        };
        if labels != settings.class_labels {
            tracing::warn!(
                "モデルのラベル表が設定と異なります。モデル側を使用します: {}",
                labels.join(", ")
            );
        }
        Self::build(labels, metadata.input_size as usize, settings)
    }

    fn build(
        class_labels: Vec<String>,
        input_size: usize,
        settings: &ClassifierSettings,
    ) -> Result<Self> {
        if class_labels.is_empty() {
            return Err(DrLeafError::Config("ラベル表が空です".into()));
        }
        if input_size == 0 {
            return Err(DrLeafError::Config("入力サイズが0です".into()));
        }
        if settings.fallback_index >= class_labels.len() {
            return Err(DrLeafError::Config(format!(
                "fallback_index {} はラベル数 {} の範囲外です",
                settings.fallback_index,
                class_labels.len()
            )));
        }

        Ok(Self {
            class_labels,
            input_size,
            acceptance_threshold: settings.acceptance_threshold,
            fallback_index: settings.fallback_index,
            square_policy: settings.square_policy,
        })
    }

    /// クラス数
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// クラスインデックスからラベルを取得
    pub fn class_index_to_label(&self, index: usize) -> Option<&str> {
        self.class_labels.get(index).map(String::as_str)
    }

    /// フォールバックのラベル
    pub fn fallback_label(&self) -> &str {
        &self.class_labels[self.fallback_index]
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        let settings = ClassifierSettings::default();
        Self {
            class_labels: settings.class_labels,
            input_size: settings.image_size,
            acceptance_threshold: settings.acceptance_threshold,
            fallback_index: settings.fallback_index,
            square_policy: settings.square_policy,
        }
    }
}
