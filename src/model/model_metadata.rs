//! モデルメタデータの定義
//!
//! tar.gz形式のモデルアーカイブに同梱される `metadata.json` の内容です。
//! モデル境界（入力 `[1, S, S, 3]` f32、出力はラベル表と同じ長さの f32）を記述します。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 出力インデックス順のクラスラベル
    /// 例: ["Anthracnose", "Bacterial Canker", ..., "Sooty Mould"]
    pub class_labels: Vec<String>,

    /// モデル入力の一辺（ピクセル、通常128）
    pub input_size: u32,

    /// 畳み込み層の基本フィルタ数（モデル構造の復元に使用）
    #[serde(default = "default_base_filters")]
    pub base_filters: usize,

    /// 任意の説明
    #[serde(default)]
    pub description: Option<String>,

    /// アーカイブ作成時刻（ISO8601形式）
    pub created_at: String,
}

fn default_base_filters() -> usize {
    16
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(class_labels: Vec<String>, input_size: u32, base_filters: usize) -> Self {
        let created_at = chrono::Local::now().to_rfc3339();

        Self {
            class_labels,
            input_size,
            base_filters,
            description: None,
            created_at,
        }
    }

    /// 説明を付与
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// クラス数
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
