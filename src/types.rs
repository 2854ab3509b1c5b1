use serde::{Deserialize, Serialize};

use crate::ml::label_selection::LabelSelection;

/// 画像の取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Camera,
    Gallery,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Camera => write!(f, "camera"),
            ImageSource::Gallery => write!(f, "gallery"),
        }
    }
}

/// 1回の分類結果（推論エンジンの出力）
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub selection: LabelSelection,
    /// ラベル表と同じ順のconfidence
    pub confidences: Vec<f32>,
    pub inference_time_ms: f64,
}

/// フロントエンドに返す表示用の結果
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub source: ImageSource,
    pub selection: LabelSelection,
    pub confidences: Vec<f32>,
    pub inference_time_ms: f64,
    /// 正方形化した画像のPNG (data URL)
    pub thumbnail: String,
}

/// モデルのロード状態
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub model_path: String,
    pub class_labels: Vec<String>,
    pub input_size: usize,
    pub acceptance_threshold: f32,
    pub load_error: Option<String>,
}
