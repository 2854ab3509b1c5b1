//! エラー型の定義
//!
//! 分類パイプラインの各段階（取得・モデル読み込み・推論）の失敗を区別します。
//! Tauriコマンド層では文字列に変換してフロントエンドへ返します。

use thiserror::Error;

/// Dr. Leaf の処理で発生するエラー
#[derive(Error, Debug)]
pub enum DrLeafError {
    /// 画像の取得・デコードに失敗
    #[error("画像の取得に失敗しました: {0}")]
    Acquisition(String),

    /// モデルがロードされていない状態で分類を要求された
    #[error("モデルがロードされていません")]
    ModelNotLoaded,

    /// モデルアーカイブの読み込みに失敗
    #[error("モデルの読み込みに失敗しました: {0}")]
    ModelLoad(String),

    /// 推論エンジンの実行エラー
    #[error("推論エラー: {0}")]
    Inference(String),

    /// 出力ベクトルがラベル表と一致しない
    #[error("出力ベクトルの長さが不正です: {actual} (期待: {expected})")]
    InvalidOutput { expected: usize, actual: usize },

    /// 設定値が不正
    #[error("設定エラー: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DrLeafError>;

impl From<image::ImageError> for DrLeafError {
    fn from(e: image::ImageError) -> Self {
        DrLeafError::Acquisition(e.to_string())
    }
}
