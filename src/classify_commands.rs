//! 葉の分類のTauriコマンド
//!
//! カメラ撮影・ギャラリー選択の結果を受け取り、1回の同期的な分類を行います。
//! 失敗はログに記録したうえで文字列エラーとして返し、フロントエンドは直前の表示を保持します。

use std::io::Cursor;

use base64::Engine as _;
use image::{imageops::FilterType, ImageFormat, RgbImage};
use tauri::State;

use crate::acquisition;
use crate::error::{DrLeafError, Result};
use crate::ml::InferenceEngine;
use crate::types::{ClassificationResult, ImageSource, ModelStatus};
use crate::AppState;

/// 表示用サムネイルの最大辺
const THUMBNAIL_MAX_SIDE: u32 = 512;

/// 正方形化した画像をPNGのdata URLに変換
pub fn thumbnail_data_url(bitmap: &RgbImage) -> Result<String> {
    let (width, height) = bitmap.dimensions();
    let resized;
    let img = if width.max(height) > THUMBNAIL_MAX_SIDE {
        let scale = THUMBNAIL_MAX_SIDE as f32 / width.max(height) as f32;
        let w = ((width as f32 * scale).round() as u32).max(1);
        let h = ((height as f32 * scale).round() as u32).max(1);
        resized = image::imageops::resize(bitmap, w, h, FilterType::Triangle);
        &resized
    } else {
        bitmap
    };

    let mut png_data = Cursor::new(Vec::new());
    img.write_to(&mut png_data, ImageFormat::Png)
        .map_err(|e| DrLeafError::Acquisition(format!("PNG エンコードに失敗: {}", e)))?;

    let base64_data = base64::engine::general_purpose::STANDARD.encode(png_data.into_inner());
    Ok(format!("data:image/png;base64,{}", base64_data))
}

/// 取得結果1件を分類する
///
/// - `bytes` が `None`（キャンセル）の場合は何もせず `Ok(None)`
/// - モデル未ロードの場合は `ModelNotLoaded`
pub fn classify_acquired(
    engine: Option<&InferenceEngine>,
    source: ImageSource,
    bytes: Option<&[u8]>,
) -> Result<Option<ClassificationResult>> {
    let policy = engine.map(|e| e.config().square_policy).unwrap_or_default();
    let Some(acquired) = acquisition::acquire(source, bytes, policy)? else {
        return Ok(None);
    };
    let engine = engine.ok_or(DrLeafError::ModelNotLoaded)?;

    let classification = engine.classify_image(&acquired.bitmap)?;
    tracing::info!(
        %source,
        label = %classification.selection.label,
        fallback = classification.selection.fallback,
        elapsed_ms = classification.inference_time_ms,
        "分類しました"
    );

    Ok(Some(ClassificationResult {
        source,
        selection: classification.selection,
        confidences: classification.confidences,
        inference_time_ms: classification.inference_time_ms,
        thumbnail: thumbnail_data_url(&acquired.bitmap)?,
    }))
}

fn classify_with_state(
    state: &AppState,
    source: ImageSource,
    image_bytes: Option<Vec<u8>>,
) -> std::result::Result<Option<ClassificationResult>, String> {
    let engine = state.lock_engine();

    classify_acquired(engine.as_ref(), source, image_bytes.as_deref()).map_err(|e| {
        match e {
            DrLeafError::Acquisition(_) => tracing::warn!(%source, "{}", e),
            _ => tracing::error!(%source, "{}", e),
        }
        e.to_string()
    })
}

/// カメラで撮影した画像を分類
#[tauri::command]
pub fn classify_captured_image(
    image_bytes: Option<Vec<u8>>,
    state: State<AppState>,
) -> std::result::Result<Option<ClassificationResult>, String> {
    classify_with_state(&state, ImageSource::Camera, image_bytes)
}

/// ギャラリーから選択した画像を分類
#[tauri::command]
pub fn classify_gallery_image(
    image_bytes: Option<Vec<u8>>,
    state: State<AppState>,
) -> std::result::Result<Option<ClassificationResult>, String> {
    classify_with_state(&state, ImageSource::Gallery, image_bytes)
}

/// モデルのロード状態を取得
#[tauri::command]
pub fn get_model_status(state: State<AppState>) -> std::result::Result<ModelStatus, String> {
    state.model_status().map_err(|e| e.to_string())
}

/// 表示に使うラベル表を取得
#[tauri::command]
pub fn get_class_labels(state: State<AppState>) -> std::result::Result<Vec<String>, String> {
    Ok(state.model_status().map_err(|e| e.to_string())?.class_labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::ml::{InputTensor, LeafModel, OutputVector};
    use crate::model::{AppConfig, InferenceConfig};

    /// 初回だけパニックするモデル
    struct PanicOnceModel(AtomicBool);

    impl LeafModel for PanicOnceModel {
        fn process(&self, _input: &InputTensor) -> Result<OutputVector> {
            if !self.0.swap(true, Ordering::SeqCst) {
                panic!("shape mismatch");
            }
            Ok(OutputVector(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.9, 0.0, 0.0]))
        }
    }

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_thumbnail_is_png_data_url() {
        let url = thumbnail_data_url(&RgbImage::new(8, 8)).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_large_thumbnail_is_downscaled() {
        let url = thumbnail_data_url(&RgbImage::new(1024, 1024)).unwrap();
        let encoded = url.trim_start_matches("data:image/png;base64,");
        let png = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (512, 512));
    }

    #[test]
    fn test_cancel_without_model_is_not_error() {
        assert!(classify_acquired(None, ImageSource::Camera, None).unwrap().is_none());
    }

    #[test]
    fn test_missing_model_is_reported() {
        let bytes = encode_png(&RgbImage::new(4, 4));
        let err = classify_acquired(None, ImageSource::Gallery, Some(&bytes)).unwrap_err();
        assert!(matches!(err, DrLeafError::ModelNotLoaded));
    }

    #[test]
    fn test_model_panic_does_not_disable_later_calls() {
        let engine = InferenceEngine::new(
            Box::new(PanicOnceModel(AtomicBool::new(false))),
            InferenceConfig::default(),
        );
        let state = AppState::new(AppConfig::default(), PathBuf::new(), Ok(engine));
        let bytes = encode_png(&RgbImage::new(16, 16));

        let err =
            classify_with_state(&state, ImageSource::Camera, Some(bytes.clone())).unwrap_err();
        assert!(err.contains("推論エラー"));

        let result = classify_with_state(&state, ImageSource::Camera, Some(bytes))
            .unwrap()
            .unwrap();
        assert_eq!(result.selection.label, "Healthy Leaf");
        assert!(state.model_status().unwrap().loaded);
    }
}
