//! モデル推論機能
//!
//! - [`LeafModel`]: モデル境界（入力テンソル -> 出力ベクトル）
//! - [`BurnLeafModel`]: Burnで復元した学習済みモデル
//! - [`InferenceEngine`]: モデルハンドルと推論設定を所有し、画像を分類する

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use image::RgbImage;

use crate::error::{DrLeafError, Result};
use crate::ml::label_selection::{select_label, OutputVector};
use crate::ml::tensor_builder::{build_input_tensor, InputTensor};
use crate::model::{ClassifierSettings, DeviceType, InferenceConfig};
use crate::types::Classification;

#[cfg(feature = "ml")]
use burn::{
    backend::Wgpu,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};
#[cfg(feature = "ml")]
use burn_ndarray::{NdArray, NdArrayDevice};
#[cfg(feature = "ml")]
use burn_wgpu::WgpuDevice;
#[cfg(feature = "ml")]
use std::path::PathBuf;

#[cfg(feature = "ml")]
use crate::ml::ml_model::{LeafClassifier, ModelConfig};
#[cfg(feature = "ml")]
use crate::model::{load_model_with_metadata, save_model_with_metadata, ModelMetadata};

/// 推論エンジンが実行するモデル
///
/// 入力 `[1, S, S, 3]` f32 を受け取り、クラスごとのconfidenceを返す。
pub trait LeafModel: Send {
    fn process(&self, input: &InputTensor) -> Result<OutputVector>;
}

/// Burnで実装された分類モデル
#[cfg(feature = "ml")]
pub struct BurnLeafModel<B: Backend> {
    model: LeafClassifier<B>,
    device: B::Device,
}

#[cfg(feature = "ml")]
impl<B: Backend> BurnLeafModel<B> {
    pub fn new(model: LeafClassifier<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// メタデータとバイナリから重みを復元
    pub fn from_binary(
        metadata: &ModelMetadata,
        model_binary: Vec<u8>,
        device: B::Device,
    ) -> Result<Self> {
        let model_config = ModelConfig::new()
            .with_num_classes(metadata.num_classes())
            .with_base_filters(metadata.base_filters);
        let model = model_config.init::<B>(&device);

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| {
                DrLeafError::ModelLoad(format!("モデル重みの読み込みエラー: {:?}", e))
            })?;

        Ok(Self::new(model.load_record(record), device))
    }

    /// 重みをバイナリに書き出す（アーカイブ作成用）
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        recorder
            .record(self.model.clone().into_record(), ())
            .map_err(|e| DrLeafError::ModelLoad(format!("モデル重みの書き出しエラー: {:?}", e)))
    }
}

#[cfg(feature = "ml")]
impl<B: Backend> LeafModel for BurnLeafModel<B> {
    fn process(&self, input: &InputTensor) -> Result<OutputVector> {
        let tensor =
            Tensor::<B, 1>::from_floats(input.as_slice(), &self.device).reshape(input.shape());

        let output = self.model.forward_softmax(tensor);
        let confidences = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| DrLeafError::Inference(format!("推論結果の取得エラー: {:?}", e)))?;

        Ok(OutputVector(confidences))
    }
}

/// モデルアーカイブを読み込み、指定デバイスのモデルを生成
#[cfg(feature = "ml")]
pub fn load_leaf_model(
    model_path: &Path,
    device_type: DeviceType,
) -> Result<(ModelMetadata, Box<dyn LeafModel>)> {
    let (metadata, binary) = load_model_with_metadata(model_path)
        .map_err(|e| DrLeafError::ModelLoad(format!("{:#}", e)))?;

    let model: Box<dyn LeafModel> = match device_type {
        DeviceType::Cpu => Box::new(BurnLeafModel::<NdArray>::from_binary(
            &metadata,
            binary,
            NdArrayDevice::Cpu,
        )?),
        DeviceType::Wgpu => Box::new(BurnLeafModel::<Wgpu>::from_binary(
            &metadata,
            binary,
            WgpuDevice::default(),
        )?),
    };

    Ok((metadata, model))
}

/// 初期化直後（未学習）の重みでモデルアーカイブを作成
///
/// 学習済みモデルが無い環境で、読み込みから表示までの経路を確認するために使う。
#[cfg(feature = "ml")]
pub fn create_untrained_archive(
    path: &Path,
    settings: &ClassifierSettings,
    base_filters: usize,
) -> Result<PathBuf> {
    let device = NdArrayDevice::Cpu;
    let model = BurnLeafModel::<NdArray>::new(
        ModelConfig::new()
            .with_num_classes(settings.class_labels.len())
            .with_base_filters(base_filters)
            .init::<NdArray>(&device),
        device,
    );

    let metadata = ModelMetadata::new(
        settings.class_labels.clone(),
        settings.image_size as u32,
        base_filters,
    )
    .with_description("untrained");

    let saved = save_model_with_metadata(path, &metadata, &model.to_binary()?)
        .map_err(|e| DrLeafError::ModelLoad(format!("{:#}", e)))?;
    tracing::info!(path = %saved.display(), "未学習モデルを保存しました");
    Ok(saved)
}

/// 推論エンジン
///
/// アプリ起動時に一度だけ生成し、終了時に破棄する。
pub struct InferenceEngine {
    model: Box<dyn LeafModel>,
    config: InferenceConfig,
}

impl InferenceEngine {
    /// 任意のモデル実装から生成
    pub fn new(model: Box<dyn LeafModel>, config: InferenceConfig) -> Self {
        Self { model, config }
    }

    /// モデルアーカイブを読み込んで推論エンジンを初期化
    #[cfg(feature = "ml")]
    pub fn load(
        model_path: &Path,
        device_type: DeviceType,
        settings: &ClassifierSettings,
    ) -> Result<Self> {
        let (metadata, model) = load_leaf_model(model_path, device_type)?;
        let config = InferenceConfig::from_metadata(&metadata, settings)?;

        tracing::info!(
            path = %model_path.display(),
            device = %device_type,
            classes = config.num_classes(),
            input_size = config.input_size,
            "モデルをロードしました"
        );

        Ok(Self::new(model, config))
    }

    /// `ml` フィーチャー無効時は常に失敗する
    #[cfg(not(feature = "ml"))]
    pub fn load(
        model_path: &Path,
        _device_type: DeviceType,
        _settings: &ClassifierSettings,
    ) -> Result<Self> {
        Err(DrLeafError::ModelLoad(format!(
            "ml feature disabled: {}",
            model_path.display()
        )))
    }

    /// InferenceConfigへの参照を取得
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// テンソルを推論してラベルを選択
    pub fn classify_tensor(&self, tensor: &InputTensor) -> Result<Classification> {
        let start = Instant::now();
        let output = panic::catch_unwind(AssertUnwindSafe(|| self.model.process(tensor)))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                DrLeafError::Inference(format!("推論中にパニック: {}", message))
            })??;
        let inference_time = start.elapsed();

        if output.len() != self.config.num_classes() {
            return Err(DrLeafError::InvalidOutput {
                expected: self.config.num_classes(),
                actual: output.len(),
            });
        }
        tracing::debug!(confidences = ?output.as_slice(), "accuracy");

        let selection = select_label(&output, &self.config);
        Ok(Classification {
            selection,
            confidences: output.0,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// 正方形化済みの画像を分類
    pub fn classify_image(&self, bitmap: &RgbImage) -> Result<Classification> {
        let tensor = build_input_tensor(bitmap, self.config.input_size);
        self.classify_tensor(&tensor)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown")
}

impl Drop for InferenceEngine {
    fn drop(&mut self) {
        tracing::info!("推論エンジンを解放しました");
    }
}
