//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデルファイル、分類パラメータ、ログレベルをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DrLeafError, Result};

/// 病害ラベル表（モデル出力のインデックス順）
pub const DEFAULT_CLASS_LABELS: [&str; 8] = [
    "Anthracnose",
    "Bacterial Canker",
    "Cutting Weevil",
    "Die Back",
    "Gall Midge",
    "Healthy Leaf",
    "Powdery Mildew",
    "Sooty Mould",
];

/// 採用しきい値
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.85;

/// しきい値を超えるクラスが無い場合に使うインデックス ("Healthy Leaf")
///
/// 判定不能な画像も「健康」と表示される。変更する場合は `fallback_index` を設定する。
pub const DEFAULT_FALLBACK_INDEX: usize = 5;

/// モデル入力の一辺（ピクセル）
pub const DEFAULT_IMAGE_SIZE: usize = 128;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Cpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// 取得画像を正方形にそろえる方法
///
/// カメラ・ギャラリーどちらの経路にも同じポリシーを適用する。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SquarePolicy {
    /// 短辺に合わせて中央を切り出す
    #[default]
    CenterCrop,
    /// 縦横比を無視してそのまま使う（テンソル生成時に引き伸ばされる）
    Stretch,
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// モデルアーカイブ (tar.gz) のパス
    /// 相対パスはバンドルされたリソースディレクトリ基準で解決される
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/leaf_classifier.tar.gz".to_string(),
        }
    }
}

/// 分類設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// モデル入力の一辺
    pub image_size: usize,
    /// 採用しきい値（この値以上の確信度のみ採用）
    pub acceptance_threshold: f32,
    /// 採用クラスが無い場合のラベルインデックス
    pub fallback_index: usize,
    /// 正方形化ポリシー
    pub square_policy: SquarePolicy,
    /// ラベル表（モデルメタデータに無い場合に使用）
    pub class_labels: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            fallback_index: DEFAULT_FALLBACK_INDEX,
            square_policy: SquarePolicy::default(),
            class_labels: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// trace / debug / info / warn / error
    pub level: String,
    /// ANSIカラーを使うか
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi_colors: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// 分類設定
    #[serde(default)]
    pub classifier: ClassifierSettings,
    /// ログ設定
    #[serde(default)]
    pub logging: LogSettings,
}

impl AppConfig {
    /// 設定ファイル名
    pub const FILE_NAME: &'static str = "config.json";

    /// 設定ディレクトリ内の設定ファイルパス
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(Self::FILE_NAME)
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 設定を読み込む、存在しないか不正な場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します: {}", path.display());
            return Self::default();
        }

        let loaded = Self::load(path).and_then(|config| {
            config.validate()?;
            Ok(config)
        });

        match loaded {
            Ok(config) => {
                tracing::info!("設定ファイルを読み込みました: {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定値の整合性を検証
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if c.image_size == 0 {
            return Err(DrLeafError::Config("image_size は1以上である必要があります".into()));
        }
        if !(0.0..=1.0).contains(&c.acceptance_threshold) {
            return Err(DrLeafError::Config(format!(
                "acceptance_threshold は0.0〜1.0の範囲である必要があります: {}",
                c.acceptance_threshold
            )));
        }
        if c.class_labels.is_empty() {
            return Err(DrLeafError::Config("class_labels が空です".into()));
        }
        if c.fallback_index >= c.class_labels.len() {
            return Err(DrLeafError::Config(format!(
                "fallback_index {} はラベル数 {} の範囲外です",
                c.fallback_index,
                c.class_labels.len()
            )));
        }
        Ok(())
    }

    /// モデルパスを解決する（相対パスは `base_dir` 基準）
    pub fn resolve_model_path(&self, base_dir: Option<&Path>) -> PathBuf {
        let path = PathBuf::from(&self.model.model_path);
        match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// 設定情報をログに出力
    pub fn log_summary(&self) {
        tracing::info!(
            device = %self.device_type,
            model_path = %self.model.model_path,
            image_size = self.classifier.image_size,
            threshold = self.classifier.acceptance_threshold,
            fallback = self.classifier.fallback_index,
            policy = ?self.classifier.square_policy,
            "アプリケーション設定"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.classifier.image_size, 128);
        assert_eq!(config.classifier.acceptance_threshold, 0.85);
        assert_eq!(config.classifier.fallback_index, 5);
        assert_eq!(config.classifier.class_labels[5], "Healthy Leaf");
        assert_eq!(config.classifier.square_policy, SquarePolicy::CenterCrop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.device_type, deserialized.device_type);
        assert_eq!(config.classifier.class_labels, deserialized.classifier.class_labels);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"device_type":"Wgpu"}"#).unwrap();
        assert_eq!(config.device_type, DeviceType::Wgpu);
        assert_eq!(config.classifier.fallback_index, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.classifier.acceptance_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.fallback_index = 8;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.image_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.class_labels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_with_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = AppConfig::path_in(dir.path());
        fs::write(&path, "{ broken").unwrap();

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.classifier.image_size, DEFAULT_IMAGE_SIZE);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = AppConfig::path_in(dir.path());
        let mut config = AppConfig::default();
        config.classifier.square_policy = SquarePolicy::Stretch;
        config.save(&path).unwrap();

        let loaded = AppConfig::load_or_default(&path);
        assert_eq!(loaded.classifier.square_policy, SquarePolicy::Stretch);
    }

    #[test]
    fn test_resolve_model_path() {
        let config = AppConfig::default();
        let resolved = config.resolve_model_path(Some(Path::new("/res")));
        assert_eq!(resolved, PathBuf::from("/res/models/leaf_classifier.tar.gz"));
        assert_eq!(
            config.resolve_model_path(None),
            PathBuf::from("models/leaf_classifier.tar.gz")
        );
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(format!("{}", DeviceType::Wgpu), "WGPU (GPU)");
        assert_eq!(format!("{}", DeviceType::Cpu), "CPU (NdArray)");
    }
}
