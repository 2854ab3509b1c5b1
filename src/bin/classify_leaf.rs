//! コマンドラインから葉の画像を分類する簡易バイナリ
//!
//! アプリと同じ前処理・推論・ラベル選択を通します。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use dr_leaf_lib::acquisition;
use dr_leaf_lib::logging::init_logging;
use dr_leaf_lib::ml::InferenceEngine;
use dr_leaf_lib::model::{format_metadata_info, load_metadata, AppConfig, DeviceType, LogSettings};
use dr_leaf_lib::types::Classification;

#[derive(Parser, Debug)]
#[command(name = "classify_leaf")]
#[command(about = "葉の画像を病害カテゴリに分類します", long_about = None)]
struct Cli {
    /// デバッグログを出力
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Backend {
    Cpu,
    Wgpu,
}

impl From<Backend> for DeviceType {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Cpu => DeviceType::Cpu,
            Backend::Wgpu => DeviceType::Wgpu,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 画像ファイルを分類
    Classify {
        /// モデルアーカイブ (tar.gz)
        #[arg(short, long)]
        model: PathBuf,

        /// 設定ファイル (config.json)、省略時は既定値
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 計算デバイス（省略時は設定ファイルの値）
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,

        /// 分類する画像
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// 未学習の重みでモデルアーカイブを作成（動作確認用）
    #[cfg(feature = "ml")]
    InitModel {
        /// 出力先 (tar.gz)
        #[arg(short, long, default_value = "models/leaf_classifier.tar.gz")]
        output: PathBuf,

        /// 基本フィルタ数
        #[arg(long, default_value = "16")]
        base_filters: usize,
    },

    /// モデルアーカイブのメタデータを表示
    Info {
        /// モデルアーカイブ (tar.gz)
        model: PathBuf,
    },
}

/// 画像ファイル1件を読み込んで分類
fn classify_file(engine: &InferenceEngine, path: &Path) -> Result<Classification> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("画像の読み込みエラー: {}", path.display()))?;
    let decoded = acquisition::decode_image(&bytes)?;
    let bitmap = acquisition::to_square(decoded, engine.config().square_policy);
    Ok(engine.classify_image(&bitmap)?)
}

/// `path<TAB>label<TAB>confidence` 形式の出力行
fn result_line(path: &Path, result: &Classification) -> String {
    let confidence = result
        .selection
        .confidence
        .map(|c| format!("{:.3}", c))
        .unwrap_or_else(|| "-".to_string());
    let marker = if result.selection.fallback { " (fallback)" } else { "" };
    format!("{}\t{}\t{}{}", path.display(), result.selection.label, confidence, marker)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_settings = LogSettings {
        level: if cli.verbose { "debug" } else { "info" }.to_string(),
        ansi_colors: true,
    };
    init_logging(&log_settings).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Classify { model, config, backend, images } => {
            let config = config.map(AppConfig::load_or_default).unwrap_or_default();
            let device_type = backend.map(DeviceType::from).unwrap_or(config.device_type);

            let engine = InferenceEngine::load(&model, device_type, &config.classifier)
                .with_context(|| format!("推論エンジンの初期化エラー: {}", model.display()))?;

            let mut failures = 0;
            for path in &images {
                match classify_file(&engine, path) {
                    Ok(result) => println!("{}", result_line(path, &result)),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}\terror: {:#}", path.display(), e);
                    }
                }
            }
            if failures > 0 {
                tracing::warn!("{} / {} 件の画像を分類できませんでした", failures, images.len());
            }
        }
        #[cfg(feature = "ml")]
        Commands::InitModel { output, base_filters } => {
            let settings = AppConfig::default().classifier;
            let path = dr_leaf_lib::ml::create_untrained_archive(&output, &settings, base_filters)?;
            println!("{}", path.display());
        }
        Commands::Info { model } => {
            let metadata = load_metadata(&model)?;
            println!("{}", format_metadata_info(&metadata));
        }
    }

    Ok(())
}
