mod classify_commands;

pub mod acquisition;
pub mod error;
pub mod logging;
pub mod ml;
pub mod model;
pub mod types;

pub use classify_commands::{classify_acquired, thumbnail_data_url};
pub use error::{DrLeafError, Result};

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tauri::{Manager, RunEvent};

use ml::InferenceEngine;
use model::{AppConfig, InferenceConfig};
use types::ModelStatus;

pub struct AppState {
    config: AppConfig,
    model_path: PathBuf,
    engine: Mutex<Option<InferenceEngine>>, // アプリ終了時に解放
    load_error: Option<String>,
}

impl AppState {
    /// 起動時のモデル読み込み結果から状態を作成
    pub fn new(config: AppConfig, model_path: PathBuf, engine: Result<InferenceEngine>) -> Self {
        let (engine, load_error) = match engine {
            Ok(engine) => (Some(engine), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            config,
            model_path,
            engine: Mutex::new(engine),
            load_error,
        }
    }

    /// 推論エンジンのロックを取得（ポイズン状態でも中身を使う）
    fn lock_engine(&self) -> MutexGuard<'_, Option<InferenceEngine>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// モデルのロード状態
    pub fn model_status(&self) -> Result<ModelStatus> {
        let engine = self.lock_engine();

        let config = match engine.as_ref() {
            Some(engine) => engine.config().clone(),
            None => InferenceConfig::from_settings(&self.config.classifier)?,
        };

        Ok(ModelStatus {
            loaded: engine.is_some(),
            model_path: self.model_path.display().to_string(),
            class_labels: config.class_labels,
            input_size: config.input_size,
            acceptance_threshold: config.acceptance_threshold,
            load_error: self.load_error.clone(),
        })
    }

    /// 推論エンジンを取り出して破棄
    pub fn release_engine(&self) {
        drop(self.lock_engine().take());
    }
}

/// 設定ディレクトリとリソースディレクトリから起動時の状態を組み立てる
fn init_state(config_dir: Option<PathBuf>, resource_dir: Option<PathBuf>) -> AppState {
    let config_path = config_dir.map(|dir| AppConfig::path_in(&dir));
    let config = config_path
        .as_ref()
        .map(AppConfig::load_or_default)
        .unwrap_or_default();

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("{}", e);
    }
    if let Some(path) = config_path {
        tracing::info!("設定ファイル: {}", path.display());
    }
    config.log_summary();

    let model_path = config.resolve_model_path(resource_dir.as_deref());
    let engine = InferenceEngine::load(&model_path, config.device_type, &config.classifier);
    if let Err(ref e) = engine {
        tracing::error!(path = %model_path.display(), "{}", e);
    }

    AppState::new(config, model_path, engine)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_fs::init())
        .setup(|app| {
            let config_dir = app.path().app_config_dir().ok();
            let resource_dir = app.path().resource_dir().ok();
            app.manage(init_state(config_dir, resource_dir));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            classify_commands::classify_captured_image,
            classify_commands::classify_gallery_image,
            classify_commands::get_model_status,
            classify_commands::get_class_labels,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                state.release_engine();
            }
        }
    });
}
