//! ログ初期化
//!
//! `tracing` のサブスクライバを一度だけ設定します。

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::model::LogSettings;

/// 文字列のログレベルを変換（不明な値は INFO）
pub fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// グローバルサブスクライバを設定
///
/// 既に設定済みの場合はエラーを返す。
pub fn init_logging(settings: &LogSettings) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&settings.level))
        .with_ansi(settings.ansi_colors)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
