pub mod model_metadata;
pub mod model_storage;
pub mod inference_config;
pub mod config;

pub use model_metadata::ModelMetadata;
pub use model_storage::{
    format_metadata_info, load_metadata, load_model_binary, load_model_with_metadata,
    save_model_with_metadata,
};
pub use inference_config::InferenceConfig;
pub use config::{
    AppConfig, ClassifierSettings, DeviceType, LogSettings, ModelSettings, SquarePolicy,
};
