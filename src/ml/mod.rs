pub mod ml_model;
pub mod tensor_builder;
pub mod label_selection;
pub mod inference;

#[cfg(feature = "ml")]
pub use ml_model::{LeafClassifier, ModelConfig};
pub use tensor_builder::{build_input_tensor, tensor_from_argb, unpack_argb, InputTensor};
pub use label_selection::{best_accepted, select_label, LabelSelection, OutputVector};
pub use inference::{InferenceEngine, LeafModel};
#[cfg(feature = "ml")]
pub use inference::{create_untrained_archive, load_leaf_model, BurnLeafModel};
