//! Isolation Forest
//!
//! 多変量・教師なしの異常検知モデル、セル単位の特徴量履歴、
//! バックグラウンド再学習を提供する。

mod features;
mod model;
mod registry;
mod tree;

pub use features::{FeatureStore, FeatureVector};
pub use model::{IsolationForest, ModelInfo, TrainedModel};
pub use registry::ModelRegistry;
pub use tree::{average_path_length, IsolationTree};
