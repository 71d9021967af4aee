//! Sample models offered for quick previews.

use serde::{Deserialize, Serialize};

use crate::model::AssetFormat;

/// A compiled-in model that can be dropped onto the plate by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleModel {
    pub model_id: String,
    pub model_name: String,
    pub file_path: String,
    pub format: AssetFormat,
}

fn sample_table() -> &'static [SampleModel] {
    static TABLE: std::sync::OnceLock<Vec<SampleModel>> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        vec![SampleModel {
            model_id: "boom-bracket".to_string(),
            model_name: "Boom Bracket".to_string(),
            file_path: "/models/boomBracket.stl".to_string(),
            format: AssetFormat::Stl,
        }]
    })
}

/// All sample models, in display order.
pub fn sample_models() -> &'static [SampleModel] {
    sample_table()
}

pub fn lookup_sample(model_id: &str) -> Option<&'static SampleModel> {
    sample_table().iter().find(|s| s.model_id == model_id)
}

/// First sample in the table.
pub fn default_sample() -> Option<&'static SampleModel> {
    sample_table().first()
}

pub fn sample_ids() -> Vec<&'static str> {
    sample_table().iter().map(|s| s.model_id.as_str()).collect()
}
