//! Per-item waste and sub-type classification

use std::sync::Arc;

use image::DynamicImage;
use ndarray::Array4;
use tracing::debug;
use wiseplate_domain::model::profile;
use wiseplate_types::{Classification, FoodCategory, FoodSubType, ModelError, Result, WasteStatus};

use crate::preprocess::{classification_tensor, CLASSIFIER_INPUT_SIZE};
use crate::registry::{InferenceModel, ModelRegistry};

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and value of the largest element; first one wins on ties
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

/// Classifies crops with the category's waste and type models
///
/// A missing model degrades that half of the result to unknown.
pub struct ItemClassifier {
    registry: Arc<ModelRegistry>,
    input_size: u32,
}

impl ItemClassifier {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            input_size: CLASSIFIER_INPUT_SIZE,
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn classify(&self, crop: &DynamicImage, category: FoodCategory) -> Result<Classification> {
        let profile = profile(category);
        let mut tensor: Option<Array4<f32>> = None;
        let mut classification = Classification::unknown();

        if let Some(model) = self.registry.get(profile.waste_model) {
            let input = tensor.get_or_insert_with(|| classification_tensor(crop, self.input_size));
            let (index, probability) = predict(model.as_ref(), input, profile.waste_model)?;
            classification.waste_status = WasteStatus::from_class_index(index);
            classification.waste_confidence = probability;
        } else {
            debug!(model = profile.waste_model, "Waste model not loaded");
        }

        if let Some(model) = self.registry.get(profile.type_model) {
            let input = tensor.get_or_insert_with(|| classification_tensor(crop, self.input_size));
            let (index, _) = predict(model.as_ref(), input, profile.type_model)?;
            classification.sub_type = profile.sub_type(index);
            if classification.sub_type == FoodSubType::Unknown {
                debug!(model = profile.type_model, index, "Type index outside taxonomy");
            }
        } else {
            debug!(model = profile.type_model, "Type model not loaded");
        }

        Ok(classification)
    }
}

fn predict(model: &dyn InferenceModel, input: &Array4<f32>, name: &str) -> Result<(usize, f32)> {
    let output = model.infer(input)?;
    let probabilities = softmax(output.first_row());
    argmax(&probabilities).ok_or_else(|| {
        ModelError::InvalidOutput(format!("{} returned an empty prediction", name)).into()
    })
}
