//! Model registry
//!
//! Loads the named detection/classification models once per run. A model
//! whose file is missing or fails to load is logged and left out; callers
//! treat absent models as degraded capability.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wiseplate_domain::model::all_model_names;
use wiseplate_types::{ConfigError, Error, ModelError, Result};

/// Manifest file looked up inside the models directory
pub const MANIFEST_FILE: &str = "models.toml";

/// Raw model output tensor
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ModelOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Values of the first batch entry
    pub fn first_row(&self) -> &[f32] {
        let row_len = if self.shape.len() >= 2 {
            self.shape[1..].iter().product()
        } else {
            self.data.len()
        };
        &self.data[..row_len.min(self.data.len())]
    }
}

/// Run inference on a preprocessed NCHW tensor
pub trait InferenceModel: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<ModelOutput>;
}

/// How a model file is turned into an [`InferenceModel`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    #[default]
    Onnx,
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderKind::Onnx => write!(f, "onnx"),
        }
    }
}

/// One entry of the model manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Logical name (e.g. "wisePlate")
    pub name: String,
    /// File path, relative paths resolve against the models directory
    pub path: PathBuf,
    #[serde(default)]
    pub loader: LoaderKind,
}

/// Logical model name to file mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl ModelManifest {
    /// The nine well-known models as `<name>.onnx` under `models_dir`
    pub fn default_in(models_dir: &Path) -> Self {
        let models = all_model_names()
            .into_iter()
            .map(|name| ModelSpec {
                name: name.to_string(),
                path: models_dir.join(format!("{}.onnx", name)),
                loader: LoaderKind::Onnx,
            })
            .collect();
        Self { models }
    }

    /// Load `models.toml` from `models_dir`, or fall back to the defaults
    ///
    /// Entries in the file override defaults with the same name.
    pub fn load(models_dir: &Path) -> Result<Self> {
        let mut manifest = Self::default_in(models_dir);
        let path = models_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(manifest);
        }

        let content = std::fs::read_to_string(&path)?;
        let overrides: ModelManifest = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        for mut spec in overrides.models {
            if spec.path.is_relative() {
                spec.path = models_dir.join(&spec.path);
            }
            match manifest.models.iter_mut().find(|m| m.name == spec.name) {
                Some(existing) => *existing = spec,
                None => manifest.models.push(spec),
            }
        }
        Ok(manifest)
    }
}

/// Strategy for loading a single manifest entry
pub trait ModelLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn InferenceModel>>;
}

/// ONNX Runtime loader
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    pub intra_threads: usize,
}

impl Default for OnnxLoader {
    fn default() -> Self {
        Self { intra_threads: 4 }
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn InferenceModel>> {
        match spec.loader {
            LoaderKind::Onnx => Ok(Arc::new(OnnxModel::load(
                &spec.name,
                &spec.path,
                self.intra_threads,
            )?)),
        }
    }
}

/// ONNX model session
///
/// `Session::run` needs exclusive access, so calls are serialized.
pub struct OnnxModel {
    name: String,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn load(name: &str, path: &Path, intra_threads: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(load_error(name))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error(name))?
            .with_intra_threads(intra_threads)
            .map_err(load_error(name))?
            .commit_from_file(path)
            .map_err(load_error(name))?;

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
        })
    }
}

fn load_error<E: fmt::Display>(name: &str) -> impl Fn(E) -> Error + '_ {
    move |e| {
        ModelError::Load {
            name: name.to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}

fn inference_error<E: fmt::Display>(e: E) -> Error {
    ModelError::Inference(e.to_string()).into()
}

impl InferenceModel for OnnxModel {
    fn infer(&self, input: &Array4<f32>) -> Result<ModelOutput> {
        debug!(model = %self.name, shape = ?input.shape(), "Running inference");

        let tensor = Tensor::from_array(input.clone()).map_err(inference_error)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference(format!("{}: session lock poisoned", self.name)))?;

        let outputs = session.run(ort::inputs![tensor]).map_err(inference_error)?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok(ModelOutput::new(shape, data.to_vec()))
    }
}

/// Immutable set of loaded models, keyed by logical name
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn InferenceModel>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

impl ModelRegistry {
    /// Load every manifest entry with ONNX Runtime
    pub fn load(manifest: &ModelManifest) -> Self {
        Self::load_with(manifest, &OnnxLoader::default())
    }

    /// Load every manifest entry with the given loader, skipping failures
    pub fn load_with(manifest: &ModelManifest, loader: &dyn ModelLoader) -> Self {
        let mut models = HashMap::new();

        for spec in &manifest.models {
            if !spec.path.exists() {
                warn!(model = %spec.name, path = %spec.path.display(), "Model file not found, skipping");
                continue;
            }

            info!(model = %spec.name, loader = %spec.loader, "Loading model");
            match loader.load(spec) {
                Ok(model) => {
                    models.insert(spec.name.clone(), model);
                }
                Err(e) => warn!(model = %spec.name, error = %e, "Model failed to load, skipping"),
            }
        }

        info!(loaded = models.len(), total = manifest.models.len(), "Model registry ready");
        Self { models }
    }

    /// Build a registry from already-constructed models
    pub fn from_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn InferenceModel>)>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(|(n, m)| (n.into(), m)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn InferenceModel>> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Loaded model names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Availability of every manifest entry
    pub fn availability(&self, manifest: &ModelManifest) -> BTreeMap<String, bool> {
        manifest
            .models
            .iter()
            .map(|spec| (spec.name.clone(), self.contains(&spec.name)))
            .collect()
    }
}
