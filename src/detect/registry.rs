use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::{ScriptedBackend, StubBackend};

/// Settings every backend factory receives.
#[derive(Clone, Debug)]
pub struct DetectorSettings {
    /// ONNX model used by the tract backend.
    pub model_path: PathBuf,
    /// Square model input size in pixels.
    pub input_size: u32,
    /// Minimum raw model score kept before the alert policy sees a detection.
    pub min_score: f32,
    /// IoU above which overlapping boxes of one class are suppressed.
    pub iou_threshold: f32,
    /// Detection script replayed by the scripted backend.
    pub script_path: Option<PathBuf>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov8m.onnx"),
            input_size: 640,
            min_score: 0.25,
            iou_threshold: 0.45,
            script_path: None,
        }
    }
}

type BackendFactory = fn(&DetectorSettings) -> Result<Box<dyn DetectorBackend>>;

/// Registry of detector backend factories, keyed by backend name.
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, BackendFactory>,
    default_name: Option<&'static str>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Registry with every backend compiled into this build.
    ///
    /// The model backend is the default when available, otherwise `stub`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "backend-tract")]
        registry.register("tract", build_tract);
        registry.register("stub", build_stub);
        registry.register("scripted", build_scripted);
        registry
    }

    /// Register a factory. The first registered backend becomes the default.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.default_name.is_none() {
            self.default_name = Some(name);
        }
        self.factories.insert(name, factory);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let (key, _) = self
            .factories
            .get_key_value(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        self.default_name = Some(*key);
        Ok(())
    }

    pub fn default_name(&self) -> Option<&'static str> {
        self.default_name
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build a backend by name, or the default when `name` is `None`.
    pub fn build(
        &self,
        name: Option<&str>,
        settings: &DetectorSettings,
    ) -> Result<Box<dyn DetectorBackend>> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_name
                .ok_or_else(|| anyhow!("no detector backends registered"))?,
        };
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not available (built with: {})",
                name,
                self.list().join(", ")
            )
        })?;
        let mut backend = factory(settings)?;
        backend.warm_up()?;
        log::info!("detector backend '{}' ready", backend.name());
        Ok(backend)
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let backend = super::backends::TractBackend::new(settings)?;
    Ok(Box::new(backend))
}

fn build_scripted(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let path = settings
        .script_path
        .as_ref()
        .ok_or_else(|| anyhow!("scripted backend requires a detection script path"))?;
    let backend = ScriptedBackend::from_path(path)?;
    Ok(Box::new(backend))
}

fn build_stub(_settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Ok(Box::new(StubBackend::new()))
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
