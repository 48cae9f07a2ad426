//! Model registry — load-once, process-lifetime model handles.

use crate::config::Config;
use percept_core::classifier::ClassifierError;
use percept_core::detector::DetectorError;
use percept_core::{ObjectDetector, ObjectModel, SceneClassifier, SceneModel};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("scene classifier load failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("object detector load failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("model load task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Holds both model handles for the lifetime of the process.
///
/// Either both models are present or neither is observable: fusion is
/// skipped entirely while `models()` returns `None`. There is no
/// unload and no reload.
pub struct ModelRegistry {
    scene: Option<Arc<dyn SceneClassifier>>,
    object: Option<Arc<dyn ObjectDetector>>,
}

impl ModelRegistry {
    /// A registry that will never become ready. The fallback when
    /// loading fails: the daemon stays up, ticks no-op.
    pub fn empty() -> Self {
        Self {
            scene: None,
            object: None,
        }
    }

    /// Build a ready registry from existing handles.
    pub fn with_models(
        scene: Arc<dyn SceneClassifier>,
        object: Arc<dyn ObjectDetector>,
    ) -> Self {
        Self {
            scene: Some(scene),
            object: Some(object),
        }
    }

    /// Load both ONNX models concurrently; ready only when both
    /// succeed. A failure of either is fatal to readiness and is not
    /// retried.
    pub async fn load(config: &Config) -> Result<Self, RegistryError> {
        let scene_model = config.scene_model_path();
        let scene_labels = config.scene_labels_path();
        let object_model = config.object_model_path();
        let object_labels = config.object_labels_path();

        let scene_task =
            tokio::task::spawn_blocking(move || SceneModel::load(&scene_model, &scene_labels));
        let object_task =
            tokio::task::spawn_blocking(move || ObjectModel::load(&object_model, &object_labels));

        let (scene, object) = tokio::try_join!(scene_task, object_task)?;
        let scene = scene?;
        let object = object?;

        tracing::info!("both models loaded, registry ready");
        Ok(Self::with_models(Arc::new(scene), Arc::new(object)))
    }

    /// True iff both handles are populated.
    pub fn is_ready(&self) -> bool {
        self.scene.is_some() && self.object.is_some()
    }

    /// Both handles, or `None` while not ready.
    #[allow(clippy::type_complexity)]
    pub fn models(&self) -> Option<(Arc<dyn SceneClassifier>, Arc<dyn ObjectDetector>)> {
        match (&self.scene, &self.object) {
            (Some(scene), Some(object)) => Some((Arc::clone(scene), Arc::clone(object))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockObject, MockScene};

    #[test]
    fn test_empty_registry_not_ready() {
        let registry = ModelRegistry::empty();
        assert!(!registry.is_ready());
        assert!(registry.models().is_none());
    }

    #[test]
    fn test_with_models_is_ready() {
        let registry = ModelRegistry::with_models(
            Arc::new(MockScene::returning(vec![])),
            Arc::new(MockObject::returning(vec![])),
        );
        assert!(registry.is_ready());
        assert!(registry.models().is_some());
    }

    #[tokio::test]
    async fn test_load_fails_on_missing_models() {
        let config = Config {
            model_dir: "/nonexistent/percept-test-models".into(),
            device_map_path: None,
            tick_period_ms: 1000,
            initial_facing: percept_hw::FacingMode::User,
            ideal_width: 1080,
            ideal_height: 1920,
        };
        let err = ModelRegistry::load(&config).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Classifier(_) | RegistryError::Detector(_)
        ));
    }
}
