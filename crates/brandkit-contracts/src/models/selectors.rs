use super::registry::{Capability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves the model for one pipeline step. An unknown or incapable
    /// request falls back to the first registered model for the capability.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::super::registry::{Capability, ModelRegistry, ModelSpec};
    use super::ModelSelector;

    fn image_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "dryrun".to_string(),
            capabilities: vec![Capability::Image],
            context_window: None,
        }
    }

    #[test]
    fn selector_falls_back_when_requested_model_unavailable() {
        let mut models = IndexMap::new();
        models.insert("imagen-fallback".to_string(), image_model("imagen-fallback"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("missing"), Capability::Image)
            .unwrap();
        assert_eq!(selection.model.name, "imagen-fallback");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'image'.")
        );
    }

    #[test]
    fn selector_without_request_uses_default_with_explanation() {
        let selection = ModelSelector::new(None)
            .select(Some("  "), Capability::Video)
            .unwrap();
        assert_eq!(selection.model.name, "veo-3.0-generate-001");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn selector_rejects_model_lacking_capability() {
        let selection = ModelSelector::new(None)
            .select(Some("imagen-4.0-generate-001"), Capability::Vision)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert!(selection.fallback_reason.is_some());
    }

    #[test]
    fn selector_errors_when_no_models_for_capability() {
        let mut models = IndexMap::new();
        models.insert("image-only".to_string(), image_model("image-only"));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("veo"), Capability::Video)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'video'.");
    }
}
