use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Text,
    Vision,
    Image,
    Video,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Vision => "vision",
            Capability::Image => "image",
            Capability::Video => "video",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: Capability) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert =
        |name: &str, provider: &str, capabilities: &[Capability], context_window: Option<u64>| {
            map.insert(
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: provider.to_string(),
                    capabilities: capabilities.to_vec(),
                    context_window,
                },
            );
        };

    // First entry per capability is the default.
    insert(
        "gemini-2.5-flash",
        "gemini",
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert(
        "gemini-2.5-pro",
        "gemini",
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert("imagen-4.0-generate-001", "gemini", &[Capability::Image], None);
    insert("imagen-4.0-fast-generate-001", "gemini", &[Capability::Image], None);
    insert("gemini-2.5-flash-image", "gemini", &[Capability::Image], None);
    insert("veo-3.0-generate-001", "gemini", &[Capability::Video], None);
    insert("veo-3.0-fast-generate-001", "gemini", &[Capability::Video], None);
    insert("veo-2.0-generate-001", "gemini", &[Capability::Video], None);
    insert(
        "dryrun-multimodal-1",
        "dryrun",
        &[
            Capability::Text,
            Capability::Vision,
            Capability::Image,
            Capability::Video,
        ],
        Some(8192),
    );

    map
}
