#[derive(Debug, Clone)]
pub struct ProviderRegistry<T: NamedProvider> {
    providers: Vec<T>,
}

pub trait NamedProvider {
    fn name(&self) -> &str;
}

impl<T: NamedProvider> ProviderRegistry<T> {
    pub fn new(providers: Vec<T>) -> Self {
        Self { providers }
    }

    pub fn register(&mut self, provider: T) {
        self.providers
            .retain(|existing| existing.name() != provider.name());
        self.providers.push(provider);
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        let wanted = name.trim();
        self.providers
            .iter()
            .find(|provider| provider.name().eq_ignore_ascii_case(wanted))
    }

    /// Like `get`, with an error naming the registered backends.
    pub fn resolve(&self, name: &str) -> Result<&T, String> {
        self.get(name).ok_or_else(|| {
            format!(
                "backend '{}' not registered (available: [{}])",
                name.trim(),
                self.list().join(", ")
            )
        })
    }

    pub fn list(&self) -> Vec<String> {
        let mut names = self
            .providers
            .iter()
            .map(|provider| provider.name().to_string())
            .collect::<Vec<String>>();
        names.sort();
        names
    }

    pub fn providers(&self) -> &[T] {
        self.providers.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::{NamedProvider, ProviderRegistry};

    #[derive(Clone, Debug)]
    struct DummyBackend {
        name: String,
        tag: u8,
    }

    impl NamedProvider for DummyBackend {
        fn name(&self) -> &str {
            self.name.as_str()
        }
    }

    fn backend(name: &str, tag: u8) -> DummyBackend {
        DummyBackend {
            name: name.to_string(),
            tag,
        }
    }

    #[test]
    fn list_is_sorted_but_registration_order_is_kept() {
        let registry = ProviderRegistry::new(vec![
            backend("z", 0),
            backend("a", 0),
            backend("m", 0),
        ]);
        assert_eq!(registry.list(), vec!["a", "m", "z"]);
        assert_eq!(
            registry
                .providers()
                .iter()
                .map(|provider| provider.name().to_string())
                .collect::<Vec<String>>(),
            vec!["z", "a", "m"]
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_register_replaces() {
        let mut registry = ProviderRegistry::new(vec![backend("http", 1)]);
        registry.register(backend("dryrun", 2));
        registry.register(backend("http", 3));
        assert_eq!(registry.providers().len(), 2);
        assert_eq!(registry.get(" HTTP ").map(|found| found.tag), Some(3));
    }

    #[test]
    fn resolve_reports_available_backends() {
        let registry = ProviderRegistry::new(vec![backend("http", 1), backend("dryrun", 2)]);
        assert_eq!(
            registry.resolve("replicate").err().unwrap_or_default(),
            "backend 'replicate' not registered (available: [dryrun, http])"
        );
    }
}
