//! Router registry: register and look up domain routers by domain prefix.

use std::collections::HashMap;
use std::sync::Arc;

use crate::executor::DomainRouter;

pub struct RouterRegistry {
    inner: HashMap<&'static str, Arc<dyn DomainRouter>>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Register a router under its own `domain()`. A later registration for
    /// the same domain replaces the earlier one.
    pub fn register(&mut self, router: Arc<dyn DomainRouter>) {
        let domain = router.domain();
        if self.inner.insert(domain, router).is_some() {
            tracing::warn!(domain = domain, "registry.replaced");
        }
    }

    pub fn with(mut self, router: Arc<dyn DomainRouter>) -> Self {
        self.register(router);
        self
    }

    /// Expects an already-normalized (lowercase) domain.
    pub fn try_resolve(&self, domain: &str) -> Option<Arc<dyn DomainRouter>> {
        self.inner.get(domain).cloned()
    }

    /// Registered domains, sorted.
    pub fn domains(&self) -> Vec<&'static str> {
        let mut d: Vec<_> = self.inner.keys().copied().collect();
        d.sort_unstable();
        d
    }
}

impl Default for RouterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
