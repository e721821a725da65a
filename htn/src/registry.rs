use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Domain;
use crate::error::HtnError;

/// Maps domain id to its (immutable, already-validated) `Domain`.
///
/// Domains are loaded once at startup and never mutated afterwards, so the
/// registry itself needs no internal locking — it is built, then shared
/// read-only behind an `Arc` by the combat handler and zone tick manager.
#[derive(Default)]
pub struct Registry {
    domains: HashMap<String, Arc<Domain>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            domains: HashMap::new(),
        }
    }

    pub fn register(&mut self, domain: Domain) -> Result<(), HtnError> {
        if self.domains.contains_key(&domain.id) {
            return Err(HtnError::DuplicateDomain(domain.id));
        }
        self.domains.insert(domain.id.clone(), Arc::new(domain));
        Ok(())
    }

    pub fn get(&self, domain_id: &str) -> Option<Arc<Domain>> {
        self.domains.get(domain_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
