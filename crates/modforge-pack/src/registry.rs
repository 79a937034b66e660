//! # Module-Name Registry
//!
//! The one piece of state shared across concurrent generation requests.
//! Each normalized `(namespace, module)` name is bound to the digest of the
//! specification that claimed it, and to the module generated from it once
//! assembly finishes.
//!
//! Storage is an arena of slots with an index map from key to slot, behind a
//! single [`parking_lot::Mutex`]. Released slots go on a free list and are
//! reused.
//!
//! | Claim | Registry state | Result |
//! |-------|----------------|--------|
//! | new name | no slot | `Fresh`, slot reserved |
//! | same digest | module stored | `Cached(module)` |
//! | same digest | still generating | `Fresh` (identical output) |
//! | other digest | any | `NameCollision` |

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use modforge_core::{ContentDigest, ModuleName};
use parking_lot::Mutex;

use crate::error::AssemblyError;
use crate::module::GeneratedModule;

/// Normalized registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub namespace: String,
    pub module: String,
}

impl RegistryKey {
    pub fn new(namespace: &str, module: &str) -> Self {
        Self {
            namespace: ModuleName::normalize(namespace),
            module: ModuleName::normalize(module),
        }
    }
}

#[derive(Debug)]
struct Slot {
    key: RegistryKey,
    spec_digest: ContentDigest,
    module: Option<Arc<GeneratedModule>>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<Option<Slot>>,
    index: HashMap<RegistryKey, usize>,
    free: Vec<usize>,
}

/// Outcome of [`ModuleRegistry::claim`].
#[derive(Debug, Clone)]
pub enum Claim {
    /// The name is reserved for this specification; generate and then
    /// [`ModuleRegistry::store`].
    Fresh,
    /// This exact specification was generated before.
    Cached(Arc<GeneratedModule>),
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    inner: Mutex<Inner>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ModuleRegistry {
        static GLOBAL: OnceLock<ModuleRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ModuleRegistry::new)
    }

    /// Reserve `module` in `namespace` for the specification with `spec_digest`.
    pub fn claim(&self, namespace: &str, module: &str, spec_digest: &ContentDigest) -> Result<Claim, AssemblyError> {
        let key = RegistryKey::new(namespace, module);
        let mut inner = self.inner.lock();
        if let Some(&at) = inner.index.get(&key) {
            if let Some(slot) = inner.slots[at].as_ref() {
                if &slot.spec_digest != spec_digest {
                    return Err(AssemblyError::NameCollision {
                        namespace: key.namespace,
                        module: key.module,
                        existing: slot.spec_digest.to_string(),
                    });
                }
                return Ok(match &slot.module {
                    Some(generated) => Claim::Cached(Arc::clone(generated)),
                    None => Claim::Fresh,
                });
            }
        }
        let slot = Slot {
            key: key.clone(),
            spec_digest: spec_digest.clone(),
            module: None,
        };
        let at = match inner.free.pop() {
            Some(at) => {
                inner.slots[at] = Some(slot);
                at
            }
            None => {
                inner.slots.push(Some(slot));
                inner.slots.len() - 1
            }
        };
        inner.index.insert(key, at);
        Ok(Claim::Fresh)
    }

    /// Record the module generated for a claimed name.
    ///
    /// Ignored when the name was released or re-claimed by a different
    /// specification in the meantime.
    pub fn store(&self, namespace: &str, spec_digest: &ContentDigest, module: Arc<GeneratedModule>) {
        let key = RegistryKey::new(namespace, module.name.as_str());
        let mut inner = self.inner.lock();
        let Some(&at) = inner.index.get(&key) else {
            return;
        };
        if let Some(slot) = inner.slots[at].as_mut() {
            if &slot.spec_digest == spec_digest {
                slot.module = Some(module);
            }
        }
    }

    /// Free a name so a different specification may claim it.
    pub fn release(&self, namespace: &str, module: &str) -> bool {
        let key = RegistryKey::new(namespace, module);
        let mut inner = self.inner.lock();
        match inner.index.remove(&key) {
            Some(at) => {
                inner.slots[at] = None;
                inner.free.push(at);
                true
            }
            None => false,
        }
    }

    /// The cached module for a name, if generation finished.
    pub fn get(&self, namespace: &str, module: &str) -> Option<Arc<GeneratedModule>> {
        let key = RegistryKey::new(namespace, module);
        let inner = self.inner.lock();
        let at = *inner.index.get(&key)?;
        inner.slots[at].as_ref().and_then(|slot| slot.module.clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock();
        let mut names: Vec<(String, String)> = inner
            .slots
            .iter()
            .flatten()
            .map(|slot| (slot.key.namespace.clone(), slot.key.module.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use std::collections::BTreeMap;

    fn digest(byte: u8) -> ContentDigest {
        ContentDigest::from_bytes([byte; 32])
    }

    fn generated(name: &str) -> Arc<GeneratedModule> {
        Arc::new(GeneratedModule {
            name: ModuleName::parse(name).unwrap(),
            namespace: "default".into(),
            version: "1.0".into(),
            manifest: Manifest {
                name: name.into(),
                version: "1.0".into(),
                summary: String::new(),
                namespace: "default".into(),
                depends: vec![],
                models: vec![],
                extends: vec![],
                data: vec![],
                workflows: vec![],
                installable: true,
            },
            files: BTreeMap::new(),
            digest: digest(9),
            implicit_rules: vec![],
        })
    }

    #[test]
    fn fresh_then_cached() {
        let registry = ModuleRegistry::new();
        assert!(matches!(registry.claim("default", "contracts", &digest(1)), Ok(Claim::Fresh)));
        assert!(matches!(registry.claim("default", "contracts", &digest(1)), Ok(Claim::Fresh)));
        registry.store("default", &digest(1), generated("contracts"));
        match registry.claim("default", "contracts", &digest(1)).unwrap() {
            Claim::Cached(module) => assert_eq!(module.name.as_str(), "contracts"),
            Claim::Fresh => panic!("expected cached module"),
        }
        assert!(registry.get("default", "contracts").is_some());
    }

    #[test]
    fn different_spec_collides_until_released() {
        let registry = ModuleRegistry::new();
        registry.claim("default", "contracts", &digest(1)).unwrap();
        let err = registry.claim("default", "contracts", &digest(2)).unwrap_err();
        assert!(matches!(err, AssemblyError::NameCollision { ref module, .. } if module == "contracts"));

        assert!(registry.release("default", "contracts"));
        assert!(!registry.release("default", "contracts"));
        assert!(matches!(registry.claim("default", "contracts", &digest(2)), Ok(Claim::Fresh)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_normalized_and_namespaced() {
        let registry = ModuleRegistry::new();
        registry.claim("default", "Contracts", &digest(1)).unwrap();
        assert!(registry.claim("default", " contracts ", &digest(2)).is_err());
        assert!(registry.claim("staging", "contracts", &digest(2)).is_ok());
        assert_eq!(
            registry.names(),
            vec![
                ("default".to_string(), "contracts".to_string()),
                ("staging".to_string(), "contracts".to_string())
            ]
        );
    }

    #[test]
    fn released_slots_are_reused() {
        let registry = ModuleRegistry::new();
        registry.claim("default", "a", &digest(1)).unwrap();
        registry.release("default", "a");
        registry.claim("default", "b", &digest(2)).unwrap();
        assert_eq!(registry.inner.lock().slots.len(), 1);
    }

    #[test]
    fn store_after_release_is_ignored() {
        let registry = ModuleRegistry::new();
        registry.claim("default", "contracts", &digest(1)).unwrap();
        registry.release("default", "contracts");
        registry.store("default", &digest(1), generated("contracts"));
        assert!(registry.get("default", "contracts").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_claims_of_one_name_agree() {
        let registry = Arc::new(ModuleRegistry::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.claim("default", "shared", &digest(i % 2)).is_ok())
            })
            .collect();
        let accepted: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = accepted.iter().filter(|ok| **ok).count();
        assert_eq!(winners, 4);
    }
}
