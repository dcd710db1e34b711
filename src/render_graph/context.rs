//! Per-frame typed payload store shared between passes.
//!
//! A pass publishes the handles it produced (e.g. `ShadowOutput`) while
//! recording, and later passes look them up by type. Each type can be added
//! once per frame; there is no removal or replacement.

use std::any::{Any, TypeId};
use std::collections::HashMap;

struct ContextEntry {
    value: Box<dyn Any>,
    type_name: &'static str,
}

/// Type-keyed storage for inter-pass payloads.
#[derive(Default)]
pub struct Context {
    entries: HashMap<TypeId, ContextEntry>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a payload.
    ///
    /// # Panics
    ///
    /// If a payload of type `T` was already added this frame.
    pub fn add<T: 'static>(&mut self, value: T) {
        let type_name = std::any::type_name::<T>();
        let previous = self.entries.insert(
            TypeId::of::<T>(),
            ContextEntry {
                value: Box::new(value),
                type_name,
            },
        );
        assert!(
            previous.is_none(),
            "Context already contains a value of type {}",
            type_name
        );
        log::trace!("Context: published {}", type_name);
    }

    /// Look up a payload published by an earlier pass.
    ///
    /// # Panics
    ///
    /// If no payload of type `T` has been added.
    pub fn get<T: 'static>(&self) -> &T {
        self.try_get::<T>().unwrap_or_else(|| {
            panic!(
                "Context does not contain a value of type {}",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn try_get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the published payload types, for diagnostics.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|entry| entry.type_name)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.type_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Backbuffer(u32);

    #[derive(Debug, PartialEq)]
    struct ShadowMap(u32);

    #[test]
    fn test_add_and_get() {
        let mut context = Context::new();
        context.add(Backbuffer(1));
        context.add(ShadowMap(2));

        assert_eq!(context.get::<Backbuffer>(), &Backbuffer(1));
        assert_eq!(context.get::<ShadowMap>(), &ShadowMap(2));
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_try_get_absent() {
        let context = Context::new();
        assert!(context.try_get::<Backbuffer>().is_none());
        assert!(!context.contains::<Backbuffer>());
    }

    #[test]
    #[should_panic(expected = "already contains")]
    fn test_add_twice_panics() {
        let mut context = Context::new();
        context.add(Backbuffer(1));
        context.add(Backbuffer(2));
    }

    #[test]
    #[should_panic(expected = "does not contain a value of type")]
    fn test_get_absent_panics() {
        let context = Context::new();
        let _ = context.get::<ShadowMap>();
    }
}
