//! Console variable lookup with lazy, success-only caching.

use std::cell::Cell;

/// Identifier of a console variable inside a `ConVarStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConVarId(pub usize);

/// Configuration collaborator: named console-style variables.
pub trait ConVarStore {
    /// Looks up a variable by name; `None` if it does not exist.
    fn find_convar(&self, name: &str) -> Option<ConVarId>;

    /// Current boolean value of a previously found variable.
    fn convar_bool(&self, id: ConVarId) -> Option<bool>;
}

/// A named variable whose id is cached after the first successful lookup.
///
/// While the variable is missing every read retries the lookup, so a
/// variable registered late is picked up on next use.
#[derive(Debug)]
pub struct CachedConVar {
    name: String,
    id: Cell<Option<ConVarId>>,
}

impl CachedConVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Cell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the variable, `None` if it does not exist (yet).
    pub fn get_bool<S: ConVarStore + ?Sized>(&self, store: &S) -> Option<bool> {
        let id = match self.id.get() {
            Some(id) => id,
            None => {
                let id = store.find_convar(&self.name)?;
                self.id.set(Some(id));
                id
            }
        };
        store.convar_bool(id)
    }

    /// True once a lookup has succeeded.
    pub fn is_resolved(&self) -> bool {
        self.id.get().is_some()
    }

    /// Forgets the cached id, e.g. when the store is replaced.
    pub fn invalidate(&self) {
        self.id.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CountingStore {
        vars: Vec<(String, bool)>,
        lookups: RefCell<usize>,
    }

    impl ConVarStore for CountingStore {
        fn find_convar(&self, name: &str) -> Option<ConVarId> {
            *self.lookups.borrow_mut() += 1;
            self.vars.iter().position(|(n, _)| n == name).map(ConVarId)
        }

        fn convar_bool(&self, id: ConVarId) -> Option<bool> {
            self.vars.get(id.0).map(|(_, v)| *v)
        }
    }

    #[test]
    fn test_cached_after_first_success() {
        let store = CountingStore {
            vars: vec![("tf_caplinear".to_string(), true)],
            lookups: RefCell::new(0),
        };
        let var = CachedConVar::new("tf_caplinear");

        assert_eq!(var.get_bool(&store), Some(true));
        assert_eq!(var.get_bool(&store), Some(true));
        assert!(var.is_resolved());
        assert_eq!(*store.lookups.borrow(), 1);
    }

    #[test]
    fn test_missing_variable_retries() {
        let store = CountingStore {
            vars: vec![],
            lookups: RefCell::new(0),
        };
        let var = CachedConVar::new("tf_gamemode_cp");

        assert_eq!(var.get_bool(&store), None);
        assert_eq!(var.get_bool(&store), None);
        assert!(!var.is_resolved());
        assert_eq!(*store.lookups.borrow(), 2);
    }
}
