// File: src/registry.rs
//
// Name -> operation table. Operation modules call `register` once at engine
// setup; the Compiler consults `lookup` to resolve an `OtherName` token into
// an overload chain. A name may be registered more than once under distinct
// filters — first-match-in-registration-order dispatch at execute time is
// what lets `+` mean integer add, float add, big-decimal add, or string
// concatenation without a single operation needing to branch on type.

use crate::errors::{CompileError, CompileErrorKind, SourceLocation};
use crate::filter::Filter;
use crate::task::Task;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single built-in operation. Implementors are stateless (all per-call
/// data lives on the `OperationReference`/`Task`, never on the operation
/// itself), so one instance is shared by every reference that resolves to
/// it.
pub trait Operation: fmt::Debug + Send + Sync {
    fn execute(&self, task: &mut Task) -> Result<(), crate::errors::RuntimeError>;
}

#[derive(Clone)]
pub struct Overload {
    pub filter: Option<Arc<Filter>>,
    pub op: Arc<dyn Operation>,
}

#[derive(Default)]
pub struct Registry {
    table: HashMap<String, Vec<Overload>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `op` under `name` (case-insensitive: stored upper-cased).
    /// Two registrations under the same name with the same filter (or both
    /// with no filter) collide and are rejected per spec §4.5/§7.
    pub fn register(
        &mut self,
        name: &str,
        filter: Option<Arc<Filter>>,
        op: Arc<dyn Operation>,
    ) -> Result<(), CompileError> {
        let key = name.to_uppercase();
        let entry = self.table.entry(key.clone()).or_default();
        for existing in entry.iter() {
            let same_filter = match (&existing.filter, &filter) {
                (None, None) => true,
                (Some(a), Some(b)) => a.collides_with(b),
                _ => false,
            };
            if same_filter {
                return Err(CompileError::new(
                    CompileErrorKind::Overload,
                    format!("operation '{}' is already registered with this filter", key),
                    SourceLocation::unknown(),
                ));
            }
        }
        entry.push(Overload { filter, op });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Vec<Overload>> {
        self.table.get(&name.to_uppercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(&name.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuntimeError;

    #[derive(Debug)]
    struct NoOp;
    impl Operation for NoOp {
        fn execute(&self, _task: &mut Task) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_unfiltered_registration_collides() {
        let mut reg = Registry::new();
        reg.register("FOO", None, Arc::new(NoOp)).unwrap();
        assert!(reg.register("FOO", None, Arc::new(NoOp)).is_err());
    }

    #[test]
    fn distinct_filters_may_share_a_name() {
        let mut reg = Registry::new();
        reg.register("FOO", Some(crate::filter::TOP_LONG.clone()), Arc::new(NoOp)).unwrap();
        reg.register("FOO", Some(crate::filter::TOP_STRING.clone()), Arc::new(NoOp)).unwrap();
        assert_eq!(reg.lookup("foo").unwrap().len(), 2);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut reg = Registry::new();
        reg.register("Foo", None, Arc::new(NoOp)).unwrap();
        assert!(reg.lookup("FOO").is_some());
        assert!(reg.contains("foo"));
    }
}
