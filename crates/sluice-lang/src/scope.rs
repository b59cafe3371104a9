use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use sluice_types::Result;

use crate::value::Value;

/// A function callable from expressions.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Immutable snapshot of variables and functions, with an optional parent
/// consulted when a name is not found locally.
///
/// Cloning is cheap; scopes are never mutated after they are built.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    variables: BTreeMap<String, Value>,
    functions: BTreeMap<String, Function>,
    parent: Option<Scope>,
}

impl Scope {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    /// Child scope holding `additions`' own variables and functions, with
    /// `parent` as fallback. Neither input is modified.
    pub fn compose(parent: &Scope, additions: &Scope) -> Scope {
        Scope {
            inner: Arc::new(ScopeInner {
                variables: additions.inner.variables.clone(),
                functions: additions.inner.functions.clone(),
                parent: Some(parent.clone()),
            }),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.inner
            .variables
            .get(name)
            .or_else(|| self.inner.parent.as_ref()?.variable(name))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.inner
            .functions
            .get(name)
            .or_else(|| self.inner.parent.as_ref()?.function(name))
    }

    /// Variables defined directly on this scope, ignoring the parent chain.
    pub fn local_variables(&self) -> &BTreeMap<String, Value> {
        &self.inner.variables
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Every variable name visible from this scope, sorted.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            names.extend(scope.inner.variables.keys().cloned());
            current = scope.parent();
        }
        names.into_iter().collect()
    }

    /// Every function name visible from this scope, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            names.extend(scope.inner.functions.keys().cloned());
            current = scope.parent();
        }
        names.into_iter().collect()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("variables", &self.inner.variables)
            .field("functions", &self.inner.functions.keys().collect::<Vec<_>>())
            .field("parent", &self.inner.parent)
            .finish()
    }
}

#[derive(Default)]
pub struct ScopeBuilder {
    variables: BTreeMap<String, Value>,
    functions: BTreeMap<String, Function>,
}

impl ScopeBuilder {
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn function<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.shared_function(name, Arc::new(f))
    }

    pub fn shared_function(mut self, name: impl Into<String>, f: Function) -> Self {
        self.functions.insert(name.into(), f);
        self
    }

    pub fn build(self) -> Scope {
        Scope {
            inner: Arc::new(ScopeInner {
                variables: self.variables,
                functions: self.functions,
                parent: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(v: i64) -> impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static {
        move |_| Ok(Value::Integer(v))
    }

    #[test]
    fn child_shadows_parent() {
        let parent = Scope::builder()
            .variable("a", 1)
            .variable("b", 2)
            .function("f", constant(1))
            .build();
        let additions = Scope::builder()
            .variable("a", 10)
            .function("f", constant(10))
            .build();
        let child = Scope::compose(&parent, &additions);

        assert_eq!(child.variable("a"), Some(&Value::Integer(10)));
        assert_eq!(child.variable("b"), Some(&Value::Integer(2)));
        assert!(child.variable("c").is_none());

        let f = child.function("f").unwrap();
        assert_eq!((**f)(&[]).unwrap(), Value::Integer(10));
    }

    #[test]
    fn compose_leaves_inputs_untouched() {
        let parent = Scope::builder().variable("a", 1).build();
        let additions = Scope::builder().variable("b", 2).build();
        let _child = Scope::compose(&parent, &additions);

        assert!(parent.variable("b").is_none());
        assert!(additions.variable("a").is_none());
        assert!(additions.parent().is_none());
    }

    #[test]
    fn functions_fall_back_through_the_chain() {
        let base = Scope::builder().function("upper", constant(1)).build();
        let mid = Scope::compose(&base, &Scope::builder().variable("x", 1).build());
        let top = Scope::compose(&mid, &Scope::builder().variable("y", 2).build());

        assert!(top.function("upper").is_some());
        assert_eq!(top.function_names(), vec!["upper".to_string()]);
        assert_eq!(top.variable_names(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn scopes_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scope>();
    }
}
