//! Per-session bindings and the ordered scope chain used for name lookup.

use crate::interp::error::{EvalError, EvalResult};
use crate::interp::value::Value;
use indexmap::IndexMap;

/// Reserved slot an expression result is captured into before rendering.
pub const RESULT_SLOT: &str = "_result_";

/// Mapping of name to value, persistent for the lifetime of one session and
/// exclusively owned by it.
#[derive(Debug, Default)]
pub struct Namespace {
    bindings: IndexMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.shift_remove(name)
    }

    pub fn into_bindings(self) -> IndexMap<String, Value> {
        self.bindings
    }
}

/// A single mapping-like lookup scope.
pub trait Scope {
    fn fetch(&self, name: &str) -> Option<Value>;
}

impl Scope for Namespace {
    fn fetch(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }
}

/// Scope over a borrowed map, used for frame locals and process globals.
pub struct MapScope<'a>(pub &'a IndexMap<String, Value>);

impl Scope for MapScope<'_> {
    fn fetch(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

/// Ordered name resolution: scopes are searched front to back, first match
/// wins. Failing all of them is a distinct lookup fault.
pub struct ScopeChain<'a> {
    scopes: Vec<&'a dyn Scope>,
}

impl<'a> ScopeChain<'a> {
    pub fn new(scopes: Vec<&'a dyn Scope>) -> Self {
        Self { scopes }
    }

    pub fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.scopes
            .iter()
            .find_map(|scope| scope.fetch(name))
            .ok_or_else(|| EvalError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chain_order_first_match_wins() {
        let mut near = IndexMap::new();
        near.insert("x".to_string(), Value::Int(1));
        let mut far = IndexMap::new();
        far.insert("x".to_string(), Value::Int(2));
        far.insert("y".to_string(), Value::Int(3));

        let near_scope = MapScope(&near);
        let far_scope = MapScope(&far);
        let chain = ScopeChain::new(vec![&near_scope, &far_scope]);

        assert_eq!(chain.lookup("x").unwrap(), Value::Int(1));
        assert_eq!(chain.lookup("y").unwrap(), Value::Int(3));
        assert!(matches!(
            chain.lookup("z"),
            Err(EvalError::NotFound(name)) if name == "z"
        ));
    }
}
