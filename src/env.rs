use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// One scope frame: bindings plus an optional link to the enclosing
/// frame. The parent link is a shared, non-owning back-edge; frames form
/// a chain, never a cycle.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, Value>,
    parent: Option<Rc<RefCell<Env>>>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    /// Resolve a symbol, walking the parent chain. The caller owns the
    /// returned copy; an unbound name comes back as an error value.
    pub fn get(&self, name: &str) -> Value {
        if let Some(value) = self.vars.get(name) {
            value.clone()
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            Value::err(format!("Unbound symbol '{}'", name))
        }
    }

    /// Bind in this frame, replacing any previous binding for the name.
    pub fn put(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Bind in the root frame, following parent links all the way up.
    pub fn def(&mut self, name: &str, value: Value) {
        match &self.parent {
            Some(parent) => parent.borrow_mut().def(name, value),
            None => self.put(name, value),
        }
    }

    /// Attach this frame below `parent` for the duration of a call.
    pub fn set_parent(&mut self, parent: Rc<RefCell<Env>>) {
        self.parent = Some(parent);
    }
}
