use std::{
    cell::RefCell,
    collections::hash_map::Entry,
    fmt::Debug,
    rc::Rc,
};

use rustc_hash::FxHashMap;

use super::{RuntimeError, Value};

#[derive(Debug, Clone)]
pub enum Declarable {
    Variable(Value),
    Constant(Value),
}

impl Declarable {
    fn value(&self) -> &Value {
        match self {
            Declarable::Variable(value) | Declarable::Constant(value) => value,
        }
    }
}

/// One environment. Lookups that miss fall back to `parent`, which for a call
/// scope is whatever scope was current at the call site.
pub struct Scope {
    declarables: FxHashMap<String, Declarable>,
    parent: Option<Rc<RefCell<Scope>>>,
}

impl Scope {
    pub fn boxed(parent: Option<Rc<RefCell<Scope>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Scope>>>) -> Self {
        Self {
            declarables: FxHashMap::default(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(declarable) = self.declarables.get(name) {
            Some(declarable.value().clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    pub fn declare(&mut self, name: String, declarable: Declarable) -> Result<(), RuntimeError> {
        match self.declarables.entry(name) {
            Entry::Occupied(mut o) => {
                if matches!(o.get(), Declarable::Constant(_)) {
                    Err(RuntimeError::ConstRebinding(o.key().clone()))
                } else {
                    o.insert(declarable);
                    Ok(())
                }
            }
            Entry::Vacant(v) => {
                v.insert(declarable);
                Ok(())
            }
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut declarables = self
            .declarables
            .iter()
            .map(|(name, declarable)| {
                let kind = match declarable {
                    Declarable::Variable(_) => "local",
                    Declarable::Constant(_) => "const",
                };
                format!("{kind} {name} = {}", declarable.value())
            })
            .collect::<Vec<_>>();
        declarables.sort();

        f.debug_struct(format!("Scope<{:?}>", std::ptr::from_ref(self)).as_str())
            .field("declarables", &declarables)
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}
