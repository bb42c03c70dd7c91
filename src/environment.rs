use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Arc};

use log::trace;

use crate::{
    error::{EvalResult, RuntimeError},
    natives::NativeRegistry,
    value::Value,
};

struct Binding {
    value: Value,
    constant: bool,
}

/// A scope frame. Children hold a shared handle to their parent; a parent
/// never references its children.
pub struct Environment {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new(parent: Option<Rc<Environment>>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent,
        })
    }

    /// Top-level frame with `true`, `false`, `null` and every registered native.
    pub fn global(natives: &NativeRegistry) -> Rc<Self> {
        let env = Self::new(None);
        {
            let mut bindings = env.bindings.borrow_mut();
            let mut constant = |name: &str, value: Value| {
                bindings.insert(
                    name.to_string(),
                    Binding {
                        value,
                        constant: true,
                    },
                );
            };
            constant("true", Value::Boolean(true));
            constant("false", Value::Boolean(false));
            constant("null", Value::Null);
            for native in natives.functions() {
                constant(&native.name, Value::NativeFunction(Arc::clone(native)));
            }
        }
        env
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    /// Creates a binding in this frame; names already bound here are rejected.
    pub fn declare(&self, name: &str, value: Value, constant: bool) -> EvalResult<Value> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(RuntimeError::Redeclaration {
                name: name.to_string(),
            });
        }
        trace!("declare '{}' (constant: {})", name, constant);
        bindings.insert(
            name.to_string(),
            Binding {
                value: value.clone(),
                constant,
            },
        );
        Ok(value)
    }

    /// Overwrites the binding in the nearest frame that owns `name`.
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<Value> {
        let owner = self
            .resolve(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })?;
        let mut bindings = owner.bindings.borrow_mut();
        match bindings.get_mut(name) {
            Some(binding) if binding.constant => Err(RuntimeError::ConstantReassignment {
                name: name.to_string(),
            }),
            Some(binding) => {
                binding.value = value.clone();
                Ok(value)
            }
            None => Err(RuntimeError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    pub fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.resolve(name)
            .and_then(|owner| {
                owner
                    .bindings
                    .borrow()
                    .get(name)
                    .map(|binding| binding.value.clone())
            })
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.resolve(name)
            .and_then(|owner| {
                owner
                    .bindings
                    .borrow()
                    .get(name)
                    .map(|binding| binding.constant)
            })
            .unwrap_or(false)
    }

    fn resolve(&self, name: &str) -> Option<&Environment> {
        if self.bindings.borrow().contains_key(name) {
            Some(self)
        } else {
            self.parent.as_deref().and_then(|parent| parent.resolve(name))
        }
    }
}
