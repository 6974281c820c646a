// src/core/environment.rs
//! Scope chains. Each environment owns its bindings and holds a shared
//! handle on its parent, so a child never outlives the scopes it can see;
//! closures keep their defining chain alive through the same handles.
//!
//! Variables, functions, classes, and blocks are distinct namespaces: a
//! name may denote a variable and a function simultaneously.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::interpreter::RuntimeError;
use crate::core::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Clone)]
pub struct Variable {
    pub value: Value,
    pub mutable: bool,
    pub constant: bool,
}

#[derive(Default)]
pub struct Environment {
    parent: Option<EnvRef>,
    pub variables: IndexMap<String, Variable>,
    pub functions: IndexMap<String, Value>,
    pub classes: IndexMap<String, Value>,
    pub blocks: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            parent: Some(Rc::clone(parent)),
            ..Environment::default()
        }))
    }

    pub fn define(&mut self, name: &str, value: Value, mutable: bool, constant: bool) {
        self.variables.insert(name.to_string(), Variable { value, mutable, constant });
    }

    pub fn define_function(&mut self, name: &str, func: Value) {
        self.functions.insert(name.to_string(), func);
    }

    pub fn define_class(&mut self, name: &str, class: Value) {
        self.classes.insert(name.to_string(), class);
    }

    pub fn define_block(&mut self, name: &str, block: Value) {
        self.blocks.insert(name.to_string(), block);
    }

    pub fn get(env: &EnvRef, name: &str) -> Result<Value, RuntimeError> {
        if let Some(var) = env.borrow().variables.get(name) {
            return Ok(var.value.clone());
        }
        if let Some(parent) = env.borrow().parent.clone() {
            return Environment::get(&parent, name);
        }
        Err(RuntimeError::name(format!("Undefined: {}", name)))
    }

    pub fn get_function(env: &EnvRef, name: &str) -> Option<Value> {
        if let Some(func) = env.borrow().functions.get(name) {
            return Some(func.clone());
        }
        let parent = env.borrow().parent.clone();
        parent.and_then(|p| Environment::get_function(&p, name))
    }

    pub fn get_class(env: &EnvRef, name: &str) -> Option<Value> {
        if let Some(class) = env.borrow().classes.get(name) {
            return Some(class.clone());
        }
        let parent = env.borrow().parent.clone();
        parent.and_then(|p| Environment::get_class(&p, name))
    }

    pub fn get_block(env: &EnvRef, name: &str) -> Option<Value> {
        if let Some(block) = env.borrow().blocks.get(name) {
            return Some(block.clone());
        }
        let parent = env.borrow().parent.clone();
        parent.and_then(|p| Environment::get_block(&p, name))
    }

    /// Reassign an existing binding, walking up the chain to the scope that
    /// declared it. Constants and immutable bindings reject reassignment.
    pub fn set(env: &EnvRef, name: &str, value: Value) -> Result<(), RuntimeError> {
        if env.borrow().variables.contains_key(name) {
            let mut scope = env.borrow_mut();
            let var = scope.variables.get_mut(name).unwrap();
            if var.constant {
                return Err(RuntimeError::type_error(format!(
                    "Cannot reassign constant: {}",
                    name
                )));
            }
            if !var.mutable {
                return Err(RuntimeError::type_error(format!(
                    "Cannot reassign immutable: {}",
                    name
                )));
            }
            var.value = value;
            return Ok(());
        }
        if let Some(parent) = env.borrow().parent.clone() {
            return Environment::set(&parent, name, value);
        }
        Err(RuntimeError::name(format!("Undefined: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Int(1), false, false);
        let inner = Environment::child(&root);
        assert!(matches!(Environment::get(&inner, "x"), Ok(Value::Int(1))));
        assert!(Environment::get(&inner, "y").is_err());
    }

    #[test]
    fn set_mutates_declaring_scope() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Int(1), true, false);
        let inner = Environment::child(&root);
        Environment::set(&inner, "x", Value::Int(5)).expect("assigns");
        assert!(matches!(Environment::get(&root, "x"), Ok(Value::Int(5))));
    }

    #[test]
    fn constants_and_immutables_reject_reassignment() {
        let env = Environment::new();
        env.borrow_mut().define("c", Value::Int(1), false, true);
        env.borrow_mut().define("i", Value::Int(1), false, false);
        let err = Environment::set(&env, "c", Value::Int(2)).unwrap_err();
        assert!(err.message.contains("constant"));
        let err = Environment::set(&env, "i", Value::Int(2)).unwrap_err();
        assert!(err.message.contains("immutable"));
    }

    #[test]
    fn namespaces_do_not_collide() {
        let env = Environment::new();
        env.borrow_mut().define("f", Value::Int(1), false, false);
        env.borrow_mut().define_function("f", Value::Str("func".into()));
        assert!(matches!(Environment::get(&env, "f"), Ok(Value::Int(1))));
        assert!(matches!(
            Environment::get_function(&env, "f"),
            Some(Value::Str(_))
        ));
    }

    #[test]
    fn shadowing_in_child_scope() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Int(1), false, false);
        let inner = Environment::child(&root);
        inner.borrow_mut().define("x", Value::Int(2), false, false);
        assert!(matches!(Environment::get(&inner, "x"), Ok(Value::Int(2))));
        assert!(matches!(Environment::get(&root, "x"), Ok(Value::Int(1))));
    }
}
