// src/core/value.rs
//! Runtime value representation: a closed tagged union over the dynamic
//! type space, with shared-ownership handles for the mutable aggregates
//! (arrays, maps, object fields) and for closure environments.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::ast::{Expr, Parameter, Stmt};
use crate::core::environment::EnvRef;
use crate::core::interpreter::RuntimeError;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
    Tuple(Rc<Vec<Value>>),
    Function(Rc<Function>),
    Lambda(Rc<Lambda>),
    Class(Rc<ClassDef>),
    Object(Rc<Object>),
    Block(Rc<BlockNamespace>),
    Native(NativeFunction),
    Bound(Rc<BoundMethod>),
}

/// A user-defined function together with its captured closure environment.
/// The environment is jointly owned: it stays alive as long as any value
/// referencing this function is reachable.
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<Stmt>,
    pub closure: EnvRef,
}

pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Expr,
    pub closure: EnvRef,
}

pub struct ClassDef {
    pub name: String,
    pub parent: Option<Rc<ClassDef>>,
    pub methods: IndexMap<String, Rc<Function>>,
    /// Field defaults, evaluated once at class-declaration time and copied
    /// into each new instance.
    pub fields: IndexMap<String, Value>,
    pub init_method: Option<Rc<Function>>,
}

impl ClassDef {
    /// Method lookup walks the parent chain; the hierarchy is runtime data,
    /// so dispatch is explicit iteration rather than host-language vtables.
    pub fn get_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.parent.as_ref().and_then(|p| p.get_method(name))
    }
}

pub struct Object {
    pub class_def: Rc<ClassDef>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl Object {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

/// A `block Name { ... }` namespace: named functions and constants reached
/// via member access.
pub struct BlockNamespace {
    pub name: String,
    pub members: IndexMap<String, Value>,
}

/// A method closed over both its defining environment and a receiver.
pub struct BoundMethod {
    pub receiver: Rc<Object>,
    pub method: Rc<Function>,
    pub defining_class: Rc<ClassDef>,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: fn(&[Value]) -> Result<Value, RuntimeError>,
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// null, false, numeric zero, and empty string/array/map are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Tuple(_) => "tuple",
            Value::Function(_) => "function",
            Value::Lambda(_) => "lambda",
            Value::Class(_) => "class",
            Value::Object(_) => "object",
            Value::Block(_) => "block",
            Value::Native(_) => "function",
            Value::Bound(_) => "function",
        }
    }

    /// Value equality used by `==`, `match`, and `contains`: deep for
    /// aggregates, numeric across int/float, identity for everything else.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map(|w| v.equals(w)).unwrap_or(false))
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Plain stringification backing `print`, interpolation, and string
    /// concatenation: strings render without quotes.
    pub fn stringify(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Array(a) => {
                let parts: Vec<String> = a.borrow().iter().map(|v| v.stringify()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v.stringify()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Tuple(t) => {
                let parts: Vec<String> = t.iter().map(|v| v.stringify()).collect();
                format!("({})", parts.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Result-display formatting consumed by the shell: strings are quoted,
/// aggregates render recursively in insertion order, objects as
/// `<ClassName instance>`, functions as `<function name>`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Array(a) => {
                write!(f, "[")?;
                for (idx, value) in a.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in m.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Tuple(t) => {
                write!(f, "(")?;
                for (idx, value) in t.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            Value::Function(fun) => write!(f, "<function {}>", fun.name),
            Value::Lambda(_) => write!(f, "<lambda>"),
            Value::Class(cls) => write!(f, "<class {}>", cls.name),
            Value::Object(obj) => write!(f, "<{} instance>", obj.class_def.name),
            Value::Block(block) => write!(f, "<block {}>", block.name),
            Value::Native(fun) => write!(f, "<function {}>", fun.name),
            Value::Bound(bound) => write!(f, "<function {}>", bound.method.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values() {
        for v in [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::Str(String::new()),
            Value::array(vec![]),
            Value::map(IndexMap::new()),
        ] {
            assert!(!v.is_truthy(), "{} should be falsy", v.type_name());
        }
        for v in [
            Value::Bool(true),
            Value::Int(-1),
            Value::Float(0.5),
            Value::Str("x".into()),
            Value::array(vec![Value::Null]),
        ] {
            assert!(v.is_truthy(), "{} should be truthy", v.type_name());
        }
    }

    #[test]
    fn display_formatting() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        let arr = Value::array(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(arr.to_string(), "[1, \"a\"]");
        let mut entries = IndexMap::new();
        entries.insert("b".to_string(), Value::Int(2));
        entries.insert("a".to_string(), Value::Int(1));
        // Insertion order, not sorted.
        assert_eq!(Value::map(entries).to_string(), "{\"b\": 2, \"a\": 1}");
    }

    #[test]
    fn stringify_leaves_strings_bare() {
        assert_eq!(Value::Str("hi".into()).stringify(), "hi");
        assert_eq!(
            Value::array(vec![Value::Str("a".into())]).stringify(),
            "[a]"
        );
    }

    #[test]
    fn equality_is_deep_for_aggregates() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(a.equals(&b));
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).equals(&Value::Str("2".into())));
    }

    #[test]
    fn array_aliases_share_storage() {
        let a = Value::array(vec![Value::Int(1)]);
        let alias = a.clone();
        if let Value::Array(cell) = &a {
            cell.borrow_mut().push(Value::Int(2));
        }
        if let Value::Array(cell) = &alias {
            assert_eq!(cell.borrow().len(), 2);
        }
    }
}
