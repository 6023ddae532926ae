//! Runtime value representation.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::html::HtmlBuffer;

/// Shared, mutable ownership of a runtime object.
#[derive(Debug, Default)]
pub struct RcCell<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RcCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> RcCell<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Borrows the value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Borrows the value mutably.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> From<T> for RcCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// A struct instance: a name plus positional field slots.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Struct name
    pub name: String,
    /// Field names in slot order
    pub names: Vec<String>,
    /// Field slots; `None` until the first `StoreField`
    pub fields: Vec<Option<Value>>,
}

impl StructValue {
    /// Creates an instance with every slot unset.
    pub fn new(name: String, names: Vec<String>) -> Self {
        let fields = vec![None; names.len()];
        Self { name, names, fields }
    }

    /// The value of the named field, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.names.iter().position(|n| n == name)?;
        self.fields.get(index)?.as_ref()
    }
}

/// A value on the VM stack or in a local slot.
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Text
    String(String),
    /// Shared struct instance
    Struct(RcCell<StructValue>),
    /// Shared array
    Array(RcCell<Vec<Value>>),
    /// Shared element or fragment
    Html(RcCell<HtmlBuffer>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Html(a), Value::Html(b)) => a.ptr_eq(b) || a.borrow().to_nodes() == b.borrow().to_nodes(),
            _ => false,
        }
    }
}

impl Value {
    /// Short name of the runtime kind, used in fault messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Html(_) => "html",
        }
    }

    /// Whether this is a bool, int, float or string.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Creates a struct value with every field set.
    pub fn new_struct(name: &str, fields: Vec<(&str, Value)>) -> Self {
        Value::Struct(RcCell::new(StructValue {
            name: name.to_string(),
            names: fields.iter().map(|(n, _)| n.to_string()).collect(),
            fields: fields.into_iter().map(|(_, v)| Some(v)).collect(),
        }))
    }

    /// Creates an array value.
    pub fn new_array(elements: Vec<Value>) -> Self {
        Value::Array(RcCell::new(elements))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Struct(st) => write!(f, "{}{{...}}", st.borrow().name),
            Value::Array(elements) => write!(f, "[{} element(s)]", elements.borrow().len()),
            Value::Html(_) => write!(f, "<html>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Struct(st) => {
                let st = st.borrow();
                let mut map = serializer.serialize_map(Some(st.names.len()))?;
                for (name, value) in st.names.iter().zip(&st.fields) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Value::Array(elements) => {
                let elements = elements.borrow();
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for element in elements.iter() {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Html(buffer) => buffer.borrow().to_nodes().serialize(serializer),
        }
    }
}
