//! Dynamic settlement values and capability probes.
//!
//! Promises are unityped on purpose: any [`Value`] can fulfill a promise or
//! serve as a rejection reason, including callables and other deferred
//! values. Classification is explicit — [`Value::then_capability`] replaces
//! duck-typed "does it have a `then`?" checks with a tagged handle.

use std::fmt;
use std::sync::Arc;

use crate::promise::{Promise, Settle};

/// A callable value. Takes one argument; `Err` models a raised failure.
pub type NativeFn = Arc<dyn Fn(Value) -> Result<Value, Value> + Send + Sync>;

/// The callable `then` member of a foreign deferred value. It receives a
/// guarded settle pair; returning `Err` models a `then` that raises instead
/// of settling.
pub type ThenFn = Arc<dyn Fn(Settle, Settle) -> Result<(), Value> + Send + Sync>;

/// Any value a promise can settle with.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    /// A bare callable. Exposes no `then`, so it is never adopted.
    Func(NativeFn),
    /// A foreign value exposing a callable `then`.
    Thenable(ThenFn),
    /// Promises are values too; settling with one adopts its outcome.
    Promise(Promise),
}

/// The result of probing a value for a callable `then`.
pub enum ThenCapability {
    /// A foreign `then` member.
    Foreign(ThenFn),
    /// Another promise's own subscription surface.
    Own(Promise),
}

impl ThenCapability {
    /// Feeds a settle pair to the capability. A foreign `then` may fail
    /// synchronously; observing another promise cannot.
    pub fn invoke(self, on_ok: Settle, on_err: Settle) -> Result<(), Value> {
        match self {
            ThenCapability::Foreign(then) => then.as_ref()(on_ok, on_err),
            ThenCapability::Own(promise) => {
                promise
                    .then(move |value| {
                        on_ok.call(value.clone());
                        Ok(value)
                    })
                    .catch(move |reason| {
                        on_err.call(reason.clone());
                        Err(reason)
                    });
                Ok(())
            }
        }
    }
}

impl Value {
    pub fn function<F>(f: F) -> Value
    where
        F: Fn(Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Value::Func(Arc::new(f))
    }

    /// Builds a foreign thenable from its `then` member.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventual::Value;
    ///
    /// let eager = Value::thenable(|resolve, _reject| {
    ///     resolve.call(Value::from(7));
    ///     Ok(())
    /// });
    /// assert!(eager.then_capability().is_some());
    /// ```
    pub fn thenable<F>(f: F) -> Value
    where
        F: Fn(Settle, Settle) -> Result<(), Value> + Send + Sync + 'static,
    {
        Value::Thenable(Arc::new(f))
    }

    /// Composite, reference-shaped values.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::List(_) | Value::Thenable(_) | Value::Promise(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Func(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Returns the value's callable `then`, if it has one. Total over every
    /// shape; plain values simply return `None`.
    pub fn then_capability(&self) -> Option<ThenCapability> {
        match self {
            Value::Thenable(then) => Some(ThenCapability::Foreign(then.clone())),
            Value::Promise(promise) => Some(ThenCapability::Own(promise.clone())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

// Reference shapes compare by identity, plain shapes by content.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Thenable(a), Value::Thenable(b)) => Arc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Func(_) => f.write_str("Func(..)"),
            Value::Thenable(_) => f.write_str("Thenable(..)"),
            Value::Promise(_) => f.write_str("Promise(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Func(_) => f.write_str("<function>"),
            Value::Thenable(_) => f.write_str("<thenable>"),
            Value::Promise(_) => f.write_str("<promise>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<char> for Value {
    fn from(ch: char) -> Value {
        Value::Text(ch.to_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::scheduler::QueueScheduler;
    use crate::Promise;

    use super::*;

    fn sample_promise() -> Value {
        Value::Promise(Promise::resolve(
            Arc::new(QueueScheduler::new()),
            Value::Null,
        ))
    }

    #[test]
    fn probes_classify_every_shape() {
        assert!(Value::List(vec![]).is_object());
        assert!(Value::thenable(|_, _| Ok(())).is_object());
        assert!(sample_promise().is_object());
        assert!(!Value::from("text").is_object());
        assert!(!Value::from(1).is_object());

        assert!(Value::function(Ok).is_function());
        assert!(!Value::from("text").is_function());

        assert!(Value::from("text").is_text());
        assert!(!Value::List(vec![]).is_text());
    }

    #[test]
    fn then_capability_is_limited_to_thenable_shapes() {
        assert!(Value::thenable(|_, _| Ok(())).then_capability().is_some());
        assert!(sample_promise().then_capability().is_some());
        assert!(Value::Null.then_capability().is_none());
        assert!(Value::function(Ok).then_capability().is_none());
        assert!(Value::List(vec![]).then_capability().is_none());
    }

    #[test]
    fn reference_shapes_compare_by_identity() {
        let func = Value::function(Ok);
        assert_eq!(func.clone(), func);
        assert_ne!(func, Value::function(Ok));

        let promise = sample_promise();
        assert_eq!(promise.clone(), promise);
        assert_ne!(promise, sample_promise());
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(5).to_string(), "5");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::List(vec![Value::from(1), Value::from(true)]).to_string(),
            "[1, true]"
        );
        assert_eq!(Value::thenable(|_, _| Ok(())).to_string(), "<thenable>");
    }
}
