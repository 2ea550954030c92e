//! Typed heterogeneous property bag carried through one call.
//!
//! An [`AttributeContext`] threads cross-cutting data (resolved endpoint,
//! idempotency token, cancellation token, response metadata) through every
//! middleware without widening each middleware's signature per concern.
//! Lookups are keyed by [`AttributeKey`] name; a key sharing a name with a
//! stored value of a different type reads as absent, never as a crash or a
//! silent coercion.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Type-safe property bag key.
///
/// Equality and identity are by name only; the type parameter exists so
/// reads and writes through the same key agree on the value type.
pub struct AttributeKey<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Creates a key from a static name, usable in `const` contexts.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    /// Creates a key from an owned name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for AttributeKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for AttributeKey<T> {}

impl<T> std::fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AttributeKey: {}", self.name)
    }
}

/// Per-call property bag.
///
/// Created fresh for each call and discarded at its end; it is threaded
/// `&mut` through the middleware chain, so no locking is involved. None of
/// its operations panic or perform I/O.
#[derive(Default)]
pub struct AttributeContext {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for AttributeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeContext")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AttributeContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or overwrites a value under the key's name.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>, value: T) {
        self.values.insert(key.name().to_string(), Box::new(value));
    }

    /// Gets a clone of the value stored under the key.
    ///
    /// Returns `None` when the name is absent or the stored value has a
    /// different concrete type than the key declares.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<T> {
        self.get_ref(key).cloned()
    }

    /// Gets a reference to the value stored under the key.
    ///
    /// Fails closed like [`get`](Self::get).
    #[must_use]
    pub fn get_ref<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<&T> {
        self.values
            .get(key.name())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Returns true if the key's name is present with the key's type.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> bool {
        self.get_ref(key).is_some()
    }

    /// Removes the entry stored under the key's name.
    ///
    /// Returns the removed value when its concrete type matches the key.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> Option<T> {
        let boxed = self.values.remove(key.name())?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut ctx = AttributeContext::new();
        let key = AttributeKey::<String>::new("token");

        ctx.set(&key, "abc123".to_string());

        assert_eq!(ctx.get(&key), Some("abc123".to_string()));
        assert!(ctx.contains(&key));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let mut ctx = AttributeContext::new();
        let key = AttributeKey::<u32>::new("count");

        ctx.set(&key, 1);
        ctx.set(&key, 2);

        assert_eq!(ctx.get(&key), Some(2));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let mut ctx = AttributeContext::new();
        let string_key = AttributeKey::<String>::new("shared-name");
        let int_key = AttributeKey::<u64>::new("shared-name");

        ctx.set(&string_key, "value".to_string());

        // Same name, different declared type: fail closed.
        assert_eq!(ctx.get(&int_key), None);
        assert!(!ctx.contains(&int_key));
        assert!(ctx.contains(&string_key));
    }

    #[test]
    fn test_remove() {
        let mut ctx = AttributeContext::new();
        let key = AttributeKey::<String>::new("token");

        ctx.set(&key, "abc".to_string());
        assert_eq!(ctx.remove(&key), Some("abc".to_string()));
        assert!(!ctx.contains(&key));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_remove_with_mismatched_type_still_clears_name() {
        let mut ctx = AttributeContext::new();
        let string_key = AttributeKey::<String>::new("shared-name");
        let int_key = AttributeKey::<u64>::new("shared-name");

        ctx.set(&string_key, "value".to_string());

        assert_eq!(ctx.remove(&int_key), None);
        assert!(!ctx.contains(&string_key));
    }

    #[test]
    fn test_key_equality_by_name() {
        let a = AttributeKey::<String>::new("k");
        let b = AttributeKey::<String>::from_static("k");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_debug_rendering() {
        let key = AttributeKey::<String>::new("endpoint");
        assert_eq!(format!("{key:?}"), "AttributeKey: endpoint");
    }
}
