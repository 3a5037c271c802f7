//! Run context shared by every step of one workflow run.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

name_type!(
    /// Key under which a value is stored in a [`Context`].
    ContextKey
);

/// Mutable state threaded through all steps of one workflow run.
///
/// Values of any `Send + Sync` type are stored under string keys and
/// retrieved by downcasting. Steps use it to hand resources to later steps,
/// e.g. a browser session opened by the first step, and runners use it to
/// inject configuration before the run starts.
///
/// # Examples
///
/// ```
/// use tadori_core::Context;
///
/// #[derive(Debug, PartialEq)]
/// struct SearchSettings {
///     keywords: String,
/// }
///
/// let mut ctx = Context::new().with(
///     "settings",
///     SearchSettings { keywords: "rust developer".to_string() },
/// );
/// ctx.insert("applied", 0u32);
///
/// assert_eq!(
///     ctx.get::<SearchSettings>("settings").map(|s| s.keywords.as_str()),
///     Some("rust developer")
/// );
/// assert_eq!(ctx.get::<u32>("applied"), Some(&0));
///
/// // Wrong type returns None
/// assert_eq!(ctx.get::<String>("applied"), None);
/// ```
pub struct Context {
    values: HashMap<ContextKey, Box<dyn Any + Send + Sync>>,
    created_at: Instant,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().map(ContextKey::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    /// Seeds a value while building the initial context.
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<ContextKey>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Stores a value, replacing any previous value under the same key.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns the value for `key` if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value for `key` if present and of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Returns the value for `key`, inserting the result of `init` first if
    /// the key is missing or holds a different type.
    pub fn get_or_insert_with<T, F>(&mut self, key: &str, init: F) -> &mut T
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = match self.values.entry(ContextKey::new(key)) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                if !slot.is::<T>() {
                    *slot = Box::new(init());
                }
                slot
            }
            Entry::Vacant(entry) => entry.insert(Box::new(init())),
        };
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("slot holds a value of the requested type"),
        }
    }

    /// Removes the value for `key` and returns it if it has type `T`.
    ///
    /// A value of a different type is left in place.
    pub fn take<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Removes whatever is stored under `key`, returning whether something was removed.
    pub fn discard(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Returns `true` if any value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns an iterator over the stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.values.keys()
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the time since the context was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct BrowserSession {
        tab: u32,
    }

    #[test]
    fn test_seeded_context() {
        let ctx = Context::new()
            .with("base_dir", "/tmp/bot".to_string())
            .with("session", BrowserSession { tab: 1 });

        assert_eq!(ctx.len(), 2);
        assert_eq!(
            ctx.get::<String>("base_dir").map(String::as_str),
            Some("/tmp/bot")
        );
        assert_eq!(
            ctx.get::<BrowserSession>("session"),
            Some(&BrowserSession { tab: 1 })
        );
        assert_eq!(ctx.get::<u32>("session"), None);
    }

    #[test]
    fn test_get_mut() {
        let mut ctx = Context::new();
        ctx.insert("applied", 0u32);

        if let Some(count) = ctx.get_mut::<u32>("applied") {
            *count += 1;
        }

        assert_eq!(ctx.get::<u32>("applied"), Some(&1));
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut ctx = Context::new();

        ctx.get_or_insert_with("seen_jobs", Vec::<String>::new)
            .push("job-1".to_string());
        ctx.get_or_insert_with("seen_jobs", Vec::<String>::new)
            .push("job-2".to_string());
        assert_eq!(ctx.get::<Vec<String>>("seen_jobs").map(Vec::len), Some(2));

        // A value of another type is replaced
        ctx.insert("counter", "not a number".to_string());
        *ctx.get_or_insert_with("counter", || 0u32) += 5;
        assert_eq!(ctx.get::<u32>("counter"), Some(&5));
    }

    #[test]
    fn test_take_respects_type() {
        let mut ctx = Context::new();
        ctx.insert("job_id", "12345".to_string());

        assert_eq!(ctx.take::<u64>("job_id"), None);
        assert!(ctx.contains_key("job_id"));

        assert_eq!(ctx.take::<String>("job_id"), Some("12345".to_string()));
        assert!(!ctx.contains_key("job_id"));
    }

    #[test]
    fn test_discard() {
        let mut ctx = Context::new().with("page", BrowserSession { tab: 3 });
        assert!(ctx.discard("page"));
        assert!(!ctx.discard("page"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_context_key() {
        let key1 = ContextKey::new("driver");
        let key2: ContextKey = "driver".into();
        assert_eq!(key1, key2);
        assert_eq!(key1, "driver");
    }
}
