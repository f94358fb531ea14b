//! Typed observable cells.
//!
//! A [`Cell`] is a named value with a declared [`ValueType`]. It can be read
//! from any thread at any time; reads take a short reader lock and never wait
//! on the link. Two write paths exist:
//!
//! - [`Cell::set`] is the host path. It requires the cell to be writable and
//!   validates the value synchronously. A cell with a write hook then hands
//!   the value to the hook and does not store it: the hook's owner applies it
//!   later with [`Cell::set_internal`] on its own execution context. A cell
//!   without a hook stores the value and notifies in place.
//! - [`Cell::set_internal`] is the device path used by the protocol session.
//!   It never invokes the write hook, so a reported value is never echoed
//!   back to the radio.
//!
//! Subscriber callbacks take no arguments and run synchronously on the
//! mutating thread after the new value is stored and all locks are released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::types::{Value, ValueType};

/// Identifies one subscription on a cell.
pub type SubscriptionId = u64;

/// A zero-argument change callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Receives each validated host write from [`Cell::set`]. The value is not
/// stored until the receiver applies it with [`Cell::set_internal`].
pub type WriteHook = Box<dyn Fn(&Value) + Send + Sync>;

/// Common surface of [`Cell`] and [`ViewCell`](crate::view::ViewCell).
pub trait StateCell: Send + Sync {
    /// Stable identity of the cell.
    fn key(&self) -> &str;

    /// Declared type of the values the cell holds.
    fn value_type(&self) -> &ValueType;

    /// Whether host writes are accepted.
    fn is_writable(&self) -> bool;

    /// The current value. Never blocks on the link.
    fn get(&self) -> Value;

    /// Host write.
    fn set(&self, value: Value) -> Result<()>;

    /// Register a change callback.
    fn subscribe(&self, callback: Callback) -> SubscriptionId;

    /// Remove a change callback. Returns `false` if `id` was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Subscriber list shared by both cell kinds.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    list: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl Subscribers {
    pub(crate) fn add(&self, callback: Callback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.list.lock().push((id, callback));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut list = self.list.lock();
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        list.len() != before
    }

    /// Call every subscriber. The list lock is not held during callbacks, so
    /// a callback may subscribe, unsubscribe or write other cells.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<Callback> = self.list.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for cb in snapshot {
            cb();
        }
    }
}

/// A mutable, observable, typed value.
pub struct Cell {
    key: String,
    value_type: ValueType,
    writable: bool,
    persists: bool,
    value: RwLock<Value>,
    hook: Option<WriteHook>,
    subscribers: Subscribers,
}

impl Cell {
    /// Create a read-only cell holding the type's default value.
    pub fn new(key: impl Into<String>, value_type: ValueType) -> Self {
        let value = value_type.default_value();
        Cell {
            key: key.into(),
            value_type,
            writable: false,
            persists: false,
            value: RwLock::new(value),
            hook: None,
            subscribers: Subscribers::default(),
        }
    }

    /// Accept host writes.
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Mark the cell as persistent. Carried as metadata only.
    pub fn persists(mut self, persists: bool) -> Self {
        self.persists = persists;
        self
    }

    /// Route host writes through `hook` instead of storing them in place.
    pub fn with_hook(mut self, hook: WriteHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replace the initial value. The value is coerced to the cell type.
    pub fn with_value(self, value: Value) -> Result<Self> {
        let coerced = self.check(&value)?;
        *self.value.write() = coerced;
        Ok(self)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_persistent(&self) -> bool {
        self.persists
    }

    pub fn get(&self) -> Value {
        self.value.read().clone()
    }

    /// Validate `value` against the cell type without storing it.
    pub fn check(&self, value: &Value) -> Result<Value> {
        self.value_type
            .coerce(value)
            .map_err(|e| match e {
                Error::InvalidValue(msg) => Error::InvalidValue(format!("{}: {msg}", self.key)),
                other => other,
            })
    }

    /// Host write. Validation errors are returned to the caller; a valid
    /// value goes to the write hook, or is stored and notified if there is
    /// none.
    pub fn set(&self, value: Value) -> Result<()> {
        if !self.writable {
            return Err(Error::NotWritable(self.key.clone()));
        }
        let coerced = self.check(&value)?;
        match &self.hook {
            Some(hook) => hook(&coerced),
            None => {
                if self.store(coerced) {
                    self.subscribers.notify();
                }
            }
        }
        Ok(())
    }

    /// Device write: validate, store, notify. Never runs the write hook.
    ///
    /// Returns whether the stored value changed.
    pub fn set_internal(&self, value: Value) -> Result<bool> {
        let coerced = self.check(&value)?;
        let changed = self.store(coerced);
        if changed {
            self.subscribers.notify();
        }
        Ok(changed)
    }

    fn store(&self, value: Value) -> bool {
        let mut guard = self.value.write();
        if *guard == value {
            return false;
        }
        *guard = value;
        true
    }

    pub fn subscribe(&self, callback: Callback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("key", &self.key)
            .field("value", &*self.value.read())
            .field("writable", &self.writable)
            .finish()
    }
}

impl StateCell for Cell {
    fn key(&self) -> &str {
        Cell::key(self)
    }

    fn value_type(&self) -> &ValueType {
        Cell::value_type(self)
    }

    fn is_writable(&self) -> bool {
        Cell::is_writable(self)
    }

    fn get(&self) -> Value {
        Cell::get(self)
    }

    fn set(&self, value: Value) -> Result<()> {
        Cell::set(self, value)
    }

    fn subscribe(&self, callback: Callback) -> SubscriptionId {
        Cell::subscribe(self, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        Cell::unsubscribe(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let n = Arc::new(AtomicUsize::new(0));
        let n2 = n.clone();
        (n, Arc::new(move || {
            n2.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn hooked(key: &str) -> (Cell, Arc<Mutex<Vec<Value>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let w = writes.clone();
        let cell = Cell::new(key, ValueType::Range(Range::int(0, 255)))
            .writable(true)
            .with_hook(Box::new(move |v: &Value| w.lock().push(v.clone())));
        (cell, writes)
    }

    #[test]
    fn new_cell_holds_default() {
        let cell = Cell::new("freq", ValueType::Range(Range::int(100_000, 99_999_999_999)));
        assert_eq!(cell.get(), Value::Int(100_000));
        assert!(!cell.is_writable());
        assert!(!cell.is_persistent());
    }

    #[test]
    fn set_out_of_range_keeps_old_value_and_is_silent() {
        let (cell, writes) = hooked("af_gain");
        let (count, cb) = counter();
        cell.subscribe(cb);
        cell.set(Value::Int(100)).unwrap();

        let err = cell.set(Value::Int(300)).unwrap_err();
        assert!(matches!(err, Error::InvalidValue(ref m) if m.starts_with("af_gain")));
        assert_eq!(*writes.lock(), vec![Value::Int(100)]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hooked_set_defers_to_the_hook() {
        let (cell, writes) = hooked("af_gain");
        let (count, cb) = counter();
        cell.subscribe(cb);
        cell.set(Value::Float(41.6)).unwrap();
        assert_eq!(*writes.lock(), vec![Value::Int(42)]);
        assert_eq!(cell.get(), Value::Int(0));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(cell.set_internal(Value::Int(42)).unwrap());
        assert_eq!(cell.get(), Value::Int(42));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(writes.lock().len(), 1);
    }

    #[test]
    fn unhooked_set_stores_in_place() {
        let cell = Cell::new("x", ValueType::Range(Range::int(0, 255))).writable(true);
        let (count, cb) = counter();
        cell.subscribe(cb);
        cell.set(Value::Int(42)).unwrap();
        cell.set(Value::Int(42)).unwrap();
        assert_eq!(cell.get(), Value::Int(42));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_internal_never_runs_hook() {
        let (cell, writes) = hooked("af_gain");
        let (count, cb) = counter();
        cell.subscribe(cb);
        assert!(cell.set_internal(Value::Int(7)).unwrap());
        assert!(!cell.set_internal(Value::Int(7)).unwrap());
        assert!(writes.lock().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get(), Value::Int(7));
    }

    #[test]
    fn set_internal_works_on_read_only_cell() {
        let cell = Cell::new("band", ValueType::Integer);
        assert!(matches!(
            cell.set(Value::Int(3)),
            Err(Error::NotWritable(ref k)) if k == "band"
        ));
        assert!(cell.set_internal(Value::Int(3)).unwrap());
        assert_eq!(cell.get(), Value::Int(3));
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let cell = Cell::new("band", ValueType::Integer);
        let (count, cb) = counter();
        let id = cell.subscribe(cb);
        cell.set_internal(Value::Int(1)).unwrap();
        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        cell.set_internal(Value::Int(2)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_read_the_cell() {
        let cell = Arc::new(Cell::new("band", ValueType::Integer));
        let seen = Arc::new(Mutex::new(None));
        let (c, s) = (Arc::downgrade(&cell), seen.clone());
        cell.subscribe(Arc::new(move || {
            if let Some(c) = c.upgrade() {
                *s.lock() = Some(c.get());
            }
        }));
        cell.set_internal(Value::Int(9)).unwrap();
        assert_eq!(*seen.lock(), Some(Value::Int(9)));
    }

    #[test]
    fn with_value_validates() {
        assert!(Cell::new("x", ValueType::Boolean)
            .with_value(Value::Int(1))
            .is_err());
        let c = Cell::new("x", ValueType::Boolean)
            .with_value(Value::Bool(true))
            .unwrap();
        assert_eq!(c.get(), Value::Bool(true));
    }
}
