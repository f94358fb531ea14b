//! Derived cells.
//!
//! A [`ViewCell`] has no value of its own. Reads run a forward transform over
//! the base cell's current value; writes run the inverse transform and then
//! [`Cell::set`] the base, so they follow the base cell's write routing.
//! Transforms may capture auxiliary cells; when one of those changes, the
//! owner calls [`ViewCell::changed_transform`] so subscribers see the new
//! derived value.

use std::sync::Arc;

use crate::cell::{Callback, Cell, StateCell, SubscriptionId, Subscribers};
use crate::error::{Error, Result};
use crate::types::{Value, ValueType};

/// Forward transform: base value to derived value.
pub type Forward = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// Inverse transform: derived value to base value.
pub type Inverse = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

pub struct ViewCell {
    key: String,
    value_type: ValueType,
    base: Arc<Cell>,
    forward: Forward,
    inverse: Inverse,
    subscribers: Subscribers,
    base_subscription: SubscriptionId,
}

impl ViewCell {
    /// Build a view over `base`. Base changes are forwarded to the view's
    /// subscribers for as long as the view is alive.
    pub fn new(
        key: impl Into<String>,
        value_type: ValueType,
        base: Arc<Cell>,
        forward: Forward,
        inverse: Inverse,
    ) -> Arc<Self> {
        let key = key.into();
        Arc::new_cyclic(|weak: &std::sync::Weak<ViewCell>| {
            let weak = weak.clone();
            let base_subscription = base.subscribe(Arc::new(move || {
                if let Some(view) = weak.upgrade() {
                    view.subscribers.notify();
                }
            }));
            ViewCell {
                key,
                value_type,
                base,
                forward,
                inverse,
                subscribers: Subscribers::default(),
                base_subscription,
            }
        })
    }

    pub fn base(&self) -> &Arc<Cell> {
        &self.base
    }

    /// Announce that an input of the transform changed.
    pub fn changed_transform(&self) {
        self.subscribers.notify();
    }
}

impl Drop for ViewCell {
    fn drop(&mut self) {
        self.base.unsubscribe(self.base_subscription);
    }
}

impl StateCell for ViewCell {
    fn key(&self) -> &str {
        &self.key
    }

    fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    fn is_writable(&self) -> bool {
        self.base.is_writable()
    }

    fn get(&self) -> Value {
        (self.forward)(&self.base.get())
    }

    fn set(&self, value: Value) -> Result<()> {
        if !self.base.is_writable() {
            return Err(Error::NotWritable(self.key.clone()));
        }
        let value = self.value_type.coerce(&value)?;
        let base_value = (self.inverse)(&value)?;
        self.base.set(base_value)
    }

    fn subscribe(&self, callback: Callback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

impl std::fmt::Debug for ViewCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCell")
            .field("key", &self.key)
            .field("base", &self.base.key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doubled(base: Arc<Cell>) -> Arc<ViewCell> {
        ViewCell::new(
            "doubled",
            ValueType::Float,
            base,
            Box::new(|v: &Value| Value::Float(v.as_f64().unwrap_or(0.0) * 2.0)),
            Box::new(|v: &Value| {
                v.as_f64()
                    .map(|f| Value::Float(f / 2.0))
                    .ok_or_else(|| Error::InvalidValue("not a number".into()))
            }),
        )
    }

    #[test]
    fn get_applies_forward_transform() {
        let base = Arc::new(Cell::new("x", ValueType::Integer).writable(true));
        base.set(Value::Int(21)).unwrap();
        let view = doubled(base);
        assert_eq!(view.get(), Value::Float(42.0));
    }

    #[test]
    fn set_writes_base_through_inverse() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let w = writes.clone();
        let base = Arc::new(
            Cell::new("x", ValueType::Range(Range::int(0, 100)))
                .writable(true)
                .with_hook(Box::new(move |v: &Value| w.lock().push(v.clone()))),
        );
        let view = doubled(base.clone());
        view.set(Value::Float(50.0)).unwrap();
        assert_eq!(*writes.lock(), vec![Value::Int(25)]);
        assert_eq!(base.get(), Value::Int(0));
    }

    #[test]
    fn set_on_plain_base_stores_directly() {
        let base = Arc::new(Cell::new("x", ValueType::Range(Range::int(0, 100))).writable(true));
        let view = doubled(base.clone());
        view.set(Value::Float(50.0)).unwrap();
        assert_eq!(base.get(), Value::Int(25));
        assert_eq!(view.get(), Value::Float(50.0));
    }

    #[test]
    fn set_rejected_by_base_range() {
        let base = Arc::new(Cell::new("x", ValueType::Range(Range::int(0, 100))).writable(true));
        let view = doubled(base.clone());
        assert!(matches!(
            view.set(Value::Float(1000.0)),
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(base.get(), Value::Int(0));
    }

    #[test]
    fn read_only_base_makes_read_only_view() {
        let base = Arc::new(Cell::new("x", ValueType::Integer));
        let view = doubled(base);
        assert!(!view.is_writable());
        assert!(matches!(view.set(Value::Float(2.0)), Err(Error::NotWritable(_))));
    }

    #[test]
    fn base_change_and_changed_transform_notify() {
        let base = Arc::new(Cell::new("x", ValueType::Integer));
        let view = doubled(base.clone());
        let n = Arc::new(AtomicUsize::new(0));
        let n2 = n.clone();
        view.subscribe(Arc::new(move || {
            n2.fetch_add(1, Ordering::SeqCst);
        }));
        base.set_internal(Value::Int(3)).unwrap();
        view.changed_transform();
        assert_eq!(n.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_view_releases_base_subscription() {
        let base = Arc::new(Cell::new("x", ValueType::Integer));
        let view = doubled(base.clone());
        let id = view.base_subscription;
        drop(view);
        assert!(!base.unsubscribe(id));
    }
}
