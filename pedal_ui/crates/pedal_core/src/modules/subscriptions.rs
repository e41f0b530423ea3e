use crate::modules::observable::{Observable, OnChangedHandler};
use std::cell::RefCell;
use std::rc::Rc;

/// Collects the teardown actions a component creates while attaching, so
/// that detaching releases all of them at once.
#[derive(Default)]
pub struct SubscriptionRegistry {
    teardown: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` on `observable`; `unsubscribe_all` removes it again.
    /// Only a weak reference to the observable is kept.
    pub fn subscribe<T: Clone + 'static>(
        &self,
        observable: &Rc<Observable<T>>,
        handler: OnChangedHandler<T>,
    ) {
        observable.add_on_changed_handler(Rc::clone(&handler));
        let observable = Rc::downgrade(observable);
        self.on_teardown(move || {
            if let Some(observable) = observable.upgrade() {
                observable.remove_on_changed_handler(&handler);
            }
        });
    }

    pub fn on_teardown(&self, f: impl FnOnce() + 'static) {
        self.teardown.borrow_mut().push(Box::new(f));
    }

    pub fn len(&self) -> usize {
        self.teardown.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.teardown.borrow().is_empty()
    }

    /// Idempotent. Actions run in reverse registration order.
    pub fn unsubscribe_all(&self) {
        let pending = std::mem::take(&mut *self.teardown.borrow_mut());
        for f in pending.into_iter().rev() {
            f();
        }
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
