use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type OnChangedHandler<T> = Rc<dyn Fn(&T)>;

struct Registration<T> {
    id: u64,
    handler: OnChangedHandler<T>,
}

/// Single-threaded value cell with change listeners.
///
/// Listeners run synchronously inside `set`, in registration order. Each
/// notification round works on a snapshot of the listener list: a listener
/// removed mid-round is skipped for the rest of that round, one added
/// mid-round first fires on the next round. A `set` issued from inside a
/// listener runs its own round to completion before the outer `set`
/// returns, and the outer round then stops so nobody sees the older value
/// after the newer one.
pub struct Observable<T> {
    value: RefCell<T>,
    handlers: RefCell<Vec<Registration<T>>>,
    next_id: Cell<u64>,
    version: Cell<u64>,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            version: Cell::new(0),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Borrows the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Stores `value` and notifies each registered handler once.
    ///
    /// If a handler calls `set` again, the nested round delivers the newer
    /// value to every handler and this round ends early: handlers after the
    /// re-entrant one never see `value` at all, only its successor.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.notify();
    }

    pub fn add_on_changed_handler(&self, handler: OnChangedHandler<T>) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .push(Registration { id, handler });
    }

    /// Removes the earliest registration of `handler`. Unknown handlers are ignored.
    pub fn remove_on_changed_handler(&self, handler: &OnChangedHandler<T>) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(pos) = handlers
            .iter()
            .position(|r| same_handler(&r.handler, handler))
        {
            handlers.remove(pos);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    fn notify(&self) {
        let version = self.version.get().wrapping_add(1);
        self.version.set(version);

        let snapshot: Vec<(u64, OnChangedHandler<T>)> = self
            .handlers
            .borrow()
            .iter()
            .map(|r| (r.id, Rc::clone(&r.handler)))
            .collect();
        let value = self.get();

        for (id, handler) in snapshot {
            if self.version.get() != version {
                break;
            }
            if !self.handlers.borrow().iter().any(|r| r.id == id) {
                continue;
            }
            handler(&value);
        }
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Like `set`, but stays silent when the value is unchanged. Returns
    /// whether listeners were notified.
    pub fn set_if_changed(&self, value: T) -> bool {
        if *self.value.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

fn same_handler<T>(a: &OnChangedHandler<T>, b: &OnChangedHandler<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> OnChangedHandler<i32> {
        let log = Rc::clone(log);
        Rc::new(move |v: &i32| log.borrow_mut().push(format!("{name}:{v}")))
    }

    #[test]
    fn handlers_fire_once_per_set_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Observable::new(0);
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        observable.add_on_changed_handler(Rc::clone(&a));
        observable.add_on_changed_handler(Rc::clone(&b));

        observable.set(1);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1"]);

        observable.remove_on_changed_handler(&a);
        observable.set(2);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1", "b:2"]);
        assert_eq!(observable.get(), 2);
    }

    #[test]
    fn double_registration_fires_twice_and_removes_one_at_a_time() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Observable::new(0);
        let a = recorder(&log, "a");
        observable.add_on_changed_handler(Rc::clone(&a));
        observable.add_on_changed_handler(Rc::clone(&a));

        observable.set(1);
        assert_eq!(log.borrow().len(), 2);

        observable.remove_on_changed_handler(&a);
        observable.set(2);
        assert_eq!(log.borrow().len(), 3);

        observable.remove_on_changed_handler(&a);
        observable.remove_on_changed_handler(&a);
        observable.set(3);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(observable.handler_count(), 0);
    }

    #[test]
    fn removal_during_round_skips_later_listener() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Rc::new(Observable::new(0));
        let b = recorder(&log, "b");

        let remover: OnChangedHandler<i32> = {
            let observable = Rc::downgrade(&observable);
            let b = Rc::clone(&b);
            let log = Rc::clone(&log);
            Rc::new(move |v: &i32| {
                log.borrow_mut().push(format!("a:{v}"));
                if let Some(observable) = observable.upgrade() {
                    observable.remove_on_changed_handler(&b);
                }
            })
        };
        observable.add_on_changed_handler(remover);
        observable.add_on_changed_handler(b);

        observable.set(1);
        assert_eq!(*log.borrow(), vec!["a:1"]);
    }

    #[test]
    fn handler_added_during_round_waits_for_next_round() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Rc::new(Observable::new(0));
        let late = recorder(&log, "late");
        let added = Rc::new(Cell::new(false));

        let adder: OnChangedHandler<i32> = {
            let observable = Rc::downgrade(&observable);
            let late = Rc::clone(&late);
            Rc::new(move |_: &i32| {
                if added.replace(true) {
                    return;
                }
                if let Some(observable) = observable.upgrade() {
                    observable.add_on_changed_handler(Rc::clone(&late));
                }
            })
        };
        observable.add_on_changed_handler(adder);

        observable.set(1);
        assert!(log.borrow().is_empty());
        observable.set(2);
        assert_eq!(*log.borrow(), vec!["late:2"]);
    }

    #[test]
    fn reentrant_set_completes_depth_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Rc::new(Observable::new(0));

        let clamp: OnChangedHandler<i32> = {
            let observable = Rc::downgrade(&observable);
            let log = Rc::clone(&log);
            Rc::new(move |v: &i32| {
                log.borrow_mut().push(format!("clamp:{v}"));
                if *v > 10 {
                    if let Some(observable) = observable.upgrade() {
                        observable.set(10);
                    }
                }
            })
        };
        observable.add_on_changed_handler(clamp);
        observable.add_on_changed_handler(recorder(&log, "view"));

        observable.set(50);
        assert_eq!(*log.borrow(), vec!["clamp:50", "clamp:10", "view:10"]);
        assert_eq!(observable.get(), 10);
    }

    #[test]
    fn set_if_changed_suppresses_equal_values() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observable = Observable::new(5);
        observable.add_on_changed_handler(recorder(&log, "a"));

        assert!(!observable.set_if_changed(5));
        assert!(observable.set_if_changed(6));
        assert_eq!(*log.borrow(), vec!["a:6"]);
    }
}
