//! Component registry.
//!
//! Maps `(page, id)` pairs to object names and touch handlers. The table is
//! allocated once with a fixed capacity and is append-only: components are
//! expected to be declared at startup and live as long as the driver.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::protocol::{validate_object_name, TouchAction, TouchEvent};
use crate::{Error, Result};

/// Parameterless press or release callback.
pub type Callback = Box<dyn Fn() + Send + Sync>;

/// Handler receiving every touch event of its component.
pub trait TouchHandler: Send + Sync {
    fn on_touch(&self, event: TouchEvent);
}

impl<F> TouchHandler for F
where
    F: Fn(TouchEvent) + Send + Sync,
{
    fn on_touch(&self, event: TouchEvent) {
        self(event)
    }
}

/// Touch handlers attached to a component.
#[derive(Default)]
pub enum Callbacks {
    /// No handlers; the component is only addressed by commands.
    #[default]
    None,
    /// Separate press and release callbacks, either may be absent.
    PressRelease {
        on_press: Option<Callback>,
        on_release: Option<Callback>,
    },
    /// One handler for both actions.
    Generic(Box<dyn TouchHandler>),
}

impl Callbacks {
    /// Press and release callbacks.
    pub fn press_release<P, R>(on_press: P, on_release: R) -> Self
    where
        P: Fn() + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        Callbacks::PressRelease {
            on_press: Some(Box::new(on_press)),
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Press callback only.
    pub fn on_press<P>(on_press: P) -> Self
    where
        P: Fn() + Send + Sync + 'static,
    {
        Callbacks::PressRelease {
            on_press: Some(Box::new(on_press)),
            on_release: None,
        }
    }

    /// Release callback only.
    pub fn on_release<R>(on_release: R) -> Self
    where
        R: Fn() + Send + Sync + 'static,
    {
        Callbacks::PressRelease {
            on_press: None,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// A closure taking the full event.
    pub fn generic<F>(handler: F) -> Self
    where
        F: Fn(TouchEvent) + Send + Sync + 'static,
    {
        Callbacks::Generic(Box::new(handler))
    }

    /// Any [`TouchHandler`] implementation.
    pub fn handler<H>(handler: H) -> Self
    where
        H: TouchHandler + 'static,
    {
        Callbacks::Generic(Box::new(handler))
    }

    /// Runs the handler for `event`. Returns whether one ran.
    fn invoke(&self, event: TouchEvent) -> bool {
        match self {
            Callbacks::None => false,
            Callbacks::PressRelease {
                on_press,
                on_release,
            } => {
                let callback = match event.action {
                    TouchAction::Press => on_press,
                    TouchAction::Release => on_release,
                };
                match callback {
                    Some(callback) => {
                        callback();
                        true
                    }
                    None => false,
                }
            }
            Callbacks::Generic(handler) => {
                handler.on_touch(event);
                true
            }
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callbacks::None => write!(f, "None"),
            Callbacks::PressRelease {
                on_press,
                on_release,
            } => f
                .debug_struct("PressRelease")
                .field("on_press", &on_press.is_some())
                .field("on_release", &on_release.is_some())
                .finish(),
            Callbacks::Generic(_) => write!(f, "Generic"),
        }
    }
}

/// A registered display element.
#[derive(Debug)]
pub struct Component {
    page: u8,
    id: u8,
    name: Option<Arc<str>>,
    callbacks: Callbacks,
}

impl Component {
    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Object name used in commands, if the component has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Returned by registration; addresses the component in commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHandle {
    index: usize,
    page: u8,
    id: u8,
    name: Option<Arc<str>>,
}

impl ComponentHandle {
    /// Position in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Fixed-capacity, append-only component table.
#[derive(Debug)]
pub struct ComponentRegistry {
    entries: Vec<Component>,
    capacity: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry holding at most `capacity` components.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Registers an unnamed component.
    pub fn register(&mut self, page: u8, id: u8, callbacks: Callbacks) -> Result<ComponentHandle> {
        self.insert(page, id, None, callbacks)
    }

    /// Registers a component with the object name used in commands.
    pub fn register_named(
        &mut self,
        name: &str,
        page: u8,
        id: u8,
        callbacks: Callbacks,
    ) -> Result<ComponentHandle> {
        validate_object_name(name)?;
        self.insert(page, id, Some(Arc::from(name)), callbacks)
    }

    fn insert(
        &mut self,
        page: u8,
        id: u8,
        name: Option<Arc<str>>,
        callbacks: Callbacks,
    ) -> Result<ComponentHandle> {
        if self.is_full() {
            warn!(
                "Cannot register page {} id {}: registry full ({})",
                page, id, self.capacity
            );
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if self.lookup_all(page, id).next().is_some() {
            debug!(
                "Page {} id {} already registered; all matches will be invoked",
                page, id
            );
        }

        let handle = ComponentHandle {
            index: self.entries.len(),
            page,
            id,
            name: name.clone(),
        };
        self.entries.push(Component {
            page,
            id,
            name,
            callbacks,
        });
        debug!(
            "Registered component {:?} at page {} id {}",
            handle.name(),
            page,
            id
        );
        Ok(handle)
    }

    /// Components registered at exactly `(page, id)`, in registration order.
    pub fn lookup_all(&self, page: u8, id: u8) -> impl Iterator<Item = &Component> + '_ {
        self.entries
            .iter()
            .filter(move |c| c.page == page && c.id == id)
    }

    /// Invokes the handlers of every component matching the event.
    ///
    /// Returns the number of handlers that ran.
    pub fn dispatch(&self, event: TouchEvent) -> usize {
        self.lookup_all(event.page, event.id)
            .filter(|c| c.callbacks.invoke(event))
            .count()
    }

    pub fn get(&self, handle: &ComponentHandle) -> Option<&Component> {
        self.entries.get(handle.index)
    }

    /// Components in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// Registry shared between the application and the receiver.
///
/// Dispatch holds the read lock while handlers run, so a handler must not
/// register components.
#[derive(Debug, Clone)]
pub struct SharedRegistry(Arc<RwLock<ComponentRegistry>>);

impl SharedRegistry {
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(RwLock::new(ComponentRegistry::new(capacity))))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ComponentRegistry> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ComponentRegistry> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn press(page: u8, id: u8) -> TouchEvent {
        TouchEvent {
            page,
            id,
            action: TouchAction::Press,
        }
    }

    #[test]
    fn test_dispatch_matches_page_and_id() {
        let mut registry = ComponentRegistry::new(4);
        let (hit, on_hit) = counter();
        let (miss, on_miss) = counter();
        registry
            .register(2, 5, Callbacks::on_press(on_hit))
            .unwrap();
        registry
            .register(3, 5, Callbacks::on_press(on_miss))
            .unwrap();

        assert_eq!(registry.dispatch(press(2, 5)), 1);
        assert_eq!(hit.load(Ordering::SeqCst), 1);
        assert_eq!(miss.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_press_and_release_callbacks() {
        let mut registry = ComponentRegistry::new(4);
        let (pressed, on_press) = counter();
        let (released, on_release) = counter();
        registry
            .register(0, 1, Callbacks::press_release(on_press, on_release))
            .unwrap();

        registry.dispatch(press(0, 1));
        registry.dispatch(TouchEvent {
            page: 0,
            id: 1,
            action: TouchAction::Release,
        });
        registry.dispatch(press(0, 1));

        assert_eq!(pressed.load(Ordering::SeqCst), 2);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_callback_is_skipped() {
        let mut registry = ComponentRegistry::new(2);
        let (released, on_release) = counter();
        registry
            .register(0, 1, Callbacks::on_release(on_release))
            .unwrap();
        registry.register(0, 1, Callbacks::None).unwrap();

        assert_eq!(registry.dispatch(press(0, 1)), 0);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicates_invoked_in_registration_order() {
        let mut registry = ComponentRegistry::new(4);
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            registry
                .register(
                    1,
                    1,
                    Callbacks::generic(move |_| order.lock().unwrap().push(tag)),
                )
                .unwrap();
        }

        assert_eq!(registry.dispatch(press(1, 1)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_generic_handler_receives_event() {
        struct Recorder(Arc<Mutex<Vec<TouchEvent>>>);
        impl TouchHandler for Recorder {
            fn on_touch(&self, event: TouchEvent) {
                self.0.lock().unwrap().push(event);
            }
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ComponentRegistry::new(1);
        registry
            .register(4, 9, Callbacks::handler(Recorder(events.clone())))
            .unwrap();
        registry.dispatch(press(4, 9));

        assert_eq!(*events.lock().unwrap(), vec![press(4, 9)]);
    }

    #[test]
    fn test_capacity_exceeded_leaves_registry_unchanged() {
        let mut registry = ComponentRegistry::new(2);
        registry.register_named("b0", 0, 1, Callbacks::None).unwrap();
        registry.register_named("b1", 0, 2, Callbacks::None).unwrap();
        assert!(registry.is_full());

        let err = registry
            .register_named("b2", 0, 3, Callbacks::None)
            .unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { capacity: 2 }));
        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, vec!["b0", "b1"]);
    }

    #[test]
    fn test_register_named_rejects_bad_name() {
        let mut registry = ComponentRegistry::new(2);
        assert!(registry
            .register_named("t 0", 0, 1, Callbacks::None)
            .is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handle_addresses_component() {
        let mut registry = ComponentRegistry::new(2);
        registry.register(0, 1, Callbacks::None).unwrap();
        let handle = registry.register_named("t0", 0, 2, Callbacks::None).unwrap();
        assert_eq!(handle.index(), 1);
        assert_eq!(handle.name(), Some("t0"));
        assert_eq!(registry.get(&handle).unwrap().id(), 2);
    }
}
