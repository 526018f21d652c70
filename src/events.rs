use crate::dom::Dom;
use crate::models::ElementId;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Scroll,
    Resize,
    Input,
    Blur,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Document,
    Element(ElementId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Element the event originated on; `None` for window-level events.
    pub target: Option<ElementId>,
}

impl Event {
    pub fn on(kind: EventKind, target: ElementId) -> Self {
        Self {
            kind,
            target: Some(target),
        }
    }

    pub fn window(kind: EventKind) -> Self {
        Self { kind, target: None }
    }
}

type Handler = Rc<RefCell<dyn FnMut(&Event)>>;

struct Listener {
    id: u64,
    target: EventTarget,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(
        &self,
        target: EventTarget,
        kind: EventKind,
        handler: impl FnMut(&Event) + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push(Listener {
            id,
            target,
            kind,
            handler: Rc::new(RefCell::new(handler)),
        });
        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Delivers `event` along its propagation path: the target, its ancestors,
    /// the document, then the window. Element-less events reach only the
    /// window. Returns the number of handlers invoked.
    pub fn dispatch(&self, dom: &dyn Dom, event: Event) -> usize {
        let mut path = Vec::new();
        if let Some(target) = event.target {
            let mut cursor = Some(target);
            while let Some(el) = cursor {
                path.push(EventTarget::Element(el));
                cursor = dom.parent(el);
            }
            path.push(EventTarget::Document);
        }
        path.push(EventTarget::Window);

        let handlers: Vec<Handler> = {
            let registry = self.registry.borrow();
            path.iter()
                .flat_map(|hop| {
                    registry
                        .listeners
                        .iter()
                        .filter(move |listener| {
                            listener.target == *hop && listener.kind == event.kind
                        })
                        .map(|listener| Rc::clone(&listener.handler))
                })
                .collect()
        };

        let mut delivered = 0;
        for handler in handlers {
            // A handler that re-dispatches into itself is skipped, not re-entered.
            if let Ok(mut handler) = handler.try_borrow_mut() {
                (&mut *handler)(&event);
                delivered += 1;
            }
        }
        delivered
    }
}

#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Subscription {
    pub fn dispose(self) {}

    fn detach(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.listeners.retain(|listener| listener.id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

#[derive(Default)]
pub struct Subscriptions {
    items: Vec<Subscription>,
}

impl Subscriptions {
    pub fn push(&mut self, subscription: Subscription) {
        self.items.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dispose_all(&mut self) {
        self.items.clear();
    }
}
