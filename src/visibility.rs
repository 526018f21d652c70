use crate::dom::Dom;
use crate::events::{EventBus, EventKind, EventTarget, Subscription};
use crate::models::{ElementId, Margin, Rect, ViewportObservation};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    /// Share of the element's area that must be inside the root.
    pub threshold: f64,
    pub root_margin: Margin,
}

impl ObserverOptions {
    pub fn new(threshold: f64, root_margin: Margin) -> Self {
        Self {
            threshold,
            root_margin,
        }
    }
}

/// Visible share of `target` inside `root`, `None` when they do not touch.
/// Zero-area targets count as fully visible once they touch the root.
pub fn intersection_ratio(target: &Rect, root: &Rect) -> Option<f64> {
    let overlap = target.intersection(root)?;
    let area = target.area();
    if area == 0.0 {
        return Some(1.0);
    }
    Some(overlap.area() / area)
}

pub fn is_intersecting(target: &Rect, viewport: &Rect, options: &ObserverOptions) -> bool {
    let root = viewport.expand(&options.root_margin);
    match intersection_ratio(target, &root) {
        Some(ratio) if options.threshold > 0.0 => ratio >= options.threshold,
        Some(_) => true,
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    Once,
    /// Fire on entry unless the element carries the class; the class is set
    /// once the callback reports the element handled.
    Marker(String),
    Repeat,
}

type TriggerCallback = Box<dyn FnMut(ElementId) -> bool>;

pub struct VisibilityTrigger {
    dom: Rc<dyn Dom>,
    options: ObserverOptions,
    mode: TriggerMode,
    observations: RefCell<Vec<ViewportObservation>>,
    callback: RefCell<TriggerCallback>,
}

impl VisibilityTrigger {
    /// `callback` returns whether it handled the element. A `false` return
    /// leaves `Once` and `Marker` elements eligible for the next entry.
    pub fn new(
        dom: Rc<dyn Dom>,
        options: ObserverOptions,
        mode: TriggerMode,
        callback: impl FnMut(ElementId) -> bool + 'static,
    ) -> Self {
        Self {
            dom,
            options,
            mode,
            observations: RefCell::new(Vec::new()),
            callback: RefCell::new(Box::new(callback)),
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    pub fn observe(&self, elements: &[ElementId]) -> usize {
        {
            let mut observations = self.observations.borrow_mut();
            for el in elements {
                if !observations.iter().any(|obs| obs.element == *el) {
                    observations.push(ViewportObservation::new(*el));
                }
            }
        }
        self.check()
    }

    pub fn unobserve(&self, element: ElementId) {
        self.observations
            .borrow_mut()
            .retain(|obs| obs.element != element);
    }

    pub fn disconnect(&self) {
        self.observations.borrow_mut().clear();
    }

    pub fn observations(&self) -> Vec<ViewportObservation> {
        self.observations.borrow().clone()
    }

    pub fn is_triggered(&self, element: ElementId) -> bool {
        self.observations
            .borrow()
            .iter()
            .any(|obs| obs.element == element && obs.triggered)
    }

    /// Recomputes every observation and fires for elements that just entered
    /// view. Elements with no layout count as out of view.
    pub fn check(&self) -> usize {
        let viewport = self.dom.viewport();
        let entered: Vec<ElementId> = {
            let mut observations = self.observations.borrow_mut();
            observations
                .iter_mut()
                .filter_map(|obs| {
                    let now_visible = self
                        .dom
                        .bounding_rect(obs.element)
                        .is_some_and(|rect| is_intersecting(&rect, &viewport, &self.options));
                    let just_entered = now_visible && !obs.intersecting;
                    obs.intersecting = now_visible;
                    let eligible = match &self.mode {
                        TriggerMode::Once => !obs.triggered,
                        TriggerMode::Marker(class) => !self.dom.has_class(obs.element, class),
                        TriggerMode::Repeat => true,
                    };
                    (just_entered && eligible).then_some(obs.element)
                })
                .collect()
        };

        let mut fired = 0;
        for element in entered {
            let handled = match self.callback.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(element),
                Err(_) => {
                    debug!(?element, "visibility callback re-entered, skipping");
                    continue;
                }
            };
            fired += 1;
            trace!(?element, handled, "element entered view");
            if !handled {
                continue;
            }
            if let TriggerMode::Marker(class) = &self.mode {
                self.dom.add_class(element, class);
            }
            if let Some(obs) = self
                .observations
                .borrow_mut()
                .iter_mut()
                .find(|obs| obs.element == element)
            {
                obs.triggered = true;
            }
        }
        fired
    }

    /// Re-checks on window scroll and resize for as long as the returned
    /// subscriptions live.
    pub fn attach(self: &Rc<Self>, bus: &EventBus) -> Vec<Subscription> {
        [EventKind::Scroll, EventKind::Resize]
            .into_iter()
            .map(|kind| {
                let trigger = Rc::clone(self);
                bus.listen(EventTarget::Window, kind, move |_| {
                    trigger.check();
                })
            })
            .collect()
    }
}
