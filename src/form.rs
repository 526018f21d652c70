use crate::config::SiteConfig;
use crate::dom::Dom;
use crate::models::{ElementId, ValidationResult};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::validation::FormValidator;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info};

pub const SUCCESS_CLASS: &str = "success-message";
pub const BUSY_CLASS: &str = "is-busy";
const SUCCESS_CLASSES: &str = "success-message mb-6";

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Rejected(Vec<ValidationResult>),
    Sending,
    Busy,
}

struct FormInner {
    dom: Rc<dyn Dom>,
    scheduler: Scheduler,
    validator: Rc<FormValidator>,
    form: ElementId,
    submit: Option<ElementId>,
    busy_label: String,
    success_text: String,
    submit_delay: std::time::Duration,
    banner_ttl: std::time::Duration,
    busy: Cell<bool>,
    original_label: RefCell<Option<String>>,
    timers: RefCell<Vec<TimerHandle>>,
}

impl FormInner {
    fn finish(&self) {
        self.show_success_message();
        self.reset();
        self.restore_submit();
        self.busy.set(false);
        info!(form = ?self.form, "contact form sent");
    }

    fn show_success_message(&self) {
        let dom = self.dom.as_ref();
        let Some(parent) = dom.parent(self.form) else {
            return;
        };
        for child in dom.children(parent) {
            if dom.has_class(child, SUCCESS_CLASS) {
                dom.remove(child);
            }
        }

        let banner = dom.create_element("div");
        dom.set_class_name(banner, SUCCESS_CLASSES);
        dom.set_text(banner, &self.success_text);
        dom.insert_before(parent, banner, self.form);

        let remove_dom = Rc::clone(&self.dom);
        let timer = self.scheduler.set_timeout(self.banner_ttl, move || {
            if remove_dom.parent(banner).is_some() {
                remove_dom.remove(banner);
            }
        });
        self.track(timer);
    }

    fn reset(&self) {
        for field in self.validator.fields(self.form) {
            let default = self.dom.attribute(field, "value").unwrap_or_default();
            self.dom.set_value(field, &default);
            self.validator.clear_field_error(field);
        }
    }

    fn restore_submit(&self) {
        let Some(button) = self.submit else {
            return;
        };
        if let Some(label) = self.original_label.borrow_mut().take() {
            self.dom.set_text(button, &label);
        }
        self.dom.set_disabled(button, false);
        self.dom.remove_class(button, BUSY_CLASS);
    }

    fn track(&self, timer: TimerHandle) {
        let mut timers = self.timers.borrow_mut();
        timers.retain(|pending| self.scheduler.is_scheduled(*pending));
        timers.push(timer);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.timers.borrow().len()
    }
}

pub struct ContactForm {
    inner: Rc<FormInner>,
}

impl ContactForm {
    pub fn new(
        dom: Rc<dyn Dom>,
        scheduler: Scheduler,
        validator: Rc<FormValidator>,
        form: ElementId,
        config: &SiteConfig,
    ) -> Self {
        let submit = dom.descendants(form).into_iter().find(|el| {
            dom.tag(*el).is_some_and(|tag| tag == "button")
                && dom.attribute(*el, "type").is_some_and(|kind| kind == "submit")
        });
        Self {
            inner: Rc::new(FormInner {
                dom,
                scheduler,
                validator,
                form,
                submit,
                busy_label: config.busy_label.clone(),
                success_text: config.success_text.clone(),
                submit_delay: config.submit_delay(),
                banner_ttl: config.success_banner_ttl(),
                busy: Cell::new(false),
                original_label: RefCell::new(None),
                timers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn form(&self) -> ElementId {
        self.inner.form
    }

    pub fn submit_button(&self) -> Option<ElementId> {
        self.inner.submit
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.get()
    }

    pub fn submit(&self) -> SubmitOutcome {
        let inner = &self.inner;
        if inner.busy.get() {
            debug!(form = ?inner.form, "submit ignored while sending");
            return SubmitOutcome::Busy;
        }

        let failures: Vec<ValidationResult> = inner
            .validator
            .validate_form(inner.form)
            .into_iter()
            .filter(|result| !result.is_valid())
            .collect();
        if !failures.is_empty() {
            info!(form = ?inner.form, failures = failures.len(), "contact form rejected");
            return SubmitOutcome::Rejected(failures);
        }

        inner.busy.set(true);
        if let Some(button) = inner.submit {
            *inner.original_label.borrow_mut() = Some(inner.dom.text(button));
            inner.dom.set_text(button, &inner.busy_label);
            inner.dom.set_disabled(button, true);
            inner.dom.add_class(button, BUSY_CLASS);
        }

        let pending = Rc::clone(inner);
        let timer = inner
            .scheduler
            .set_timeout(inner.submit_delay, move || pending.finish());
        inner.track(timer);
        debug!(form = ?inner.form, "contact form sending");
        SubmitOutcome::Sending
    }

    /// Cancels an in-flight submission and the banner timeout, restoring the
    /// submit control.
    pub fn cancel_pending(&self) {
        let timers: Vec<TimerHandle> = self.inner.timers.borrow_mut().drain(..).collect();
        for timer in timers {
            self.inner.scheduler.clear_timer(timer);
        }
        if self.inner.busy.replace(false) {
            self.inner.restore_submit();
        }
    }
}
