use crate::config::SiteConfig;
use crate::counter::CounterAnimator;
use crate::dom::Dom;
use crate::errors::SiteError;
use crate::events::{Event, EventBus, EventKind, EventTarget, Subscriptions};
use crate::format::parse_leading_int;
use crate::form::ContactForm;
use crate::models::{AnimationTask, ElementId};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::validation::FormValidator;
use crate::visibility::{TriggerMode, VisibilityTrigger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const ACTIVE_CLASS: &str = "active";
pub const HIDDEN_CLASS: &str = "hidden";
pub const COUNTED_CLASS: &str = "counted";
pub const ANIMATED_CLASS: &str = "animated";
pub const PULSE_CLASS: &str = "pulse-animation";

const NAVBAR_SCROLLED: &str = "bg-white/95 backdrop-blur-sm";
const MENU_ICON_CLOSED: &str = "fas fa-bars text-xl";
const MENU_ICON_OPEN: &str = "fas fa-times text-xl";
const FADE_IN_CLASSES: [&str; 3] = ["fade-in-up", "fade-in-left", "fade-in-right"];
const COUNTER_VALUE_CLASSES: [&str; 2] = ["text-3xl", "text-4xl"];
const DEMO_PAGE: &str = "demo.html";
const SELECTED_ROW_CLASSES: &str = "bg-blue-50 border-l-4 border-blue-500";

/// Last path segment, with the site root mapped to `index.html`.
pub fn page_name(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some("") | None => "index.html",
        Some(name) => name,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounters {
    pub patients: Option<ElementId>,
    pub appointments: Option<ElementId>,
    pub satisfaction: Option<ElementId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageElements {
    pub navbar: Option<ElementId>,
    pub nav_links: Vec<ElementId>,
    pub mobile_menu_button: Option<ElementId>,
    pub mobile_menu: Option<ElementId>,
    pub fade_ins: Vec<ElementId>,
    pub counters: Vec<ElementId>,
    pub progress_bars: Vec<ElementId>,
    pub contact_form: Option<ElementId>,
    pub tab_buttons: Vec<ElementId>,
    pub tab_panels: Vec<ElementId>,
    pub dashboard: DashboardCounters,
    pub heart_rate: Option<ElementId>,
    pub anchor_links: Vec<ElementId>,
    pub patient_rows: Vec<ElementId>,
}

impl PageElements {
    pub fn discover(dom: &dyn Dom) -> Self {
        let mut fade_ins = Vec::new();
        for class in FADE_IN_CLASSES {
            for el in dom.query_class(class) {
                if !fade_ins.contains(&el) {
                    fade_ins.push(el);
                }
            }
        }

        Self {
            navbar: dom.by_id("navbar"),
            nav_links: dom.query_class("nav-link"),
            mobile_menu_button: dom.by_id("mobile-menu-btn"),
            mobile_menu: dom.by_id("mobile-menu"),
            fade_ins,
            counters: dom.query_attr("data-count"),
            progress_bars: dom.query_class("progress-bar"),
            contact_form: dom.by_id("contact-form"),
            tab_buttons: dom.query_class("demo-tab-btn"),
            tab_panels: dom.query_class("demo-tab"),
            dashboard: DashboardCounters {
                patients: dom.by_id("patients-count"),
                appointments: dom.by_id("appointments-count"),
                satisfaction: dom.by_id("satisfaction-rate"),
            },
            heart_rate: dom.by_id("heart-rate"),
            anchor_links: dom
                .query_attr("href")
                .into_iter()
                .filter(|el| dom.attribute(*el, "href").is_some_and(|href| href.starts_with('#')))
                .collect(),
            patient_rows: dom.query_class("patient-row"),
        }
    }
}

/// Timers owned by the page. Handles that already fired are pruned as new
/// ones arrive.
#[derive(Clone)]
struct TimerSet {
    scheduler: Scheduler,
    handles: Rc<RefCell<Vec<TimerHandle>>>,
}

impl TimerSet {
    fn track(&self, handle: TimerHandle) {
        let mut handles = self.handles.borrow_mut();
        handles.retain(|h| self.scheduler.is_scheduled(*h));
        handles.push(handle);
    }

    fn live(&self) -> usize {
        self.handles
            .borrow()
            .iter()
            .filter(|h| self.scheduler.is_scheduled(**h))
            .count()
    }

    fn clear_all(&self) {
        let handles: Vec<TimerHandle> = self.handles.borrow_mut().drain(..).collect();
        for handle in handles {
            self.scheduler.clear_timer(handle);
        }
    }
}

#[derive(Clone)]
struct Context {
    dom: Rc<dyn Dom>,
    scheduler: Scheduler,
    config: Rc<SiteConfig>,
    animator: Rc<CounterAnimator>,
    rng: Rc<RefCell<StdRng>>,
    timers: TimerSet,
}

impl Context {
    fn fill_progress_bar(&self, bar: ElementId) -> bool {
        match self.dom.attribute(bar, "data-width") {
            Some(width) => {
                self.dom.set_style(bar, "width", &format!("{}%", width.trim()));
                self.dom.add_class(bar, ANIMATED_CLASS);
                true
            }
            None => false,
        }
    }

    fn start_dashboard_demo(&self, counters: DashboardCounters, bars: &[ElementId]) {
        let duration = self.config.dashboard_counter_duration();
        for (el, end, suffix) in [
            (counters.patients, 47, ""),
            (counters.appointments, 23, ""),
            (counters.satisfaction, 96, "%"),
        ] {
            if let Some(el) = el {
                self.animator
                    .animate(AnimationTask::new(el, 0, end, duration).with_suffix(suffix));
            }
        }

        let base = self.config.dashboard_progress_delay();
        let stagger = self.config.progress_stagger();
        for (index, bar) in bars.iter().copied().enumerate() {
            let ctx = self.clone();
            let delay = base + stagger * index as u32;
            let timer = self.scheduler.set_timeout(delay, move || {
                ctx.fill_progress_bar(bar);
            });
            self.timers.track(timer);
        }
        debug!(bars = bars.len(), "dashboard demo started");
    }

    fn start_vital_signs(&self, heart_rate: ElementId) {
        let ctx = self.clone();
        let update = move || {
            let variation: i64 = ctx.rng.borrow_mut().random_range(-4..4);
            ctx.dom.set_text(heart_rate, &format!("{} BPM", 72 + variation));
            ctx.dom.add_class(heart_rate, PULSE_CLASS);
            let dom = Rc::clone(&ctx.dom);
            let timer = ctx.scheduler.set_timeout(ctx.config.pulse(), move || {
                dom.remove_class(heart_rate, PULSE_CLASS)
            });
            ctx.timers.track(timer);
        };
        update();
        let timer = self
            .scheduler
            .set_interval(self.config.vitals_interval(), update);
        self.timers.track(timer);
    }

    fn refresh_metrics(&self, counters: DashboardCounters) {
        let draws = {
            let mut rng = self.rng.borrow_mut();
            [
                (counters.patients, rng.random_range(45..=49i64), ""),
                (counters.appointments, rng.random_range(21..=23i64), ""),
                (counters.satisfaction, rng.random_range(94..=97i64), "%"),
            ]
        };
        let duration = self.config.metric_counter_duration();
        for (el, next, suffix) in draws {
            let Some(el) = el else {
                continue;
            };
            let current = parse_leading_int(&self.dom.text(el)).unwrap_or(0);
            if current != next {
                self.animator
                    .animate(AnimationTask::new(el, current, next, duration).with_suffix(suffix));
            }
        }
    }

    fn start_metric_refresh(&self, counters: DashboardCounters) {
        let ctx = self.clone();
        let timer = self
            .scheduler
            .set_interval(self.config.metrics_interval(), move || ctx.refresh_metrics(counters));
        self.timers.track(timer);
    }
}

pub struct SiteController {
    ctx: Context,
    bus: EventBus,
    validator: Rc<FormValidator>,
    subscriptions: Subscriptions,
    triggers: Vec<Rc<VisibilityTrigger>>,
    contact_form: Option<Rc<ContactForm>>,
}

impl SiteController {
    pub fn new(
        dom: Rc<dyn Dom>,
        scheduler: Scheduler,
        bus: EventBus,
        config: SiteConfig,
    ) -> Result<Self, SiteError> {
        Self::with_rng(dom, scheduler, bus, config, StdRng::from_os_rng())
    }

    /// Same as [`SiteController::new`] with reproducible simulated readings.
    pub fn with_seed(
        dom: Rc<dyn Dom>,
        scheduler: Scheduler,
        bus: EventBus,
        config: SiteConfig,
        seed: u64,
    ) -> Result<Self, SiteError> {
        Self::with_rng(dom, scheduler, bus, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        dom: Rc<dyn Dom>,
        scheduler: Scheduler,
        bus: EventBus,
        config: SiteConfig,
        rng: StdRng,
    ) -> Result<Self, SiteError> {
        config.validate()?;
        if scheduler.frame_interval() != config.frame_interval() {
            warn!(
                scheduler = ?scheduler.frame_interval(),
                configured = ?config.frame_interval(),
                "scheduler frame rate differs from config, use Scheduler::from_config"
            );
        }
        let animator = Rc::new(CounterAnimator::new(Rc::clone(&dom), scheduler.clone()));
        let validator = Rc::new(FormValidator::new(Rc::clone(&dom), config.messages.clone()));
        let timers = TimerSet {
            scheduler: scheduler.clone(),
            handles: Rc::new(RefCell::new(Vec::new())),
        };
        Ok(Self {
            ctx: Context {
                dom,
                scheduler,
                config: Rc::new(config),
                animator,
                rng: Rc::new(RefCell::new(rng)),
                timers,
            },
            bus,
            validator,
            subscriptions: Subscriptions::default(),
            triggers: Vec::new(),
            contact_form: None,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.ctx.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.ctx.scheduler
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn animator(&self) -> &CounterAnimator {
        &self.ctx.animator
    }

    pub fn validator(&self) -> &FormValidator {
        &self.validator
    }

    pub fn contact_form(&self) -> Option<&ContactForm> {
        self.contact_form.as_deref()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn live_timers(&self) -> usize {
        self.ctx.timers.live()
    }

    pub fn dispatch(&self, event: Event) -> usize {
        self.bus.dispatch(&*self.ctx.dom, event)
    }

    pub fn init(&mut self, elements: &PageElements, path: &str) {
        let page = page_name(path);
        info!(page, "initialising page");

        self.setup_navigation(elements.navbar, &elements.nav_links, page);
        self.setup_fade_ins(&elements.fade_ins);
        self.setup_demo_tabs(&elements.tab_buttons, &elements.tab_panels);
        self.setup_contact_form(elements.contact_form);
        self.setup_counters(&elements.counters);
        self.setup_progress_bars(&elements.progress_bars);
        self.setup_mobile_menu(elements.mobile_menu_button, elements.mobile_menu);
        self.setup_anchor_links(&elements.anchor_links);
        self.setup_patient_rows(&elements.patient_rows);

        if page == DEMO_PAGE {
            let ctx = self.ctx.clone();
            let dashboard = elements.dashboard;
            let bars = elements.progress_bars.clone();
            let heart_rate = elements.heart_rate;
            let timer = self
                .ctx
                .scheduler
                .set_timeout(self.ctx.config.demo_start_delay(), move || {
                    ctx.start_dashboard_demo(dashboard, &bars);
                    if let Some(heart_rate) = heart_rate {
                        ctx.start_vital_signs(heart_rate);
                    }
                });
            self.ctx.timers.track(timer);
            self.start_metric_refresh(elements.dashboard);
        }
    }

    pub fn setup_navigation(&mut self, navbar: Option<ElementId>, links: &[ElementId], page: &str) {
        let dom = &self.ctx.dom;
        for link in links {
            if dom.attribute(*link, "href").as_deref() == Some(page) {
                dom.add_class(*link, ACTIVE_CLASS);
            }
        }

        let Some(navbar) = navbar else {
            debug!("no navbar on page");
            return;
        };
        let dom = Rc::clone(dom);
        let offset = self.ctx.config.navbar_offset;
        self.subscriptions.push(self.bus.listen(
            EventTarget::Window,
            EventKind::Scroll,
            move |_| {
                if dom.scroll_y() > offset {
                    dom.add_classes(navbar, NAVBAR_SCROLLED);
                } else {
                    dom.remove_classes(navbar, NAVBAR_SCROLLED);
                }
            },
        ));
    }

    pub fn setup_mobile_menu(&mut self, button: Option<ElementId>, menu: Option<ElementId>) {
        let (Some(button), Some(menu)) = (button, menu) else {
            debug!("no mobile menu on page");
            return;
        };

        let dom = Rc::clone(&self.ctx.dom);
        self.subscriptions.push(self.bus.listen(
            EventTarget::Element(button),
            EventKind::Click,
            move |_| {
                let hidden = dom.toggle_class(menu, HIDDEN_CLASS);
                set_menu_icon(&*dom, button, hidden);
            },
        ));

        let dom = Rc::clone(&self.ctx.dom);
        self.subscriptions.push(self.bus.listen(
            EventTarget::Document,
            EventKind::Click,
            move |event| {
                let Some(target) = event.target else {
                    return;
                };
                if !dom.contains(button, target) && !dom.contains(menu, target) {
                    dom.add_class(menu, HIDDEN_CLASS);
                    set_menu_icon(&*dom, button, true);
                }
            },
        ));
    }

    pub fn setup_fade_ins(&mut self, elements: &[ElementId]) {
        if elements.is_empty() {
            return;
        }
        let dom = Rc::clone(&self.ctx.dom);
        let trigger = Rc::new(VisibilityTrigger::new(
            Rc::clone(&self.ctx.dom),
            self.ctx.config.fade_in,
            TriggerMode::Repeat,
            move |el| {
                dom.set_style(el, "opacity", "1");
                dom.set_style(el, "transform", "translateY(0)");
                true
            },
        ));
        self.register_trigger(trigger, elements);
    }

    pub fn setup_counters(&mut self, containers: &[ElementId]) {
        if containers.is_empty() {
            return;
        }
        let ctx = self.ctx.clone();
        let trigger = Rc::new(VisibilityTrigger::new(
            Rc::clone(&self.ctx.dom),
            self.ctx.config.counters,
            TriggerMode::Marker(COUNTED_CLASS.to_string()),
            move |container| {
                let dom = &*ctx.dom;
                let target = COUNTER_VALUE_CLASSES
                    .iter()
                    .find_map(|class| dom.find_descendant_with_class(container, class));
                let end = dom
                    .attribute(container, "data-count")
                    .and_then(|value| parse_leading_int(&value));
                let (Some(target), Some(end)) = (target, end) else {
                    return false;
                };
                ctx.animator
                    .animate(AnimationTask::new(target, 0, end, ctx.config.counter_duration()));
                true
            },
        ));
        self.register_trigger(trigger, containers);
    }

    pub fn setup_progress_bars(&mut self, bars: &[ElementId]) {
        if bars.is_empty() {
            return;
        }
        let ctx = self.ctx.clone();
        let trigger = Rc::new(VisibilityTrigger::new(
            Rc::clone(&self.ctx.dom),
            self.ctx.config.progress_bars,
            TriggerMode::Repeat,
            move |bar| {
                // The marker is set by the fill timer, not here.
                let dom = &*ctx.dom;
                if dom.has_class(bar, ANIMATED_CLASS) || !dom.has_attribute(bar, "data-width") {
                    return false;
                }
                let fill = ctx.clone();
                let timer = ctx
                    .scheduler
                    .set_timeout(ctx.config.progress_delay(), move || {
                        fill.fill_progress_bar(bar);
                    });
                ctx.timers.track(timer);
                true
            },
        ));
        self.register_trigger(trigger, bars);
    }

    pub fn setup_contact_form(&mut self, form: Option<ElementId>) {
        let Some(form_el) = form else {
            return;
        };
        let form = Rc::new(ContactForm::new(
            Rc::clone(&self.ctx.dom),
            self.ctx.scheduler.clone(),
            Rc::clone(&self.validator),
            form_el,
            &self.ctx.config,
        ));

        let submitting = Rc::clone(&form);
        self.subscriptions.push(self.bus.listen(
            EventTarget::Element(form_el),
            EventKind::Submit,
            move |_| {
                submitting.submit();
            },
        ));

        for field in self.validator.fields(form_el) {
            let validator = Rc::clone(&self.validator);
            self.subscriptions.push(self.bus.listen(
                EventTarget::Element(field),
                EventKind::Blur,
                move |_| {
                    validator.validate_field(field);
                },
            ));
            let validator = Rc::clone(&self.validator);
            self.subscriptions.push(self.bus.listen(
                EventTarget::Element(field),
                EventKind::Input,
                move |_| validator.clear_field_error(field),
            ));
        }
        self.contact_form = Some(form);
    }

    pub fn setup_demo_tabs(&mut self, buttons: &[ElementId], panels: &[ElementId]) {
        if buttons.is_empty() {
            return;
        }
        let buttons: Rc<[ElementId]> = buttons.into();
        let panels: Rc<[ElementId]> = panels.into();
        for button in buttons.iter().copied() {
            let dom = Rc::clone(&self.ctx.dom);
            let buttons = Rc::clone(&buttons);
            let panels = Rc::clone(&panels);
            self.subscriptions.push(self.bus.listen(
                EventTarget::Element(button),
                EventKind::Click,
                move |_| {
                    for el in buttons.iter().chain(panels.iter()) {
                        dom.remove_class(*el, ACTIVE_CLASS);
                    }
                    dom.add_class(button, ACTIVE_CLASS);
                    let Some(tab) = dom.attribute(button, "data-tab") else {
                        return;
                    };
                    let panel_id = format!("{tab}-tab");
                    let panel = panels.iter().copied().find(|panel| {
                        dom.attribute(*panel, "id").as_deref() == Some(panel_id.as_str())
                    });
                    if let Some(panel) = panel {
                        dom.add_class(panel, ACTIVE_CLASS);
                    }
                },
            ));
        }
    }

    pub fn setup_anchor_links(&mut self, anchors: &[ElementId]) {
        for anchor in anchors.iter().copied() {
            let dom = Rc::clone(&self.ctx.dom);
            let bus = self.bus.clone();
            self.subscriptions.push(self.bus.listen(
                EventTarget::Element(anchor),
                EventKind::Click,
                move |_| {
                    let Some(href) = dom.attribute(anchor, "href") else {
                        return;
                    };
                    let target = href
                        .strip_prefix('#')
                        .filter(|id| !id.is_empty())
                        .and_then(|id| dom.by_id(id));
                    let Some(target) = target else {
                        debug!(href, "anchor target not on page");
                        return;
                    };
                    dom.scroll_into_view(target);
                    bus.dispatch(&*dom, Event::window(EventKind::Scroll));
                },
            ));
        }
    }

    pub fn setup_patient_rows(&mut self, rows: &[ElementId]) {
        if rows.is_empty() {
            return;
        }
        let rows: Rc<[ElementId]> = rows.into();
        for row in rows.iter().copied() {
            let dom = Rc::clone(&self.ctx.dom);
            let rows = Rc::clone(&rows);
            self.subscriptions.push(self.bus.listen(
                EventTarget::Element(row),
                EventKind::Click,
                move |_| {
                    for other in rows.iter() {
                        dom.remove_classes(*other, SELECTED_ROW_CLASSES);
                    }
                    dom.add_classes(row, SELECTED_ROW_CLASSES);
                },
            ));
        }
    }

    pub fn start_dashboard_demo(&self, counters: DashboardCounters, bars: &[ElementId]) {
        self.ctx.start_dashboard_demo(counters, bars);
    }

    pub fn start_vital_signs(&self, heart_rate: Option<ElementId>) {
        match heart_rate {
            Some(el) => self.ctx.start_vital_signs(el),
            None => debug!("no heart rate readout on page"),
        }
    }

    pub fn start_metric_refresh(&self, counters: DashboardCounters) {
        self.ctx.start_metric_refresh(counters);
    }

    pub fn teardown(&mut self) {
        self.subscriptions.dispose_all();
        for trigger in self.triggers.drain(..) {
            trigger.disconnect();
        }
        self.ctx.timers.clear_all();
        self.ctx.animator.cancel_all();
        if let Some(form) = self.contact_form.take() {
            form.cancel_pending();
        }
        info!("page torn down");
    }

    fn register_trigger(&mut self, trigger: Rc<VisibilityTrigger>, elements: &[ElementId]) {
        for subscription in trigger.attach(&self.bus) {
            self.subscriptions.push(subscription);
        }
        trigger.observe(elements);
        self.triggers.push(trigger);
    }
}

impl Drop for SiteController {
    fn drop(&mut self) {
        self.ctx.timers.clear_all();
        self.ctx.animator.cancel_all();
    }
}

fn set_menu_icon(dom: &dyn Dom, button: ElementId, hidden: bool) {
    let icon = dom
        .children(button)
        .into_iter()
        .find(|child| dom.tag(*child).is_some_and(|tag| tag == "i"));
    if let Some(icon) = icon {
        dom.set_class_name(icon, if hidden { MENU_ICON_CLOSED } else { MENU_ICON_OPEN });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_name_defaults_to_index() {
        assert_eq!(page_name("/"), "index.html");
        assert_eq!(page_name(""), "index.html");
        assert_eq!(page_name("/site/demo.html"), "demo.html");
        assert_eq!(page_name("contact.html"), "contact.html");
    }
}
