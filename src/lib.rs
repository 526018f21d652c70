pub mod config;
pub mod counter;
pub mod dom;
pub mod driver;
pub mod easing;
pub mod errors;
pub mod events;
pub mod form;
pub mod format;
pub mod logging;
pub mod models;
pub mod rate_limit;
pub mod scheduler;
pub mod site;
pub mod validation;
pub mod visibility;

pub use config::SiteConfig;
pub use counter::{AnimationHandle, CounterAnimator};
pub use dom::{Dom, MemoryDom};
pub use errors::{SiteError, ValidationError};
pub use events::{Event, EventBus, EventKind, EventTarget, Subscription, Subscriptions};
pub use form::{ContactForm, SubmitOutcome};
pub use models::{AnimationTask, ElementId, Rect, ValidationResult};
pub use scheduler::Scheduler;
pub use site::{PageElements, SiteController};
pub use validation::FormValidator;
pub use visibility::{TriggerMode, VisibilityTrigger};
