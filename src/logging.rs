use crate::errors::SiteError;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

/// Installs the global fmt subscriber, filtered by `RUST_LOG` on top of
/// `default_directive` (for example `"info"` or `"care_site=debug"`).
pub fn init(default_directive: &str) -> Result<(), SiteError> {
    let directive: Directive = default_directive.parse().map_err(SiteError::logging)?;
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .try_init()
        .map_err(SiteError::logging)
}
