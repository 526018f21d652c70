use crate::errors::{SiteError, ValidationError};
use crate::models::Margin;
use crate::visibility::ObserverOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationMessages {
    pub required: String,
    pub email: String,
}

impl Default for ValidationMessages {
    fn default() -> Self {
        Self {
            required: ValidationError::MissingRequiredField
                .default_message()
                .to_string(),
            email: ValidationError::InvalidEmailFormat
                .default_message()
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub frame_rate: u32,
    pub counter_ms: u64,
    pub dashboard_counter_ms: u64,
    pub metric_counter_ms: u64,
    pub progress_delay_ms: u64,
    pub dashboard_progress_delay_ms: u64,
    pub progress_stagger_ms: u64,
    pub submit_delay_ms: u64,
    pub success_banner_ms: u64,
    pub vitals_interval_ms: u64,
    pub pulse_ms: u64,
    pub metrics_interval_ms: u64,
    pub demo_start_delay_ms: u64,
    pub navbar_offset: f64,
    pub fade_in: ObserverOptions,
    pub counters: ObserverOptions,
    pub progress_bars: ObserverOptions,
    pub busy_label: String,
    pub success_text: String,
    pub messages: ValidationMessages,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            counter_ms: 2000,
            dashboard_counter_ms: 2500,
            metric_counter_ms: 1000,
            progress_delay_ms: 200,
            dashboard_progress_delay_ms: 1000,
            progress_stagger_ms: 300,
            submit_delay_ms: 2000,
            success_banner_ms: 5000,
            vitals_interval_ms: 3000,
            pulse_ms: 1000,
            metrics_interval_ms: 5000,
            demo_start_delay_ms: 500,
            navbar_offset: 100.0,
            fade_in: ObserverOptions::new(0.1, Margin::new(0.0, 0.0, -50.0, 0.0)),
            counters: ObserverOptions::default(),
            progress_bars: ObserverOptions::default(),
            busy_label: "Sending...".to_string(),
            success_text:
                "Thank you! Your message has been sent successfully. We'll get back to you soon."
                    .to_string(),
            messages: ValidationMessages::default(),
        }
    }
}

impl SiteConfig {
    pub fn from_json(input: &str) -> Result<Self, SiteError> {
        let config: SiteConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SiteError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SiteError> {
        if self.frame_rate == 0 {
            return Err(SiteError::config("frame_rate must be at least 1"));
        }
        for (name, options) in [
            ("fade_in", &self.fade_in),
            ("counters", &self.counters),
            ("progress_bars", &self.progress_bars),
        ] {
            if !(0.0..=1.0).contains(&options.threshold) {
                return Err(SiteError::config(format!(
                    "{name}.threshold must be within 0..=1, got {}",
                    options.threshold
                )));
            }
        }
        if self.vitals_interval_ms == 0 || self.metrics_interval_ms == 0 {
            return Err(SiteError::config("refresh intervals must be non-zero"));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    pub fn counter_duration(&self) -> Duration {
        Duration::from_millis(self.counter_ms)
    }

    pub fn dashboard_counter_duration(&self) -> Duration {
        Duration::from_millis(self.dashboard_counter_ms)
    }

    pub fn metric_counter_duration(&self) -> Duration {
        Duration::from_millis(self.metric_counter_ms)
    }

    pub fn progress_delay(&self) -> Duration {
        Duration::from_millis(self.progress_delay_ms)
    }

    pub fn dashboard_progress_delay(&self) -> Duration {
        Duration::from_millis(self.dashboard_progress_delay_ms)
    }

    pub fn progress_stagger(&self) -> Duration {
        Duration::from_millis(self.progress_stagger_ms)
    }

    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    pub fn success_banner_ttl(&self) -> Duration {
        Duration::from_millis(self.success_banner_ms)
    }

    pub fn vitals_interval(&self) -> Duration {
        Duration::from_millis(self.vitals_interval_ms)
    }

    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn demo_start_delay(&self) -> Duration {
        Duration::from_millis(self.demo_start_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SiteConfig::from_json("{}").unwrap();
        assert_eq!(config, SiteConfig::default());
        assert_eq!(config.fade_in.root_margin.bottom, -50.0);
        assert_eq!(config.submit_delay(), Duration::from_secs(2));
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = SiteConfig::from_json(
            r#"{"submit_delay_ms": 10, "fade_in": {"threshold": 0.5}, "messages": {"email": "Bad email"}}"#,
        )
        .unwrap();
        assert_eq!(config.submit_delay_ms, 10);
        assert_eq!(config.fade_in.threshold, 0.5);
        assert_eq!(config.fade_in.root_margin, Margin::default());
        assert_eq!(config.messages.email, "Bad email");
        assert_eq!(config.messages.required, "This field is required");
        assert_eq!(config.counter_ms, 2000);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = SiteConfig::from_json(r#"{"counters": {"threshold": 1.5}}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("counters.threshold"));
    }

    #[test]
    fn round_trips_through_json() {
        let json = SiteConfig::default().to_json().unwrap();
        assert_eq!(SiteConfig::from_json(&json).unwrap(), SiteConfig::default());
    }
}
