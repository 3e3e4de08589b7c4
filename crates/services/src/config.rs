use std::env;
use std::time::Duration;

/// Knobs for a running test session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    tick_interval: Duration,
    submit_timeout: Duration,
    always_confirm_submit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(30),
            always_confirm_submit: false,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `EXAM_TICK_MS`, `EXAM_SUBMIT_TIMEOUT_SECS` and
    /// `EXAM_ALWAYS_CONFIRM`. Unparseable or zero values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ms) = lookup("EXAM_TICK_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            config = config.with_tick_interval(Duration::from_millis(ms));
        }
        if let Some(secs) =
            lookup("EXAM_SUBMIT_TIMEOUT_SECS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            config = config.with_submit_timeout(Duration::from_secs(secs));
        }
        if let Some(flag) = lookup("EXAM_ALWAYS_CONFIRM") {
            match flag.trim() {
                "1" | "true" | "yes" => config.always_confirm_submit = true,
                "0" | "false" | "no" => config.always_confirm_submit = false,
                _ => {}
            }
        }
        config
    }

    /// Zero is ignored: the tick loop needs a positive period.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.tick_interval = interval;
        }
        self
    }

    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.submit_timeout = timeout;
        }
        self
    }

    #[must_use]
    pub fn with_always_confirm_submit(mut self, always: bool) -> Self {
        self.always_confirm_submit = always;
        self
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        self.submit_timeout
    }

    #[must_use]
    pub fn always_confirm_submit(&self) -> bool {
        self.always_confirm_submit
    }
}
