//! Plan usage derivations. Every function is total: missing data reads as zero usage.
use serde::Serialize;

use crate::models::{UsageLimits, UsageType};

pub const WARNING_THRESHOLD: f64 = 80.0;
pub const CRITICAL_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    None,
    Warning,
    Critical,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::None => "none",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
        }
    }
}

pub fn usage_warning_level(percentage: f64) -> WarningLevel {
    if percentage >= CRITICAL_THRESHOLD {
        WarningLevel::Critical
    } else if percentage >= WARNING_THRESHOLD {
        WarningLevel::Warning
    } else {
        WarningLevel::None
    }
}

/// Usage counters as last fetched, possibly not loaded yet
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    limits: Option<UsageLimits>,
}

impl UsageTracker {
    pub fn new(limits: Option<UsageLimits>) -> Self {
        Self { limits }
    }

    pub fn set_limits(&mut self, limits: UsageLimits) {
        self.limits = Some(limits);
    }

    pub fn limits(&self) -> Option<&UsageLimits> {
        self.limits.as_ref()
    }

    pub fn usage_percentage(&self, usage_type: UsageType) -> f64 {
        self.limits
            .as_ref()
            .and_then(|limits| limits.get(usage_type))
            .map_or(0.0, |item| item.percentage)
    }

    pub fn is_usage_limit_reached(&self, usage_type: UsageType) -> bool {
        self.usage_percentage(usage_type) >= CRITICAL_THRESHOLD
    }

    pub fn warning_level(&self, usage_type: UsageType) -> WarningLevel {
        usage_warning_level(self.usage_percentage(usage_type))
    }

    pub fn should_show_usage_warning(&self) -> bool {
        UsageType::ALL
            .iter()
            .any(|usage_type| self.warning_level(*usage_type) != WarningLevel::None)
    }

    /// Categories at warning level or above, worst first
    pub fn warnings(&self) -> Vec<(UsageType, WarningLevel)> {
        let mut warnings: Vec<_> = UsageType::ALL
            .iter()
            .map(|usage_type| (*usage_type, self.warning_level(*usage_type)))
            .filter(|(_, level)| *level != WarningLevel::None)
            .collect();
        warnings.sort_by_key(|(_, level)| match level {
            WarningLevel::Critical => 0,
            _ => 1,
        });
        warnings
    }
}
