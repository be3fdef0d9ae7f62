//! User records, tiers, and the monthly sync allowance.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier, parsed from the user record's `tier` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Pro,
    Elite,
}

impl Tier {
    pub fn from_str_name(s: &str) -> Tier {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => Tier::Pro,
            "elite" => Tier::Elite,
            _ => Tier::Free,
        }
    }

    /// Monthly sync allowance; `None` = unlimited.
    pub fn monthly_allowance(&self) -> Option<u32> {
        match self {
            Tier::Free => Some(10),
            Tier::Pro | Tier::Elite => None,
        }
    }

    /// Free-tier activities get the branding step appended.
    pub fn requires_branding(&self) -> bool {
        matches!(self, Tier::Free)
    }
}

/// Per-kind notification opt-outs. A missing preferences object means
/// everything is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "default_true", alias = "notifyPipelineSuccess")]
    pub notify_pipeline_success: bool,
    #[serde(default = "default_true", alias = "notifyPipelineFailure")]
    pub notify_pipeline_failure: bool,
    #[serde(default = "default_true", alias = "notifyPendingInput")]
    pub notify_pending_input: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            notify_pipeline_success: true,
            notify_pipeline_failure: true,
            notify_pending_input: true,
        }
    }
}

/// A connected integration (OAuth tokens live in `secrets`, plugin
/// defaults in `config`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

/// The per-tenant user document, created by the auth hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: bool,
    #[serde(default, alias = "trialEndsAt")]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "syncCountThisMonth")]
    pub sync_count_this_month: u32,
    #[serde(default, alias = "syncCountResetAt")]
    pub sync_count_reset_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "preventedSyncCount")]
    pub prevented_sync_count: u32,
    #[serde(default, alias = "fcmTokens")]
    pub fcm_tokens: Vec<String>,
    #[serde(default, alias = "notificationPreferences")]
    pub notification_preferences: Option<NotificationPreferences>,
    #[serde(default)]
    pub integrations: HashMap<String, IntegrationSettings>,
}

impl UserRecord {
    pub fn tier(&self) -> Tier {
        Tier::from_str_name(&self.tier)
    }

    /// Whether the counter window has rolled over. The reset boundary
    /// is start-of-calendar-month in UTC.
    pub fn needs_monthly_reset(&self, now: DateTime<Utc>) -> bool {
        match self.sync_count_reset_at {
            Some(reset_at) => {
                reset_at.year() != now.year() || reset_at.month() != now.month()
            }
            // Never reset before: only worth resetting if there is a count.
            None => self.sync_count_this_month > 0,
        }
    }

    /// Tier gate. Admins and users inside an active trial always pass;
    /// otherwise the tier's monthly allowance applies.
    pub fn can_sync(&self, now: DateTime<Utc>) -> bool {
        if self.is_admin {
            return true;
        }
        if let Some(trial_ends) = self.trial_ends_at {
            if now < trial_ends {
                return true;
            }
        }
        match self.tier().monthly_allowance() {
            Some(allowance) => self.sync_count_this_month < allowance,
            None => true,
        }
    }

    /// Effective notification preferences (missing = all on).
    pub fn preferences(&self) -> NotificationPreferences {
        self.notification_preferences.clone().unwrap_or_default()
    }

    /// Plugin-default config for an integration, by its short id
    /// (e.g. `strava`). Empty map when the integration is absent.
    pub fn integration_config(&self, id: &str) -> HashMap<String, String> {
        self.integrations
            .get(id)
            .map(|i| i.config.clone())
            .unwrap_or_default()
    }
}
