use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::store::StoreClient;

pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";
pub const DEFAULT_REMINDER_HOURS_BEFORE: i64 = 24;

#[derive(Debug, Clone, Deserialize)]
struct SettingRow {
    key: String,
    value: String,
}

/// Snapshot of the `clinic_settings` key/value table.
///
/// The engine is a read-only consumer; settings are edited elsewhere.
/// `reminder_window_start`/`end` are surfaced for operators but do not
/// gate dispatch.
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub automation_enabled: bool,
    pub campaign_reminders_enabled: bool,
    pub campaign_nps_enabled: bool,
    pub reminder_hours_before: i64,
    pub reminder_window_start: Option<String>,
    pub reminder_window_end: Option<String>,
    pub clinic_timezone: Tz,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            automation_enabled: false,
            campaign_reminders_enabled: false,
            campaign_nps_enabled: false,
            reminder_hours_before: DEFAULT_REMINDER_HOURS_BEFORE,
            reminder_window_start: None,
            reminder_window_end: None,
            clinic_timezone: default_timezone(),
        }
    }
}

impl AutomationSettings {
    pub fn reminders_active(&self) -> bool {
        self.automation_enabled && self.campaign_reminders_enabled
    }

    pub fn nps_active(&self) -> bool {
        self.automation_enabled && self.campaign_nps_enabled
    }
}

fn default_timezone() -> Tz {
    // The constant is a valid IANA id, parse cannot fail.
    Tz::from_str(DEFAULT_TIMEZONE).unwrap()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "t" | "1" | "yes" | "on")
}

pub struct SettingsReader {
    store: Arc<StoreClient>,
}

impl SettingsReader {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// Fetches a fresh settings snapshot. Unknown keys are ignored,
    /// malformed values fall back to defaults with a warning.
    pub async fn load(&self) -> Result<AutomationSettings> {
        let rows: Vec<SettingRow> = self
            .store
            .select("clinic_settings", "select=key,value")
            .await?;

        let mut settings = AutomationSettings::default();

        for row in rows {
            match row.key.as_str() {
                "automation_enabled" => settings.automation_enabled = parse_bool(&row.value),
                "campaign_reminders_enabled" => {
                    settings.campaign_reminders_enabled = parse_bool(&row.value)
                }
                "campaign_nps_enabled" => settings.campaign_nps_enabled = parse_bool(&row.value),
                "reminder_hours_before" => match row.value.trim().parse::<i64>() {
                    Ok(h) if h > 0 => settings.reminder_hours_before = h,
                    _ => warn!(
                        "Invalid reminder_hours_before '{}', keeping {}",
                        row.value, settings.reminder_hours_before
                    ),
                },
                "reminder_window_start" => {
                    settings.reminder_window_start = Some(row.value.trim().to_string())
                }
                "reminder_window_end" => {
                    settings.reminder_window_end = Some(row.value.trim().to_string())
                }
                "clinic_timezone" => match Tz::from_str(row.value.trim()) {
                    Ok(tz) => settings.clinic_timezone = tz,
                    Err(_) => warn!(
                        "Unknown clinic_timezone '{}', keeping {}",
                        row.value, settings.clinic_timezone
                    ),
                },
                _ => {}
            }
        }

        Ok(settings)
    }
}
