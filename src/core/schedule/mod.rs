//! # Schedule Module
//!
//! Clock-driven passes: once at startup, once at shutdown, every interval,
//! or per cron expression.
//!
//! Cron expressions are not evaluated here. A [`CronEvaluator`] supplied
//! by the caller reports the next fire time and [`ScheduleTrigger`] waits
//! for it. [`CronFields`] only builds the expression text.

mod trigger;

pub use trigger::ScheduleTrigger;

use crate::core::scanner::Scope;
use crate::error::ScheduleError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// When a schedule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleTiming {
    OnStartup,
    OnShutdown,
    Interval {
        #[serde(default)]
        hours: u64,
        #[serde(default)]
        minutes: u64,
    },
    /// Either a full expression or the fields to build one from
    Cron {
        #[serde(default)]
        expression: Option<String>,
        #[serde(default)]
        fields: Option<CronFields>,
    },
}

/// A timing plus the scopes it organizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    #[serde(flatten)]
    pub timing: ScheduleTiming,
    /// Scopes to organize; empty means every active rule's scope
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl ScheduleSpec {
    pub fn new(timing: ScheduleTiming) -> Self {
        Self {
            timing,
            scopes: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn interval(&self) -> Result<Option<Duration>, ScheduleError> {
        match self.timing {
            ScheduleTiming::Interval { hours, minutes } => {
                let seconds = hours.saturating_mul(3600).saturating_add(minutes.saturating_mul(60));
                if seconds == 0 {
                    return Err(ScheduleError::EmptyInterval);
                }
                Ok(Some(Duration::from_secs(seconds)))
            }
            _ => Ok(None),
        }
    }

    pub fn cron_expression(&self) -> Result<Option<String>, ScheduleError> {
        match &self.timing {
            ScheduleTiming::Cron { expression, fields } => match (expression, fields) {
                (Some(expression), _) if !expression.trim().is_empty() => {
                    Ok(Some(expression.trim().to_string()))
                }
                (_, Some(fields)) => Ok(Some(fields.to_expression())),
                _ => Err(ScheduleError::MissingCronExpression),
            },
            _ => Ok(None),
        }
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.timing {
            ScheduleTiming::OnStartup => write!(f, "on startup"),
            ScheduleTiming::OnShutdown => write!(f, "on shutdown"),
            ScheduleTiming::Interval { hours, minutes } => {
                write!(f, "every {hours}h {minutes}m")
            }
            ScheduleTiming::Cron { .. } => match self.cron_expression() {
                Ok(Some(expression)) => write!(f, "cron '{expression}'"),
                _ => write!(f, "cron (incomplete)"),
            },
        }
    }
}

/// Minute, hour, day-of-month, month and day-of-week fields.
///
/// Blank fields mean "every". Values may be comma lists, ranges or steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronFields {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl CronFields {
    /// Six-field Quartz expression `0 m h dom mon dow`.
    ///
    /// Quartz needs `?` in exactly one of the day fields: day-of-month
    /// yields when only day-of-week is given, otherwise day-of-week does.
    pub fn to_expression(&self) -> String {
        let minute = normalize_field(&self.minute);
        let hour = normalize_field(&self.hour);
        let month = normalize_field(&self.month);

        let (day_of_month, day_of_week) =
            if self.day_of_month.trim().is_empty() && !self.day_of_week.trim().is_empty() {
                ("?".to_string(), normalize_field(&self.day_of_week))
            } else {
                (normalize_field(&self.day_of_month), "?".to_string())
            };

        format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}")
    }
}

fn normalize_field(field: &str) -> String {
    if field.trim().is_empty() {
        return "*".to_string();
    }
    field
        .split(',')
        .map(|part| match part.trim() {
            "" => "*",
            value => value,
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Computes cron fire times.
///
/// Implemented outside this crate, e.g. on top of a cron parsing library.
pub trait CronEvaluator: Send + Sync {
    /// The first fire time strictly after `after`, or `None` if the
    /// expression never fires again.
    fn next_fire(
        &self,
        expression: &str,
        after: DateTime<Local>,
    ) -> Result<Option<DateTime<Local>>, String>;
}
