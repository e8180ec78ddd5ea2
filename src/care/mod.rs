//! Domain model for medication adherence tracking
//!
//! This module holds the entities (patients, medications, notifications,
//! health records) and the pure logic that operates on them:
//! - Adherence rates and status bands
//! - Daily dosing schedules
//! - Polymorphic reminder content and delivery

pub mod adherence;
pub mod medication;
pub mod notification;
pub mod patient;
pub mod record;
pub mod schedule;

pub use adherence::AdherenceStatus;
pub use medication::Medication;
pub use notification::{
    AppointmentReminder, MedicationReminder, Notification, NotificationKind, ReminderContext,
    SendReport,
};
pub use patient::Patient;
pub use record::{HealthRecord, MedicationRecord, RecordKind};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CareError;

/// Display format shared by created/scheduled/sent timestamps.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Local wall-clock time, the reference point for due/overdue checks.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn required(value: &str, message: &str) -> Result<String, CareError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CareError::validation(message));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

impl FromStr for Priority {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(CareError::validation(
                "Priority must be LOW, NORMAL, HIGH, or URGENT",
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "LOW"),
            Priority::Normal => write!(f, "NORMAL"),
            Priority::High => write!(f, "HIGH"),
            Priority::Urgent => write!(f, "URGENT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryMethod {
    Email,
    Sms,
    Push,
    All,
}

impl DeliveryMethod {
    /// Channel implied by a priority when none was chosen explicitly.
    pub fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::Urgent => DeliveryMethod::All,
            Priority::High => DeliveryMethod::Sms,
            Priority::Normal => DeliveryMethod::Push,
            Priority::Low => DeliveryMethod::Email,
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EMAIL" => Ok(DeliveryMethod::Email),
            "SMS" => Ok(DeliveryMethod::Sms),
            "PUSH" => Ok(DeliveryMethod::Push),
            "ALL" => Ok(DeliveryMethod::All),
            _ => Err(CareError::validation(
                "Delivery method must be EMAIL, SMS, PUSH, or ALL",
            )),
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMethod::Email => write!(f, "EMAIL"),
            DeliveryMethod::Sms => write!(f, "SMS"),
            DeliveryMethod::Push => write!(f, "PUSH"),
            DeliveryMethod::All => write!(f, "ALL"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl FromStr for DeliveryStatus {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(DeliveryStatus::Pending),
            "SENT" => Ok(DeliveryStatus::Sent),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "FAILED" => Ok(DeliveryStatus::Failed),
            _ => Err(CareError::validation(
                "Delivery status must be PENDING, SENT, DELIVERED, or FAILED",
            )),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "PENDING"),
            DeliveryStatus::Sent => write!(f, "SENT"),
            DeliveryStatus::Delivered => write!(f, "DELIVERED"),
            DeliveryStatus::Failed => write!(f, "FAILED"),
        }
    }
}
