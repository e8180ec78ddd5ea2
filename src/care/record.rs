use chrono::NaiveDateTime;
use serde::Serialize;

use super::{Priority, DISPLAY_FORMAT};
use crate::storage::Entity;

/// Minutes either side of the slot that still count as on time.
const ON_TIME_WINDOW_MINUTES: i64 = 15;
/// Minutes after the slot before an unrecorded dose is overdue.
const OVERDUE_GRACE_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    id: Option<u64>,
    patient_id: u64,
    created_at: NaiveDateTime,
    notes: String,
    priority: Priority,
    #[serde(flatten)]
    kind: RecordKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "recordType")]
pub enum RecordKind {
    #[serde(rename = "MEDICATION")]
    Medication(MedicationRecord),
}

/// One dose outcome for one medication.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub medication_id: u64,
    pub medication_name: String,
    pub dosage: String,
    pub scheduled_at: Option<NaiveDateTime>,
    pub taken_at: Option<NaiveDateTime>,
    pub taken: bool,
    pub missed_reason: Option<String>,
}

impl HealthRecord {
    pub fn new(patient_id: u64, kind: RecordKind, created_at: NaiveDateTime) -> Self {
        HealthRecord {
            id: None,
            patient_id,
            created_at,
            notes: String::new(),
            priority: Priority::Normal,
            kind,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = notes.trim().to_string();
        self
    }

    pub fn summary(&self) -> String {
        match &self.kind {
            RecordKind::Medication(record) => record.summary(),
        }
    }

    pub fn details(&self) -> String {
        match &self.kind {
            RecordKind::Medication(record) => {
                let mut details = record.details();
                if !self.notes.is_empty() {
                    details.push_str(&format!("• Notes: {}\n", self.notes));
                }
                details
            }
        }
    }

    pub fn timing_status(&self) -> String {
        match &self.kind {
            RecordKind::Medication(record) => record.timing_status(),
        }
    }

    /// A missed dose whose slot passed more than the grace period ago.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match &self.kind {
            RecordKind::Medication(record) => record.is_overdue(now),
        }
    }

    pub fn patient_id(&self) -> u64 {
        self.patient_id
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }
}

impl MedicationRecord {
    pub fn taken(
        medication_id: u64,
        name: &str,
        dosage: &str,
        scheduled_at: Option<NaiveDateTime>,
        taken_at: NaiveDateTime,
    ) -> Self {
        MedicationRecord {
            medication_id,
            medication_name: name.to_string(),
            dosage: dosage.to_string(),
            scheduled_at,
            taken_at: Some(taken_at),
            taken: true,
            missed_reason: None,
        }
    }

    pub fn missed(
        medication_id: u64,
        name: &str,
        dosage: &str,
        scheduled_at: Option<NaiveDateTime>,
        reason: Option<&str>,
    ) -> Self {
        MedicationRecord {
            medication_id,
            medication_name: name.to_string(),
            dosage: dosage.to_string(),
            scheduled_at,
            taken_at: None,
            taken: false,
            missed_reason: Some(reason.unwrap_or_default().trim().to_string()),
        }
    }

    pub fn summary(&self) -> String {
        let (status, time_info) = if self.taken {
            let at = self
                .taken_at
                .map(|t| format!(" at {}", t.format("%H:%M")))
                .unwrap_or_default();
            ("Taken", at)
        } else {
            let at = self
                .scheduled_at
                .map(|t| format!(" (scheduled for {})", t.format("%H:%M")))
                .unwrap_or_default();
            ("Missed", at)
        };
        format!(
            "Medication: {} ({}) - {}{}",
            self.medication_name, self.dosage, status, time_info
        )
    }

    pub fn details(&self) -> String {
        let mut details = String::from("Medication Record Details:\n");
        details.push_str(&format!("• Medication: {}\n", self.medication_name));
        details.push_str(&format!("• Dosage: {}\n", self.dosage));
        let scheduled = self
            .scheduled_at
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|| "Not scheduled".to_string());
        details.push_str(&format!("• Scheduled Time: {}\n", scheduled));
        details.push_str(&format!(
            "• Status: {}\n",
            if self.taken { "Taken" } else { "Missed" }
        ));

        if let (true, Some(taken_at)) = (self.taken, self.taken_at) {
            details.push_str(&format!("• Taken Time: {}\n", taken_at.format(DISPLAY_FORMAT)));
            details.push_str(&format!("• Timing: {}\n", self.timing_status()));
        }

        if let Some(reason) = self.missed_reason.as_deref().filter(|r| !r.is_empty()) {
            if !self.taken {
                details.push_str(&format!("• Missed Reason: {}\n", reason));
            }
        }

        details
    }

    fn minutes_from_slot(&self) -> Option<i64> {
        match (self.taken, self.scheduled_at, self.taken_at) {
            (true, Some(scheduled), Some(taken)) => Some((taken - scheduled).num_minutes()),
            _ => None,
        }
    }

    pub fn timing_status(&self) -> String {
        match self.minutes_from_slot() {
            None => "N/A".to_string(),
            Some(diff) if diff.abs() <= ON_TIME_WINDOW_MINUTES => "On Time".to_string(),
            Some(diff) if diff > 0 => format!("Late ({} minutes)", diff),
            Some(diff) => format!("Early ({} minutes)", diff.abs()),
        }
    }

    pub fn taken_on_time(&self) -> bool {
        self.minutes_from_slot()
            .is_some_and(|diff| diff.abs() <= ON_TIME_WINDOW_MINUTES)
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match (self.taken, self.scheduled_at) {
            (false, Some(scheduled)) => {
                now > scheduled + chrono::Duration::minutes(OVERDUE_GRACE_MINUTES)
            }
            _ => false,
        }
    }
}

impl Entity for HealthRecord {
    const KIND: &'static str = "HealthRecord";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}
