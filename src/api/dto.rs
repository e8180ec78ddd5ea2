//! Request bodies and response views for the REST API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::care::notification::{
    AppointmentReminder, MedicationReminder, DEFAULT_APPOINTMENT_LEAD_HOURS,
    DEFAULT_APPOINTMENT_MINUTES,
};
use crate::care::{
    AdherenceStatus, DeliveryMethod, HealthRecord, Medication, Notification, Patient, Priority,
};
use crate::error::CareResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MissQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPatient {
    pub name: String,
    pub condition: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewPatient {
    pub fn into_patient(self) -> CareResult<Patient> {
        Patient::new(&self.name, &self.condition)?
            .with_contact(self.email.as_deref(), self.phone.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub frequency_per_day: u32,
    pub instructions: String,
}

impl NewMedication {
    pub fn into_medication(self, now: NaiveDateTime) -> CareResult<Medication> {
        Medication::new(
            &self.name,
            &self.dosage,
            self.frequency_per_day,
            &self.instructions,
            now,
        )
    }
}

fn parse_priority(priority: Option<&str>) -> CareResult<Option<Priority>> {
    priority.map(str::parse).transpose()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMedicationReminder {
    pub patient_id: u64,
    pub medication_name: String,
    pub dosage: String,
    pub scheduled_time: Option<NaiveDateTime>,
    pub priority: Option<String>,
    pub reminder_hours_before: u32,
    pub medication_id: Option<u64>,
}

impl NewMedicationReminder {
    pub fn reminder(&self) -> CareResult<MedicationReminder> {
        Ok(MedicationReminder::new(&self.medication_name, &self.dosage)?
            .with_lead_hours(self.reminder_hours_before)?
            .linked_to(self.medication_id))
    }

    pub fn priority(&self) -> CareResult<Priority> {
        Ok(parse_priority(self.priority.as_deref())?.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAppointmentReminder {
    pub patient_id: u64,
    pub doctor_name: String,
    pub location: String,
    pub appointment_type: Option<String>,
    pub appointment_time: Option<NaiveDateTime>,
    pub priority: Option<String>,
    pub reminder_hours_before: u32,
    pub duration_minutes: u32,
}

impl Default for NewAppointmentReminder {
    fn default() -> Self {
        NewAppointmentReminder {
            patient_id: 0,
            doctor_name: String::new(),
            location: String::new(),
            appointment_type: None,
            appointment_time: None,
            priority: None,
            reminder_hours_before: DEFAULT_APPOINTMENT_LEAD_HOURS,
            duration_minutes: DEFAULT_APPOINTMENT_MINUTES,
        }
    }
}

impl NewAppointmentReminder {
    pub fn reminder(&self) -> CareResult<AppointmentReminder> {
        AppointmentReminder::new(
            &self.doctor_name,
            &self.location,
            self.appointment_type.as_deref(),
            self.appointment_time,
            self.reminder_hours_before,
            self.duration_minutes,
        )
    }

    pub fn priority(&self) -> CareResult<Option<Priority>> {
        parse_priority(self.priority.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub hours_before: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FailureRequest {
    pub reason: String,
}

/// A medication with its derived schedule and adherence figures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationView<'a> {
    #[serde(flatten)]
    pub medication: &'a Medication,
    pub schedule_times: &'a [String],
    pub next_scheduled_time: String,
    pub is_due_soon: bool,
    pub adherence_rate: f64,
    pub adherence_percentage: String,
    pub adherence_status: AdherenceStatus,
}

impl<'a> MedicationView<'a> {
    pub fn new(medication: &'a Medication, now: NaiveDateTime) -> Self {
        MedicationView {
            medication,
            schedule_times: medication.schedule_times(),
            next_scheduled_time: medication.next_scheduled_time(),
            is_due_soon: medication.is_due_soon(now),
            adherence_rate: medication.adherence_rate(),
            adherence_percentage: medication.adherence_percentage(),
            adherence_status: medication.adherence_status(),
        }
    }

    pub fn list(medications: &'a [Medication], now: NaiveDateTime) -> Vec<Self> {
        medications.iter().map(|m| MedicationView::new(m, now)).collect()
    }
}

/// A notification with its subject and timing state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView<'a> {
    #[serde(flatten)]
    pub notification: &'a Notification,
    pub subject: String,
    pub resolved_delivery_method: DeliveryMethod,
    pub is_due: bool,
    pub is_overdue: bool,
    pub age_in_minutes: i64,
    pub formatted_created_at: String,
}

impl<'a> NotificationView<'a> {
    pub fn new(notification: &'a Notification, now: NaiveDateTime) -> Self {
        NotificationView {
            notification,
            subject: notification.subject(),
            resolved_delivery_method: notification.resolved_delivery_method(),
            is_due: notification.is_due(now),
            is_overdue: notification.is_overdue(now),
            age_in_minutes: notification.age_in_minutes(now),
            formatted_created_at: notification.formatted_created_at(),
        }
    }

    pub fn list(notifications: &'a [Notification], now: NaiveDateTime) -> Vec<Self> {
        notifications
            .iter()
            .map(|n| NotificationView::new(n, now))
            .collect()
    }
}

/// A health record with its rendered summary and timing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecordView<'a> {
    #[serde(flatten)]
    pub record: &'a HealthRecord,
    pub summary: String,
    pub details: String,
    pub timing_status: String,
    pub is_overdue: bool,
}

impl<'a> HealthRecordView<'a> {
    pub fn new(record: &'a HealthRecord, now: NaiveDateTime) -> Self {
        HealthRecordView {
            record,
            summary: record.summary(),
            details: record.details(),
            timing_status: record.timing_status(),
            is_overdue: record.is_overdue(now),
        }
    }

    pub fn list(records: &'a [HealthRecord], now: NaiveDateTime) -> Vec<Self> {
        records.iter().map(|r| HealthRecordView::new(r, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CareError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_appointment_request_defaults() {
        let request: NewAppointmentReminder = serde_json::from_str(
            r#"{"patientId": 1, "doctorName": "Smith", "location": "Clinic",
                "appointmentTime": "2024-03-11T09:30:00"}"#,
        )
        .unwrap();
        assert_eq!(request.reminder_hours_before, 24);
        assert_eq!(request.duration_minutes, 30);
        let reminder = request.reminder().unwrap();
        assert_eq!(reminder.reminder_time().to_string(), "2024-03-10 09:30:00");
        assert_eq!(request.priority().unwrap(), None);
    }

    #[test]
    fn test_medication_reminder_request_validates_priority() {
        let request: NewMedicationReminder = serde_json::from_str(
            r#"{"patientId": 1, "medicationName": "Metformin", "dosage": "500mg", "priority": "critical"}"#,
        )
        .unwrap();
        assert!(matches!(request.priority(), Err(CareError::Validation(_))));
        assert!(request.reminder().is_ok());
    }

    #[test]
    fn test_missing_fields_fail_validation_not_parsing() {
        let request: NewPatient = serde_json::from_str(r#"{"condition": "Asthma"}"#).unwrap();
        assert!(matches!(request.into_patient(), Err(CareError::Validation(_))));

        let request: NewMedication = serde_json::from_str(r#"{"name": "Aspirin", "dosage": "81mg"}"#).unwrap();
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert!(request.into_medication(now).is_err());
    }

    #[test]
    fn test_medication_view_flattens_entity() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let medication = Medication::new("Aspirin", "81mg", 1, "", now)
            .unwrap()
            .with_dose_history(9, 1);
        let json = serde_json::to_value(MedicationView::new(&medication, now)).unwrap();
        assert_eq!(json["name"], "Aspirin");
        assert_eq!(json["frequencyPerDay"], 1);
        assert_eq!(json["adherencePercentage"], "90.0%");
        assert_eq!(json["adherenceStatus"], "Excellent");
        assert_eq!(json["scheduleTimes"][0], "08:00");
    }

    #[test]
    fn test_notification_view_reports_age() {
        let created = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let notification = Notification::medication(
            1,
            MedicationReminder::new("Aspirin", "81mg").unwrap(),
            None,
            Priority::Normal,
            created,
        );
        let json = serde_json::to_value(NotificationView::new(
            &notification,
            created + chrono::Duration::minutes(95),
        ))
        .unwrap();
        assert_eq!(json["ageInMinutes"], 95);
        assert_eq!(json["formattedCreatedAt"], notification.formatted_created_at());
        assert_eq!(json["notificationType"], "MEDICATION");
    }

    #[test]
    fn test_health_record_view_renders_text() {
        use crate::care::{MedicationRecord, RecordKind};

        let slot = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let record = HealthRecord::new(
            1,
            RecordKind::Medication(MedicationRecord::missed(4, "Aspirin", "81mg", Some(slot), Some("Nausea"))),
            slot,
        );
        let json = serde_json::to_value(HealthRecordView::new(
            &record,
            slot + chrono::Duration::hours(1),
        ))
        .unwrap();
        assert_eq!(json["recordType"], "MEDICATION");
        assert_eq!(json["summary"], "Medication: Aspirin (81mg) - Missed (scheduled for 08:00)");
        assert_eq!(json["timingStatus"], "N/A");
        assert_eq!(json["isOverdue"], true);
        assert!(json["details"].as_str().unwrap().contains("• Missed Reason: Nausea"));
    }
}
