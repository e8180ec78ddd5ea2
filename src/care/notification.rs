//! Reminder notifications
//!
//! A [`Notification`] carries the delivery state shared by every reminder and
//! a [`NotificationKind`] payload. Subject, content and send behavior are
//! chosen per kind by matching on the payload:
//! - Medication reminders escalate their channel by priority
//! - Appointment reminders escalate by how close the appointment is

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::adherence;
use super::{required, DeliveryMethod, DeliveryStatus, Medication, Priority, DISPLAY_FORMAT};
use crate::error::{CareError, CareResult};
use crate::storage::Entity;

/// Minutes past the scheduled time before an unsent reminder is overdue.
pub const OVERDUE_GRACE_MINUTES: i64 = 15;

pub const MAX_MEDICATION_LEAD_HOURS: u32 = 24;
pub const MAX_APPOINTMENT_LEAD_HOURS: u32 = 168;
pub const DEFAULT_APPOINTMENT_LEAD_HOURS: u32 = 24;
pub const DEFAULT_APPOINTMENT_MINUTES: u32 = 30;
pub const MAX_APPOINTMENT_MINUTES: u32 = 480;

const APPOINTMENT_LONG_FORMAT: &str = "%A, %B %-d, %Y at %-I:%M %p";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: Option<u64>,
    patient_id: u64,
    priority: Priority,
    created_at: NaiveDateTime,
    scheduled_at: Option<NaiveDateTime>,
    sent: bool,
    sent_at: Option<NaiveDateTime>,
    delivery_method: Option<DeliveryMethod>,
    delivery_status: DeliveryStatus,
    failure_reason: Option<String>,
    #[serde(flatten)]
    kind: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notificationType")]
pub enum NotificationKind {
    #[serde(rename = "MEDICATION")]
    Medication(MedicationReminder),
    #[serde(rename = "APPOINTMENT")]
    Appointment(AppointmentReminder),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationReminder {
    medication_name: String,
    dosage: String,
    reminder_hours_before: u32,
    medication_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentReminder {
    doctor_name: String,
    location: String,
    appointment_type: String,
    appointment_time: NaiveDateTime,
    reminder_hours_before: u32,
    duration_minutes: u32,
}

/// Data a reminder may quote that lives outside the notification itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderContext<'a> {
    pub medication: Option<&'a Medication>,
    pub recipient: Option<&'a str>,
}

/// Outcome of a simulated send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub result: String,
    pub delivery_method: DeliveryMethod,
    pub sent_at: NaiveDateTime,
}

fn validate_lead_hours(hours: u32, max: u32) -> CareResult<u32> {
    if hours <= max {
        Ok(hours)
    } else {
        Err(CareError::validation(format!(
            "Reminder hours must be between 0 and {}",
            max
        )))
    }
}

impl MedicationReminder {
    pub fn new(medication_name: &str, dosage: &str) -> CareResult<Self> {
        Ok(MedicationReminder {
            medication_name: required(
                medication_name,
                "Medication notification must have a medication name",
            )?,
            dosage: required(dosage, "Medication notification must have a dosage")?,
            reminder_hours_before: 0,
            medication_id: None,
        })
    }

    pub fn for_medication(medication: &Medication) -> CareResult<Self> {
        let mut reminder = MedicationReminder::new(medication.name(), medication.dosage())?;
        reminder.medication_id = medication.id();
        Ok(reminder)
    }

    pub fn with_lead_hours(mut self, hours: u32) -> CareResult<Self> {
        self.reminder_hours_before = validate_lead_hours(hours, MAX_MEDICATION_LEAD_HOURS)?;
        Ok(self)
    }

    pub fn linked_to(mut self, medication_id: Option<u64>) -> Self {
        self.medication_id = medication_id;
        self
    }

    pub fn is_lead_reminder(&self) -> bool {
        self.reminder_hours_before > 0
    }

    pub fn timing_description(&self) -> String {
        match self.reminder_hours_before {
            0 => "Medication time notification".to_string(),
            1 => "1 hour reminder".to_string(),
            h => format!("{} hour reminder", h),
        }
    }

    fn subject(&self, priority: Priority) -> String {
        let prefix = match priority {
            Priority::Urgent => "URGENT: ",
            Priority::High => "IMPORTANT: ",
            _ => "",
        };
        let mut subject = format!("{}Time to take {}", prefix, self.medication_name);
        if self.reminder_hours_before > 0 {
            subject.push_str(&format!(" ({}h reminder)", self.reminder_hours_before));
        }
        subject
    }

    fn content(
        &self,
        priority: Priority,
        scheduled_at: Option<NaiveDateTime>,
        ctx: &ReminderContext<'_>,
    ) -> String {
        let mut content = String::from(match priority {
            Priority::Urgent => "URGENT MEDICATION REMINDER\n\n",
            Priority::High => "IMPORTANT MEDICATION REMINDER\n\n",
            _ => "Medication Reminder\n\n",
        });

        content.push_str("It's time to take your medication:\n\n");
        content.push_str(&format!("Medication: {}\n", self.medication_name));
        content.push_str(&format!("Dosage: {}\n", self.dosage));
        if let Some(at) = scheduled_at {
            content.push_str(&format!("Scheduled Time: {}\n", at.format("%H:%M")));
        }

        if let Some(medication) = ctx.medication {
            if !medication.instructions().is_empty() {
                content.push_str(&format!("Instructions: {}\n", medication.instructions()));
            }

            let rate = medication.adherence_rate();
            if adherence::is_poor(rate) {
                content.push_str(&format!(
                    "\nYour current adherence is {}. Taking this medication will help improve your health outcomes!",
                    medication.adherence_percentage()
                ));
            } else if adherence::is_excellent(rate) {
                content.push_str(&format!(
                    "\nGreat job! You're maintaining excellent medication adherence at {}!",
                    medication.adherence_percentage()
                ));
            }
        }

        content.push_str("\n\nTap here to mark as taken or provide a reason if missed.");
        content
    }

    fn dispatch(&self, priority: Priority) -> (DeliveryMethod, &'static str) {
        match priority {
            Priority::Urgent => (
                DeliveryMethod::All,
                "SUCCESS: Urgent medication notification sent via SMS, email, and push notification",
            ),
            Priority::High => (
                DeliveryMethod::Sms,
                "SUCCESS: High priority medication notification sent via SMS and push notification",
            ),
            _ => (
                DeliveryMethod::Push,
                "SUCCESS: Medication notification sent via push notification",
            ),
        }
    }

    pub fn medication_name(&self) -> &str {
        &self.medication_name
    }

    pub fn dosage(&self) -> &str {
        &self.dosage
    }

    pub fn reminder_hours_before(&self) -> u32 {
        self.reminder_hours_before
    }

    pub fn medication_id(&self) -> Option<u64> {
        self.medication_id
    }
}

/// How far ahead of the appointment a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeadTier {
    Urgent,
    Reminder,
    Notice,
}

impl LeadTier {
    fn of(hours: u32) -> Self {
        match hours {
            0..=2 => LeadTier::Urgent,
            3..=24 => LeadTier::Reminder,
            _ => LeadTier::Notice,
        }
    }
}

impl AppointmentReminder {
    pub fn new(
        doctor_name: &str,
        location: &str,
        appointment_type: Option<&str>,
        appointment_time: Option<NaiveDateTime>,
        reminder_hours_before: u32,
        duration_minutes: u32,
    ) -> CareResult<Self> {
        let appointment_time = appointment_time.ok_or_else(|| {
            CareError::validation("Appointment notification must have an appointment time")
        })?;
        let mut reminder = AppointmentReminder {
            doctor_name: required(doctor_name, "Appointment notification must have a doctor name")?,
            location: required(location, "Appointment notification must have a location")?,
            appointment_type: appointment_type.unwrap_or_default().trim().to_string(),
            appointment_time,
            reminder_hours_before: validate_lead_hours(
                reminder_hours_before,
                MAX_APPOINTMENT_LEAD_HOURS,
            )?,
            duration_minutes: DEFAULT_APPOINTMENT_MINUTES,
        };
        reminder.set_duration_minutes(duration_minutes)?;
        Ok(reminder)
    }

    pub fn set_duration_minutes(&mut self, minutes: u32) -> CareResult<()> {
        if minutes == 0 || minutes > MAX_APPOINTMENT_MINUTES {
            return Err(CareError::validation(
                "Duration must be between 1 and 480 minutes",
            ));
        }
        self.duration_minutes = minutes;
        Ok(())
    }

    /// When the reminder should fire.
    pub fn reminder_time(&self) -> NaiveDateTime {
        self.appointment_time - Duration::hours(i64::from(self.reminder_hours_before))
    }

    pub fn formatted_appointment_time(&self) -> String {
        self.appointment_time.format(APPOINTMENT_LONG_FORMAT).to_string()
    }

    pub fn is_today(&self, now: NaiveDateTime) -> bool {
        self.appointment_time.date() == now.date()
    }

    /// Within the next four hours.
    pub fn is_soon(&self, now: NaiveDateTime) -> bool {
        let hours = (self.appointment_time - now).num_hours();
        (0..=4).contains(&hours)
    }

    pub fn time_until(&self, now: NaiveDateTime) -> String {
        let remaining = self.appointment_time - now;
        if remaining < Duration::zero() {
            return "Past appointment".to_string();
        }

        let days = remaining.num_days();
        let hours = remaining.num_hours() % 24;
        let minutes = remaining.num_minutes() % 60;
        if days > 0 {
            format!("{} day(s), {} hour(s)", days, hours)
        } else if hours > 0 {
            format!("{} hour(s), {} minute(s)", hours, minutes)
        } else {
            format!("{} minute(s)", minutes)
        }
    }

    fn subject(&self) -> String {
        let tier = LeadTier::of(self.reminder_hours_before);
        let prefix = match tier {
            LeadTier::Urgent => "URGENT: ",
            LeadTier::Reminder => "REMINDER: ",
            LeadTier::Notice => "NOTICE: ",
        };
        let when = match tier {
            LeadTier::Notice => self.appointment_time.format("%b %-d, %Y"),
            _ => self.appointment_time.format("%b %-d at %-I:%M %p"),
        };
        format!("{}Appointment with Dr. {} - {}", prefix, self.doctor_name, when)
    }

    fn content(&self) -> String {
        let tier = LeadTier::of(self.reminder_hours_before);
        let mut content = String::from(match tier {
            LeadTier::Urgent => "URGENT APPOINTMENT REMINDER\n\n",
            LeadTier::Reminder => "Appointment Reminder\n\n",
            LeadTier::Notice => "Upcoming Appointment Notice\n\n",
        });

        content.push_str("You have an upcoming appointment:\n\n");
        content.push_str(&format!("Doctor: Dr. {}\n", self.doctor_name));
        content.push_str(&format!("Location: {}\n", self.location));
        content.push_str(&format!("Date & Time: {}\n", self.formatted_appointment_time()));
        if !self.appointment_type.is_empty() {
            content.push_str(&format!("Type: {}\n", self.appointment_type));
        }
        content.push_str(&format!("Duration: {} minutes\n", self.duration_minutes));

        match tier {
            LeadTier::Urgent => {
                content.push_str(&format!(
                    "\nYour appointment is in {} hour(s). Please prepare to leave soon!",
                    self.reminder_hours_before
                ));
                content.push_str("\nConsider traffic and parking time.");
            }
            LeadTier::Reminder => {
                content.push_str("\nReminder: Your appointment is tomorrow.");
                content.push_str("\nPlease confirm your attendance if required.");
            }
            LeadTier::Notice => {
                content.push_str("\nThis is an advance notice for your upcoming appointment.");
                content.push_str("\nContact the office if you need to reschedule.");
            }
        }

        content.push_str("\n\nPreparation:");
        content.push_str("\n• Bring your insurance card and ID");
        content.push_str("\n• Arrive 15 minutes early for check-in");
        content.push_str("\n• Bring a list of current medications");

        let kind = self.appointment_type.to_lowercase();
        if kind.contains("blood") || kind.contains("lab") {
            content.push_str("\n• Fasting may be required - check with your doctor");
        }
        if kind.contains("physical") || kind.contains("exam") {
            content.push_str("\n• Wear comfortable, easily removable clothing");
        }

        content
    }

    /// Channel, escalated priority and result line for a send.
    fn dispatch(&self) -> (DeliveryMethod, Option<Priority>, &'static str) {
        match LeadTier::of(self.reminder_hours_before) {
            LeadTier::Urgent => (
                DeliveryMethod::All,
                Some(Priority::Urgent),
                "SUCCESS: Urgent appointment reminder sent via SMS, email, and push notification",
            ),
            LeadTier::Reminder => (
                DeliveryMethod::Email,
                None,
                "SUCCESS: Appointment reminder sent via email and push notification",
            ),
            LeadTier::Notice => (
                DeliveryMethod::Email,
                None,
                "SUCCESS: Early appointment reminder sent via email",
            ),
        }
    }

    pub fn doctor_name(&self) -> &str {
        &self.doctor_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn appointment_type(&self) -> &str {
        &self.appointment_type
    }

    pub fn appointment_time(&self) -> NaiveDateTime {
        self.appointment_time
    }

    pub fn reminder_hours_before(&self) -> u32 {
        self.reminder_hours_before
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }
}

impl Notification {
    pub fn medication(
        patient_id: u64,
        reminder: MedicationReminder,
        scheduled_at: Option<NaiveDateTime>,
        priority: Priority,
        created_at: NaiveDateTime,
    ) -> Self {
        Notification::build(
            patient_id,
            NotificationKind::Medication(reminder),
            scheduled_at,
            priority,
            created_at,
        )
    }

    /// Appointment reminders default to HIGH priority and fire
    /// `reminder_hours_before` ahead of the appointment.
    pub fn appointment(
        patient_id: u64,
        reminder: AppointmentReminder,
        created_at: NaiveDateTime,
    ) -> Self {
        let scheduled_at = Some(reminder.reminder_time());
        Notification::build(
            patient_id,
            NotificationKind::Appointment(reminder),
            scheduled_at,
            Priority::High,
            created_at,
        )
    }

    fn build(
        patient_id: u64,
        kind: NotificationKind,
        scheduled_at: Option<NaiveDateTime>,
        priority: Priority,
        created_at: NaiveDateTime,
    ) -> Self {
        Notification {
            id: None,
            patient_id,
            priority,
            created_at,
            scheduled_at,
            sent: false,
            sent_at: None,
            delivery_method: None,
            delivery_status: DeliveryStatus::Pending,
            failure_reason: None,
            kind,
        }
    }

    pub fn notification_type(&self) -> &'static str {
        match self.kind {
            NotificationKind::Medication(_) => "MEDICATION",
            NotificationKind::Appointment(_) => "APPOINTMENT",
        }
    }

    pub fn subject(&self) -> String {
        match &self.kind {
            NotificationKind::Medication(reminder) => reminder.subject(self.priority),
            NotificationKind::Appointment(reminder) => reminder.subject(),
        }
    }

    pub fn content(&self, ctx: &ReminderContext<'_>) -> String {
        match &self.kind {
            NotificationKind::Medication(reminder) => {
                reminder.content(self.priority, self.scheduled_at, ctx)
            }
            NotificationKind::Appointment(reminder) => reminder.content(),
        }
    }

    /// Simulates delivery and marks the reminder sent. Calling it again
    /// re-stamps the sent time.
    pub fn send(&mut self, ctx: &ReminderContext<'_>, now: NaiveDateTime) -> SendReport {
        let (method, headline, appointment) = match &self.kind {
            NotificationKind::Medication(reminder) => {
                let (method, headline) = reminder.dispatch(self.priority);
                (method, headline, None)
            }
            NotificationKind::Appointment(reminder) => {
                let (method, escalation, headline) = reminder.dispatch();
                if let Some(priority) = escalation {
                    self.priority = priority;
                }
                (method, headline, Some(reminder.formatted_appointment_time()))
            }
        };

        self.delivery_method = Some(method);
        self.mark_sent(now);

        let mut result = String::from(headline);
        result.push_str("\nDelivery Details:");
        result.push_str(&format!("\n• Method: {}", method));
        result.push_str(&format!("\n• Time: {}", self.formatted_sent_time()));
        result.push_str(&format!("\n• Recipient: {}", ctx.recipient.unwrap_or("Unknown")));
        if let Some(when) = appointment {
            result.push_str(&format!("\n• Appointment: {}", when));
        }

        SendReport {
            result,
            delivery_method: method,
            sent_at: now,
        }
    }

    fn mark_sent(&mut self, now: NaiveDateTime) {
        self.sent = true;
        self.sent_at = Some(now);
        self.delivery_status = DeliveryStatus::Sent;
        self.failure_reason = None;
    }

    pub fn mark_delivered(&mut self) -> CareResult<()> {
        self.require_sent("delivered")?;
        self.delivery_status = DeliveryStatus::Delivered;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: &str) -> CareResult<()> {
        self.require_sent("failed")?;
        self.delivery_status = DeliveryStatus::Failed;
        self.failure_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        Ok(())
    }

    fn require_sent(&self, target: &str) -> CareResult<()> {
        if self.delivery_status != DeliveryStatus::Sent {
            return Err(CareError::state(format!(
                "Only a SENT notification can be marked {} (current status: {})",
                target, self.delivery_status
            )));
        }
        Ok(())
    }

    /// A companion reminder firing `hours_before` ahead of this one's event.
    pub fn follow_up(&self, hours_before: u32, created_at: NaiveDateTime) -> CareResult<Notification> {
        match &self.kind {
            NotificationKind::Medication(reminder) => {
                let scheduled = self.scheduled_at.ok_or_else(|| {
                    CareError::state("Cannot create reminder without scheduled time")
                })?;
                let follow_up = reminder.clone().with_lead_hours(hours_before)?;
                Ok(Notification::medication(
                    self.patient_id,
                    follow_up,
                    Some(scheduled - Duration::hours(i64::from(hours_before))),
                    Priority::High,
                    created_at,
                ))
            }
            NotificationKind::Appointment(reminder) => {
                let follow_up = AppointmentReminder::new(
                    &reminder.doctor_name,
                    &reminder.location,
                    Some(&reminder.appointment_type),
                    Some(reminder.appointment_time),
                    hours_before,
                    reminder.duration_minutes,
                )?;
                Ok(Notification::appointment(self.patient_id, follow_up, created_at))
            }
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn set_priority(&mut self, priority: &str) -> CareResult<()> {
        self.priority = priority.parse()?;
        Ok(())
    }

    pub fn set_delivery_method(&mut self, method: &str) -> CareResult<()> {
        self.delivery_method = Some(method.parse()?);
        Ok(())
    }

    pub fn set_delivery_status(&mut self, status: &str) -> CareResult<()> {
        self.delivery_status = status.parse()?;
        Ok(())
    }

    /// Changes the lead time; appointment reminders move their scheduled
    /// time along with it.
    pub fn set_reminder_hours_before(&mut self, hours: u32) -> CareResult<()> {
        match &mut self.kind {
            NotificationKind::Medication(reminder) => {
                reminder.reminder_hours_before =
                    validate_lead_hours(hours, MAX_MEDICATION_LEAD_HOURS)?;
            }
            NotificationKind::Appointment(reminder) => {
                reminder.reminder_hours_before =
                    validate_lead_hours(hours, MAX_APPOINTMENT_LEAD_HOURS)?;
                self.scheduled_at = Some(reminder.reminder_time());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> CareResult<()> {
        match &self.kind {
            NotificationKind::Medication(reminder) => {
                required(
                    &reminder.medication_name,
                    "Medication notification must have a medication name",
                )?;
                required(&reminder.dosage, "Medication notification must have a dosage")?;
            }
            NotificationKind::Appointment(reminder) => {
                required(
                    &reminder.doctor_name,
                    "Appointment notification must have a doctor name",
                )?;
                required(&reminder.location, "Appointment notification must have a location")?;
            }
        }
        Ok(())
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        match self.scheduled_at {
            None => true,
            Some(scheduled) => now >= scheduled,
        }
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match (self.sent, self.scheduled_at) {
            (false, Some(scheduled)) => now > scheduled + Duration::minutes(OVERDUE_GRACE_MINUTES),
            _ => false,
        }
    }

    /// The explicit channel, or the one implied by priority.
    pub fn resolved_delivery_method(&self) -> DeliveryMethod {
        self.delivery_method
            .unwrap_or_else(|| DeliveryMethod::for_priority(self.priority))
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority.is_high()
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }

    pub fn age_in_minutes(&self, now: NaiveDateTime) -> i64 {
        (now - self.created_at).num_minutes()
    }

    pub fn formatted_created_at(&self) -> String {
        self.created_at.format(DISPLAY_FORMAT).to_string()
    }

    pub fn formatted_scheduled_time(&self) -> String {
        self.scheduled_at
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|| "Not scheduled".to_string())
    }

    pub fn formatted_sent_time(&self) -> String {
        self.sent_at
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|| "Not sent".to_string())
    }

    pub fn patient_id(&self) -> u64 {
        self.patient_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        self.scheduled_at
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn sent_at(&self) -> Option<NaiveDateTime> {
        self.sent_at
    }

    pub fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method
    }

    pub fn delivery_status(&self) -> DeliveryStatus {
        self.delivery_status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn kind(&self) -> &NotificationKind {
        &self.kind
    }
}

impl Entity for Notification {
    const KIND: &'static str = "Notification";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn medication_reminder(priority: Priority, scheduled: Option<NaiveDateTime>) -> Notification {
        Notification::medication(
            1,
            MedicationReminder::new("Metformin", "500mg").unwrap(),
            scheduled,
            priority,
            at(10, 7, 0),
        )
    }

    fn appointment_reminder(lead_hours: u32, kind: &str) -> Notification {
        let reminder = AppointmentReminder::new(
            "Smith",
            "Main Street Medical Center",
            Some(kind),
            Some(at(11, 9, 30)),
            lead_hours,
            45,
        )
        .unwrap();
        Notification::appointment(1, reminder, at(10, 7, 0))
    }

    #[test]
    fn test_urgent_medication_send_uses_all_channels() {
        let mut notification = medication_reminder(Priority::Urgent, Some(at(10, 8, 0)));
        assert_eq!(notification.delivery_status(), DeliveryStatus::Pending);

        let report = notification.send(&ReminderContext::default(), at(10, 8, 1));
        assert_eq!(notification.delivery_method(), Some(DeliveryMethod::All));
        assert!(notification.is_sent());
        assert_eq!(notification.delivery_status(), DeliveryStatus::Sent);
        assert_eq!(report.delivery_method, DeliveryMethod::All);
        assert!(report.result.starts_with("SUCCESS: Urgent medication notification"));
        assert!(report.result.contains("• Recipient: Unknown"));
    }

    #[test]
    fn test_medication_send_channel_by_priority() {
        let mut high = medication_reminder(Priority::High, None);
        high.send(&ReminderContext::default(), at(10, 8, 0));
        assert_eq!(high.delivery_method(), Some(DeliveryMethod::Sms));

        let mut low = medication_reminder(Priority::Low, None);
        low.send(&ReminderContext::default(), at(10, 8, 0));
        assert_eq!(low.delivery_method(), Some(DeliveryMethod::Push));
    }

    #[test]
    fn test_resend_restamps_sent_time() {
        let mut notification = medication_reminder(Priority::Normal, None);
        notification.send(&ReminderContext::default(), at(10, 8, 0));
        notification.send(&ReminderContext::default(), at(10, 9, 0));
        assert_eq!(notification.sent_at(), Some(at(10, 9, 0)));
    }

    #[test]
    fn test_invalid_priority_leaves_state_unchanged() {
        let mut notification = medication_reminder(Priority::High, None);
        let err = notification.set_priority("CRITICAL").unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
        assert_eq!(notification.priority(), Priority::High);

        assert!(notification.set_delivery_method("pigeon").is_err());
        assert_eq!(notification.delivery_method(), None);
        assert!(notification.set_delivery_status("LOST").is_err());
        assert_eq!(notification.delivery_status(), DeliveryStatus::Pending);

        notification.set_priority("low").unwrap();
        assert_eq!(notification.priority(), Priority::Low);
    }

    #[test]
    fn test_due_and_overdue() {
        let unscheduled = medication_reminder(Priority::Normal, None);
        assert!(unscheduled.is_due(at(1, 0, 0)));
        assert!(!unscheduled.is_overdue(at(30, 0, 0)));

        let mut scheduled = medication_reminder(Priority::Normal, Some(at(10, 8, 0)));
        assert!(!scheduled.is_due(at(10, 7, 59)));
        assert!(scheduled.is_due(at(10, 8, 0)));
        assert!(!scheduled.is_overdue(at(10, 8, 15)));
        assert!(scheduled.is_overdue(at(10, 8, 16)));

        scheduled.send(&ReminderContext::default(), at(10, 9, 0));
        assert!(!scheduled.is_overdue(at(10, 12, 0)));
    }

    #[test]
    fn test_resolved_delivery_method() {
        assert_eq!(
            medication_reminder(Priority::Urgent, None).resolved_delivery_method(),
            DeliveryMethod::All
        );
        assert_eq!(
            medication_reminder(Priority::Low, None).resolved_delivery_method(),
            DeliveryMethod::Email
        );
        let mut explicit = medication_reminder(Priority::Low, None);
        explicit.set_delivery_method("sms").unwrap();
        assert_eq!(explicit.resolved_delivery_method(), DeliveryMethod::Sms);
    }

    #[test]
    fn test_medication_subject() {
        assert_eq!(
            medication_reminder(Priority::Urgent, None).subject(),
            "URGENT: Time to take Metformin"
        );
        assert_eq!(
            medication_reminder(Priority::Normal, None).subject(),
            "Time to take Metformin"
        );
        let mut lead = medication_reminder(Priority::High, None);
        lead.set_reminder_hours_before(2).unwrap();
        assert_eq!(lead.subject(), "IMPORTANT: Time to take Metformin (2h reminder)");
    }

    #[test]
    fn test_medication_content_quotes_adherence() {
        let created = at(1, 8, 0);
        let poor = Medication::new("Metformin", "500mg", 2, "Take with meals", created)
            .unwrap()
            .with_dose_history(14, 7);
        let notification = medication_reminder(Priority::Normal, Some(at(10, 20, 0)));
        let content = notification.content(&ReminderContext {
            medication: Some(&poor),
            recipient: None,
        });
        assert!(content.starts_with("Medication Reminder"));
        assert!(content.contains("Scheduled Time: 20:00"));
        assert!(content.contains("Instructions: Take with meals"));
        assert!(content.contains("Your current adherence is 66.7%"));

        let excellent = Medication::new("Metformin", "500mg", 2, "", created)
            .unwrap()
            .with_dose_history(10, 0);
        let content = notification.content(&ReminderContext {
            medication: Some(&excellent),
            recipient: None,
        });
        assert!(content.contains("excellent medication adherence at 100.0%"));
        assert!(!content.contains("Instructions:"));

        let fair = Medication::new("Metformin", "500mg", 2, "", created)
            .unwrap()
            .with_dose_history(8, 2);
        let content = notification.content(&ReminderContext {
            medication: Some(&fair),
            recipient: None,
        });
        assert!(!content.contains("adherence"));
    }

    #[test]
    fn test_appointment_tiers() {
        let urgent = appointment_reminder(2, "Regular Checkup");
        assert_eq!(
            urgent.subject(),
            "URGENT: Appointment with Dr. Smith - Mar 11 at 9:30 AM"
        );
        assert!(urgent.content(&ReminderContext::default()).contains("in 2 hour(s)"));

        let reminder = appointment_reminder(24, "Regular Checkup");
        assert_eq!(
            reminder.subject(),
            "REMINDER: Appointment with Dr. Smith - Mar 11 at 9:30 AM"
        );
        assert_eq!(reminder.scheduled_at(), Some(at(10, 9, 30)));

        let notice = appointment_reminder(48, "Regular Checkup");
        assert_eq!(
            notice.subject(),
            "NOTICE: Appointment with Dr. Smith - Mar 11, 2024"
        );
        assert!(notice
            .content(&ReminderContext::default())
            .contains("advance notice"));
    }

    #[test]
    fn test_appointment_content_preparation_notes() {
        let lab = appointment_reminder(24, "Blood Work");
        let content = lab.content(&ReminderContext::default());
        assert!(content.contains("Date & Time: Monday, March 11, 2024 at 9:30 AM"));
        assert!(content.contains("Duration: 45 minutes"));
        assert!(content.contains("Fasting may be required"));
        assert!(!content.contains("removable clothing"));

        let exam = appointment_reminder(24, "Annual Physical");
        let content = exam.content(&ReminderContext::default());
        assert!(content.contains("removable clothing"));
        assert!(!content.contains("Fasting"));
    }

    #[test]
    fn test_appointment_send_escalates_when_close() {
        let mut urgent = appointment_reminder(1, "Checkup");
        assert_eq!(urgent.priority(), Priority::High);
        let report = urgent.send(
            &ReminderContext {
                medication: None,
                recipient: Some("Sarah Johnson"),
            },
            at(11, 8, 30),
        );
        assert_eq!(urgent.priority(), Priority::Urgent);
        assert_eq!(urgent.delivery_method(), Some(DeliveryMethod::All));
        assert!(report.result.contains("• Recipient: Sarah Johnson"));
        assert!(report.result.contains("• Appointment: Monday, March 11, 2024 at 9:30 AM"));

        let mut early = appointment_reminder(72, "Checkup");
        early.send(&ReminderContext::default(), at(8, 9, 30));
        assert_eq!(early.delivery_method(), Some(DeliveryMethod::Email));
        assert_eq!(early.priority(), Priority::High);
    }

    #[test]
    fn test_appointment_requires_identifying_fields() {
        assert!(AppointmentReminder::new("", "Clinic", None, Some(at(11, 9, 0)), 24, 30).is_err());
        assert!(AppointmentReminder::new("Smith", " ", None, Some(at(11, 9, 0)), 24, 30).is_err());
        assert!(matches!(
            AppointmentReminder::new("Smith", "Clinic", None, None, 24, 30),
            Err(CareError::Validation(_))
        ));
        assert!(AppointmentReminder::new("Smith", "Clinic", None, Some(at(11, 9, 0)), 169, 30).is_err());
        assert!(AppointmentReminder::new("Smith", "Clinic", None, Some(at(11, 9, 0)), 24, 0).is_err());
        assert!(MedicationReminder::new("", "10mg").is_err());
        assert!(MedicationReminder::new("Aspirin", "").is_err());
    }

    #[test]
    fn test_delivery_state_machine() {
        let mut notification = medication_reminder(Priority::Normal, None);
        assert!(matches!(notification.mark_delivered(), Err(CareError::State(_))));

        notification.send(&ReminderContext::default(), at(10, 8, 0));
        notification.mark_failed("carrier rejected").unwrap();
        assert_eq!(notification.delivery_status(), DeliveryStatus::Failed);
        assert_eq!(notification.failure_reason(), Some("carrier rejected"));
        assert!(notification.mark_delivered().is_err());

        notification.send(&ReminderContext::default(), at(10, 8, 5));
        notification.mark_delivered().unwrap();
        assert_eq!(notification.delivery_status(), DeliveryStatus::Delivered);
        assert_eq!(notification.failure_reason(), None);
    }

    #[test]
    fn test_follow_up_reminders() {
        let unscheduled = medication_reminder(Priority::Normal, None);
        assert!(matches!(
            unscheduled.follow_up(2, at(10, 7, 0)),
            Err(CareError::State(_))
        ));

        let scheduled = medication_reminder(Priority::Normal, Some(at(10, 20, 0)));
        let follow_up = scheduled.follow_up(2, at(10, 7, 0)).unwrap();
        assert_eq!(follow_up.scheduled_at(), Some(at(10, 18, 0)));
        assert_eq!(follow_up.priority(), Priority::High);
        match follow_up.kind() {
            NotificationKind::Medication(reminder) => {
                assert_eq!(reminder.timing_description(), "2 hour reminder");
                assert!(reminder.is_lead_reminder());
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let appointment = appointment_reminder(24, "Checkup");
        let follow_up = appointment.follow_up(2, at(10, 7, 0)).unwrap();
        assert_eq!(follow_up.scheduled_at(), Some(at(11, 7, 30)));
    }

    #[test]
    fn test_appointment_lead_change_moves_schedule() {
        let mut notification = appointment_reminder(24, "Checkup");
        notification.set_reminder_hours_before(48).unwrap();
        assert_eq!(notification.scheduled_at(), Some(at(9, 9, 30)));
        assert!(notification.set_reminder_hours_before(200).is_err());
        assert_eq!(notification.scheduled_at(), Some(at(9, 9, 30)));
    }

    #[test]
    fn test_appointment_time_helpers() {
        let notification = appointment_reminder(24, "Checkup");
        let NotificationKind::Appointment(reminder) = notification.kind() else {
            panic!("expected appointment");
        };
        assert!(reminder.is_today(at(11, 0, 0)));
        assert!(reminder.is_soon(at(11, 6, 0)));
        assert!(!reminder.is_soon(at(11, 4, 0)));
        assert_eq!(reminder.time_until(at(10, 7, 0)), "1 day(s), 2 hour(s)");
        assert_eq!(reminder.time_until(at(11, 8, 0)), "1 hour(s), 30 minute(s)");
        assert_eq!(reminder.time_until(at(11, 9, 10)), "20 minute(s)");
        assert_eq!(reminder.time_until(at(12, 0, 0)), "Past appointment");
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let notification = appointment_reminder(24, "Checkup");
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["notificationType"], "APPOINTMENT");
        assert_eq!(json["doctorName"], "Smith");
        assert_eq!(json["priority"], "HIGH");
        assert_eq!(json["deliveryStatus"], "PENDING");
    }
}
