use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use super::distribution;
use crate::care::notification::{AppointmentReminder, MedicationReminder};
use crate::care::{
    schedule, DeliveryMethod, Medication, Notification, NotificationKind, Priority,
    ReminderContext, SendReport,
};
use crate::error::{CareError, CareResult};
use crate::storage::{CareStores, Entity};

/// A sent notification together with the delivery report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub notification: Notification,
    pub report: SendReport,
}

/// One line of a batch send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotification {
    pub id: u64,
    #[serde(rename = "type")]
    pub notification_type: &'static str,
    pub subject: String,
    pub result: String,
    pub sent: bool,
    pub sent_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub id: u64,
    #[serde(rename = "type")]
    pub notification_type: &'static str,
    pub subject: String,
    pub content: String,
    pub priority: Priority,
    pub delivery_method: DeliveryMethod,
    pub scheduled_time: String,
    pub is_due: bool,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatistics {
    pub total_notifications: usize,
    pub sent_notifications: usize,
    pub pending_notifications: usize,
    pub due_notifications: usize,
    pub overdue_notifications: usize,
    pub type_distribution: BTreeMap<String, usize>,
    pub priority_distribution: BTreeMap<String, usize>,
    pub status_distribution: BTreeMap<String, usize>,
    pub sent_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    stores: Arc<CareStores>,
}

impl NotificationService {
    pub fn new(stores: Arc<CareStores>) -> Self {
        NotificationService { stores }
    }

    pub fn list(&self) -> Vec<Notification> {
        self.stores.notifications.list()
    }

    pub fn get(&self, id: u64) -> Option<Notification> {
        self.stores.notifications.get(id)
    }

    pub fn save(&self, notification: Notification) -> CareResult<Notification> {
        notification.validate()?;
        self.stores.patients.require(notification.patient_id())?;
        self.check_linked_medication(&notification)?;
        let saved = self.stores.notifications.save(notification);
        info!(
            id = ?saved.id(),
            kind = saved.notification_type(),
            patient_id = saved.patient_id(),
            "Notification saved"
        );
        Ok(saved)
    }

    /// A medication reminder may only link a medication of its own patient.
    fn check_linked_medication(&self, notification: &Notification) -> CareResult<()> {
        let NotificationKind::Medication(reminder) = notification.kind() else {
            return Ok(());
        };
        let Some(medication_id) = reminder.medication_id() else {
            return Ok(());
        };
        let medication = self.stores.medications.require(medication_id)?;
        if medication.patient_id() != Some(notification.patient_id()) {
            return Err(CareError::validation(format!(
                "Medication {} does not belong to patient {}",
                medication_id,
                notification.patient_id()
            )));
        }
        Ok(())
    }

    pub fn delete(&self, id: u64) -> bool {
        match self.stores.notifications.remove(id) {
            Some(notification) => {
                info!(id, kind = notification.notification_type(), "Notification deleted");
                true
            }
            None => false,
        }
    }

    /// Newest first.
    pub fn list_for_patient(&self, patient_id: u64) -> CareResult<Vec<Notification>> {
        self.stores.patients.require(patient_id)?;
        let mut notifications = self
            .stores
            .notifications
            .find(|n| n.patient_id() == patient_id);
        notifications.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(notifications)
    }

    fn unsent_for_patient(
        &self,
        patient_id: u64,
        pred: impl Fn(&Notification) -> bool,
    ) -> CareResult<Vec<Notification>> {
        Ok(self
            .list_for_patient(patient_id)?
            .into_iter()
            .filter(|n| !n.is_sent() && pred(n))
            .collect())
    }

    pub fn pending_for_patient(&self, patient_id: u64) -> CareResult<Vec<Notification>> {
        self.unsent_for_patient(patient_id, |_| true)
    }

    pub fn due_for_patient(&self, patient_id: u64, now: NaiveDateTime) -> CareResult<Vec<Notification>> {
        self.unsent_for_patient(patient_id, |n| n.is_due(now))
    }

    pub fn overdue_for_patient(&self, patient_id: u64, now: NaiveDateTime) -> CareResult<Vec<Notification>> {
        self.unsent_for_patient(patient_id, |n| n.is_overdue(now))
    }

    pub fn create_medication_reminder(
        &self,
        patient_id: u64,
        reminder: MedicationReminder,
        scheduled_at: Option<NaiveDateTime>,
        priority: Priority,
        now: NaiveDateTime,
    ) -> CareResult<Notification> {
        self.save(Notification::medication(
            patient_id,
            reminder,
            scheduled_at,
            priority,
            now,
        ))
    }

    /// Appointment reminders default to HIGH unless a priority is given.
    pub fn create_appointment_reminder(
        &self,
        patient_id: u64,
        reminder: AppointmentReminder,
        priority: Option<Priority>,
        now: NaiveDateTime,
    ) -> CareResult<Notification> {
        let notification = Notification::appointment(patient_id, reminder, now);
        self.save(match priority {
            Some(priority) => notification.with_priority(priority),
            None => notification,
        })
    }

    /// The linked medication, or the patient's medication of the same name.
    fn medication_for(&self, notification: &Notification) -> Option<Medication> {
        let NotificationKind::Medication(reminder) = notification.kind() else {
            return None;
        };
        let patient_id = notification.patient_id();
        if let Some(id) = reminder.medication_id() {
            return self
                .stores
                .medications
                .get(id)
                .filter(|m| m.patient_id() == Some(patient_id));
        }
        self.stores
            .medications
            .find(|m| {
                m.patient_id() == Some(patient_id)
                    && m.name().eq_ignore_ascii_case(reminder.medication_name())
            })
            .into_iter()
            .next()
    }

    fn recipient_for(&self, notification: &Notification) -> Option<String> {
        self.stores
            .patients
            .get(notification.patient_id())
            .map(|p| p.name().to_string())
    }

    pub fn content(&self, id: u64, now: NaiveDateTime) -> CareResult<NotificationContent> {
        let notification = self.stores.notifications.require(id)?;
        let medication = self.medication_for(&notification);
        let recipient = self.recipient_for(&notification);
        let ctx = ReminderContext {
            medication: medication.as_ref(),
            recipient: recipient.as_deref(),
        };

        Ok(NotificationContent {
            id,
            notification_type: notification.notification_type(),
            subject: notification.subject(),
            content: notification.content(&ctx),
            priority: notification.priority(),
            delivery_method: notification.resolved_delivery_method(),
            scheduled_time: notification.formatted_scheduled_time(),
            is_due: notification.is_due(now),
            is_overdue: notification.is_overdue(now),
        })
    }

    pub fn send(&self, id: u64, now: NaiveDateTime) -> CareResult<SendOutcome> {
        let current = self.stores.notifications.require(id)?;
        let medication = self.medication_for(&current);
        let recipient = self.recipient_for(&current);
        let ctx = ReminderContext {
            medication: medication.as_ref(),
            recipient: recipient.as_deref(),
        };

        let outcome = self.stores.notifications.update(id, |notification| {
            let report = notification.send(&ctx, now);
            Ok(SendOutcome {
                notification: notification.clone(),
                report,
            })
        })?;
        info!(
            id,
            method = %outcome.report.delivery_method,
            kind = outcome.notification.notification_type(),
            "Notification sent"
        );
        Ok(outcome)
    }

    /// Sends every unsent notification of the patient that is due.
    pub fn send_due(&self, patient_id: u64, now: NaiveDateTime) -> CareResult<Vec<SentNotification>> {
        let due = self.due_for_patient(patient_id, now)?;
        let sent = self.send_each(patient_id, &due, now)?;
        info!(patient_id, count = sent.len(), "Due notifications sent");
        Ok(sent)
    }

    /// Sends each notification in turn, skipping any removed since it was
    /// listed.
    fn send_each(
        &self,
        patient_id: u64,
        notifications: &[Notification],
        now: NaiveDateTime,
    ) -> CareResult<Vec<SentNotification>> {
        let mut sent = Vec::with_capacity(notifications.len());
        for id in notifications.iter().filter_map(Notification::id) {
            let outcome = match self.send(id, now) {
                Ok(outcome) => outcome,
                Err(CareError::NotFound { .. }) => {
                    warn!(id, patient_id, "Notification removed before it could be sent");
                    continue;
                }
                Err(err) => return Err(err),
            };
            sent.push(SentNotification {
                id,
                notification_type: outcome.notification.notification_type(),
                subject: outcome.notification.subject(),
                result: outcome.report.result,
                sent: outcome.notification.is_sent(),
                sent_time: outcome.notification.formatted_sent_time(),
            });
        }
        Ok(sent)
    }

    pub fn follow_up(&self, id: u64, hours_before: u32, now: NaiveDateTime) -> CareResult<Notification> {
        let notification = self.stores.notifications.require(id)?;
        let follow_up = notification.follow_up(hours_before, now)?;
        let saved = self.save(follow_up)?;
        info!(id, follow_up = ?saved.id(), hours_before, "Follow-up reminder created");
        Ok(saved)
    }

    pub fn mark_delivered(&self, id: u64) -> CareResult<Notification> {
        self.stores.notifications.update(id, |notification| {
            notification.mark_delivered()?;
            Ok(notification.clone())
        })
    }

    pub fn mark_failed(&self, id: u64, reason: &str) -> CareResult<Notification> {
        let failed = self.stores.notifications.update(id, |notification| {
            notification.mark_failed(reason)?;
            Ok(notification.clone())
        })?;
        info!(id, reason, "Notification delivery failed");
        Ok(failed)
    }

    /// One NORMAL reminder per slot of every active medication, for
    /// tomorrow.
    pub fn schedule_medication_reminders(
        &self,
        patient_id: u64,
        now: NaiveDateTime,
    ) -> CareResult<Vec<Notification>> {
        self.stores.patients.require(patient_id)?;
        let tomorrow = (now + Duration::days(1)).date();
        let medications = self
            .stores
            .medications
            .find(|m| m.patient_id() == Some(patient_id) && m.is_active());

        let mut scheduled = Vec::new();
        for medication in &medications {
            for time in medication.schedule_times() {
                let at = schedule::slot_on(tomorrow, time)?;
                let reminder = MedicationReminder::for_medication(medication)?;
                scheduled.push(self.save(Notification::medication(
                    patient_id,
                    reminder,
                    Some(at),
                    Priority::Normal,
                    now,
                ))?);
            }
        }
        info!(patient_id, count = scheduled.len(), "Medication reminders scheduled");
        Ok(scheduled)
    }

    pub fn by_type(&self, notification_type: &str) -> Vec<Notification> {
        let wanted = notification_type.trim().to_uppercase();
        self.stores
            .notifications
            .find(|n| n.notification_type() == wanted)
    }

    pub fn by_priority(&self, priority: &str) -> CareResult<Vec<Notification>> {
        let priority: Priority = priority.parse()?;
        Ok(self
            .stores
            .notifications
            .find(|n| n.priority() == priority))
    }

    pub fn high_priority(&self) -> Vec<Notification> {
        self.stores.notifications.find(Notification::is_high_priority)
    }

    pub fn urgent(&self) -> Vec<Notification> {
        self.stores.notifications.find(Notification::is_urgent)
    }

    pub fn statistics(&self, now: NaiveDateTime) -> NotificationStatistics {
        let all = self.list();
        let total = all.len();
        let sent = all.iter().filter(|n| n.is_sent()).count();

        NotificationStatistics {
            total_notifications: total,
            sent_notifications: sent,
            pending_notifications: total - sent,
            due_notifications: all.iter().filter(|n| !n.is_sent() && n.is_due(now)).count(),
            overdue_notifications: all.iter().filter(|n| n.is_overdue(now)).count(),
            type_distribution: distribution(&all, |n| n.notification_type().to_string()),
            priority_distribution: distribution(&all, |n| n.priority().to_string()),
            status_distribution: distribution(&all, |n| n.delivery_status().to_string()),
            sent_percentage: if total == 0 {
                0.0
            } else {
                sent as f64 / total as f64 * 100.0
            },
        }
    }
}
