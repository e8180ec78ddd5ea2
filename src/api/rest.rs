use std::convert::Infallible;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;
use warp::filters::body::BodyDeserializeError;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use super::dto::{
    ApiResponse, FailureRequest, FollowUpRequest, HealthRecordView, MedicationView, MissQuery, NewAppointmentReminder,
    NewMedication, NewMedicationReminder, NewPatient, NotificationFilter, NotificationView,
    SearchQuery,
};
use crate::care;
use crate::error::{CareError, CareResult};
use crate::service::{CareServices, MedicationChanges, PatientChanges};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub type ApiReply = WithStatus<Json>;

fn envelope(
    status: StatusCode,
    outcome: &str,
    message: String,
    data: Option<serde_json::Value>,
) -> ApiReply {
    let response = ApiResponse {
        status: outcome.to_string(),
        message,
        data,
    };
    warp::reply::with_status(warp::reply::json(&response), status)
}

fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> ApiReply {
    match serde_json::to_value(data) {
        Ok(value) => envelope(status, "success", message.to_string(), Some(value)),
        Err(err) => {
            error!(%err, "Failed to serialize response");
            envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "Internal server error".to_string(),
                None,
            )
        }
    }
}

pub fn status_for(err: &CareError) -> StatusCode {
    match err {
        CareError::Validation(_) => StatusCode::BAD_REQUEST,
        CareError::NotFound { .. } => StatusCode::NOT_FOUND,
        CareError::State(_) => StatusCode::CONFLICT,
    }
}

fn failure(err: CareError) -> ApiReply {
    envelope(status_for(&err), "error", err.to_string(), None)
}

fn respond<T: Serialize>(result: CareResult<T>, message: &str) -> ApiReply {
    match result {
        Ok(data) => success(StatusCode::OK, message, data),
        Err(err) => failure(err),
    }
}

fn respond_created<T: Serialize>(result: CareResult<T>, message: &str) -> ApiReply {
    match result {
        Ok(data) => success(StatusCode::CREATED, message, data),
        Err(err) => failure(err),
    }
}

fn respond_found<T: Serialize>(found: Option<T>, kind: &'static str, id: u64) -> ApiReply {
    respond(
        found.ok_or_else(|| CareError::not_found(kind, id)),
        &format!("{} retrieved", kind),
    )
}

fn respond_deleted(found: bool, kind: &'static str, id: u64) -> ApiReply {
    if found {
        envelope(StatusCode::OK, "success", format!("{} deleted", kind), None)
    } else {
        failure(CareError::not_found(kind, id))
    }
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub async fn handle_rejection(err: Rejection) -> Result<ApiReply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Resource not found".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid query string: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON request body".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!(?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };
    Ok(envelope(status, "error", message, None))
}

#[derive(Clone)]
pub struct RestApi {
    services: CareServices,
}

impl RestApi {
    pub fn new(services: CareServices) -> Self {
        RestApi { services }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
        self.patient_routes()
            .or(self.medication_routes())
            .unify()
            .or(self.notification_routes())
            .unify()
            .recover(handle_rejection)
            .with(warp::trace::request())
    }

    fn with_services(&self) -> impl Filter<Extract = (CareServices,), Error = Infallible> + Clone {
        let services = self.services.clone();
        warp::any().map(move || services.clone())
    }

    fn patient_routes(&self) -> BoxedFilter<(ApiReply,)> {
        let list = warp::path!("api" / "patients")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| success(StatusCode::OK, "Patients retrieved", s.patients.list()));

        let create = warp::path!("api" / "patients")
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|s: CareServices, body: NewPatient| {
                respond_created(
                    body.into_patient().and_then(|p| s.patients.save(p)),
                    "Patient created",
                )
            });

        let search = warp::path!("api" / "patients" / "search")
            .and(warp::get())
            .and(self.with_services())
            .and(warp::query::<SearchQuery>())
            .map(|s: CareServices, q: SearchQuery| {
                success(StatusCode::OK, "Search results", s.patients.search(&q.query))
            });

        let statistics = warp::path!("api" / "patients" / "statistics")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(StatusCode::OK, "Patient statistics", s.patients.statistics())
            });

        let attention = warp::path!("api" / "patients" / "attention")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(
                    StatusCode::OK,
                    "Patients requiring attention",
                    s.patients.requiring_attention(),
                )
            });

        let poor = warp::path!("api" / "patients" / "adherence" / "poor")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(
                    StatusCode::OK,
                    "Patients with poor adherence",
                    s.patients.with_poor_adherence(),
                )
            });

        let excellent = warp::path!("api" / "patients" / "adherence" / "excellent")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(
                    StatusCode::OK,
                    "Patients with excellent adherence",
                    s.patients.with_excellent_adherence(),
                )
            });

        let by_condition = warp::path!("api" / "patients" / "condition" / String)
            .and(warp::get())
            .and(self.with_services())
            .map(|condition: String, s: CareServices| {
                success(
                    StatusCode::OK,
                    "Patients with condition",
                    s.patients.by_condition(&condition),
                )
            });

        let get = warp::path!("api" / "patients" / u64)
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| respond_found(s.patients.get(id), "Patient", id));

        let update = warp::path!("api" / "patients" / u64)
            .and(warp::put())
            .and(self.with_services())
            .and(json_body())
            .map(|id: u64, s: CareServices, changes: PatientChanges| {
                respond(s.patients.update(id, &changes), "Patient updated")
            });

        let delete = warp::path!("api" / "patients" / u64)
            .and(warp::delete())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| respond_deleted(s.patients.delete(id), "Patient", id));

        let adherence = warp::path!("api" / "patients" / u64 / "adherence")
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.patients.adherence_summary(id), "Adherence summary")
            });

        let records = warp::path!("api" / "patients" / u64 / "records")
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| match s.patients.health_records(id) {
                Ok(records) => success(
                    StatusCode::OK,
                    "Health records retrieved",
                    HealthRecordView::list(&records, care::now()),
                ),
                Err(err) => failure(err),
            });

        list.boxed().or(create.boxed())
            .unify()
            .or(search.boxed())
            .unify()
            .or(statistics.boxed())
            .unify()
            .or(attention.boxed())
            .unify()
            .or(poor.boxed())
            .unify()
            .or(excellent.boxed())
            .unify()
            .or(by_condition.boxed())
            .unify()
            .or(get.boxed())
            .unify()
            .or(update.boxed())
            .unify()
            .or(delete.boxed())
            .unify()
            .or(adherence.boxed())
            .unify()
            .or(records.boxed())
            .unify()
            .boxed()
    }

    fn medication_routes(&self) -> BoxedFilter<(ApiReply,)> {
        let for_patient = warp::path!("api" / "medications" / "patient" / u64)
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| match s.medications.list_for_patient(pid) {
                Ok(medications) => success(
                    StatusCode::OK,
                    "Medications retrieved",
                    MedicationView::list(&medications, care::now()),
                ),
                Err(err) => failure(err),
            });

        let create = warp::path!("api" / "medications" / "patient" / u64)
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|pid: u64, s: CareServices, body: NewMedication| {
                let now = care::now();
                let created = body
                    .into_medication(now)
                    .and_then(|m| s.medications.create_for_patient(pid, m));
                match created {
                    Ok(medication) => success(
                        StatusCode::CREATED,
                        "Medication created",
                        MedicationView::new(&medication, now),
                    ),
                    Err(err) => failure(err),
                }
            });

        let schedule = warp::path!("api" / "medications" / "patient" / u64 / "schedule")
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                respond(
                    s.medications.schedule_for_patient(pid, care::now()),
                    "Medication schedule",
                )
            });

        let due = warp::path!("api" / "medications" / "patient" / u64 / "due")
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                let now = care::now();
                match s.medications.due_soon(pid, now) {
                    Ok(medications) => success(
                        StatusCode::OK,
                        "Medications due soon",
                        MedicationView::list(&medications, now),
                    ),
                    Err(err) => failure(err),
                }
            });

        let search = warp::path!("api" / "medications" / "search")
            .and(warp::get())
            .and(self.with_services())
            .and(warp::query::<SearchQuery>())
            .map(|s: CareServices, q: SearchQuery| {
                let medications = s.medications.search(&q.query);
                success(
                    StatusCode::OK,
                    "Search results",
                    MedicationView::list(&medications, care::now()),
                )
            });

        let active = warp::path!("api" / "medications" / "active")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                let medications = s.medications.active();
                success(
                    StatusCode::OK,
                    "Active medications",
                    MedicationView::list(&medications, care::now()),
                )
            });

        let statistics = warp::path!("api" / "medications" / "statistics")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(StatusCode::OK, "Medication statistics", s.medications.statistics())
            });

        let attention = warp::path!("api" / "medications" / "attention")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                let now = care::now();
                let medications = s.medications.requiring_attention(now);
                success(
                    StatusCode::OK,
                    "Medications requiring attention",
                    MedicationView::list(&medications, now),
                )
            });

        let poor = warp::path!("api" / "medications" / "adherence" / "poor")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                let medications = s.medications.with_poor_adherence();
                success(
                    StatusCode::OK,
                    "Medications with poor adherence",
                    MedicationView::list(&medications, care::now()),
                )
            });

        let excellent = warp::path!("api" / "medications" / "adherence" / "excellent")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                let medications = s.medications.with_excellent_adherence();
                success(
                    StatusCode::OK,
                    "Medications with excellent adherence",
                    MedicationView::list(&medications, care::now()),
                )
            });

        let get = warp::path!("api" / "medications" / u64)
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| match s.medications.get(id) {
                Some(medication) => success(
                    StatusCode::OK,
                    "Medication retrieved",
                    MedicationView::new(&medication, care::now()),
                ),
                None => failure(CareError::not_found("Medication", id)),
            });

        let update = warp::path!("api" / "medications" / u64)
            .and(warp::put())
            .and(self.with_services())
            .and(json_body())
            .map(|id: u64, s: CareServices, changes: MedicationChanges| {
                match s.medications.update(id, &changes) {
                    Ok(medication) => success(
                        StatusCode::OK,
                        "Medication updated",
                        MedicationView::new(&medication, care::now()),
                    ),
                    Err(err) => failure(err),
                }
            });

        let delete = warp::path!("api" / "medications" / u64)
            .and(warp::delete())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond_deleted(s.medications.delete(id), "Medication", id)
            });

        let take = warp::path!("api" / "medications" / u64 / "take")
            .and(warp::post())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.medications.take(id, care::now()), "Medication taken successfully")
            });

        let miss = warp::path!("api" / "medications" / u64 / "miss")
            .and(warp::post())
            .and(self.with_services())
            .and(warp::query::<MissQuery>())
            .map(|id: u64, s: CareServices, q: MissQuery| {
                respond(
                    s.medications.miss(id, q.reason.as_deref(), care::now()),
                    "Medication marked as missed",
                )
            });

        let adherence = warp::path!("api" / "medications" / u64 / "adherence")
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.medications.adherence(id, care::now()), "Medication adherence")
            });

        for_patient.boxed()
            .or(create.boxed())
            .unify()
            .or(schedule.boxed())
            .unify()
            .or(due.boxed())
            .unify()
            .or(search.boxed())
            .unify()
            .or(active.boxed())
            .unify()
            .or(statistics.boxed())
            .unify()
            .or(attention.boxed())
            .unify()
            .or(poor.boxed())
            .unify()
            .or(excellent.boxed())
            .unify()
            .or(get.boxed())
            .unify()
            .or(update.boxed())
            .unify()
            .or(delete.boxed())
            .unify()
            .or(take.boxed())
            .unify()
            .or(miss.boxed())
            .unify()
            .or(adherence.boxed())
            .unify()
            .boxed()
    }

    fn notification_routes(&self) -> BoxedFilter<(ApiReply,)> {
        let list = warp::path!("api" / "notifications")
            .and(warp::get())
            .and(self.with_services())
            .and(warp::query::<NotificationFilter>())
            .map(|s: CareServices, filter: NotificationFilter| {
                let found = match (&filter.notification_type, &filter.priority) {
                    (_, Some(priority)) => s.notifications.by_priority(priority).map(|found| {
                        match &filter.notification_type {
                            Some(kind) => found
                                .into_iter()
                                .filter(|n| n.notification_type().eq_ignore_ascii_case(kind))
                                .collect(),
                            None => found,
                        }
                    }),
                    (Some(kind), None) => Ok(s.notifications.by_type(kind)),
                    (None, None) => Ok(s.notifications.list()),
                };
                match found {
                    Ok(notifications) => success(
                        StatusCode::OK,
                        "Notifications retrieved",
                        NotificationView::list(&notifications, care::now()),
                    ),
                    Err(err) => failure(err),
                }
            });

        let for_patient = warp::path!("api" / "notifications" / "patient" / u64)
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                views(s.notifications.list_for_patient(pid), "Notifications retrieved")
            });

        let pending = warp::path!("api" / "notifications" / "patient" / u64 / "pending")
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                views(s.notifications.pending_for_patient(pid), "Pending notifications")
            });

        let due = warp::path!("api" / "notifications" / "patient" / u64 / "due")
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                views(
                    s.notifications.due_for_patient(pid, care::now()),
                    "Due notifications",
                )
            });

        let overdue = warp::path!("api" / "notifications" / "patient" / u64 / "overdue")
            .and(warp::get())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                views(
                    s.notifications.overdue_for_patient(pid, care::now()),
                    "Overdue notifications",
                )
            });

        let send_due = warp::path!("api" / "notifications" / "patient" / u64 / "send-due")
            .and(warp::post())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                respond(s.notifications.send_due(pid, care::now()), "Due notifications sent")
            });

        let schedule = warp::path!("api" / "notifications" / "patient" / u64 / "schedule")
            .and(warp::post())
            .and(self.with_services())
            .map(|pid: u64, s: CareServices| {
                let now = care::now();
                match s.notifications.schedule_medication_reminders(pid, now) {
                    Ok(scheduled) => success(
                        StatusCode::CREATED,
                        "Medication reminders scheduled",
                        NotificationView::list(&scheduled, now),
                    ),
                    Err(err) => failure(err),
                }
            });

        let create_medication = warp::path!("api" / "notifications" / "medication")
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|s: CareServices, body: NewMedicationReminder| {
                let created = body.priority().and_then(|priority| {
                    s.notifications.create_medication_reminder(
                        body.patient_id,
                        body.reminder()?,
                        body.scheduled_time,
                        priority,
                        care::now(),
                    )
                });
                respond_created(created, "Medication notification created")
            });

        let create_appointment = warp::path!("api" / "notifications" / "appointment")
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|s: CareServices, body: NewAppointmentReminder| {
                let created = body.priority().and_then(|priority| {
                    s.notifications.create_appointment_reminder(
                        body.patient_id,
                        body.reminder()?,
                        priority,
                        care::now(),
                    )
                });
                respond_created(created, "Appointment notification created")
            });

        let statistics = warp::path!("api" / "notifications" / "statistics")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                success(
                    StatusCode::OK,
                    "Notification statistics",
                    s.notifications.statistics(care::now()),
                )
            });

        let high_priority = warp::path!("api" / "notifications" / "high-priority")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| {
                views(Ok(s.notifications.high_priority()), "High priority notifications")
            });

        let urgent = warp::path!("api" / "notifications" / "urgent")
            .and(warp::get())
            .and(self.with_services())
            .map(|s: CareServices| views(Ok(s.notifications.urgent()), "Urgent notifications"));

        let get = warp::path!("api" / "notifications" / u64)
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| match s.notifications.get(id) {
                Some(notification) => success(
                    StatusCode::OK,
                    "Notification retrieved",
                    NotificationView::new(&notification, care::now()),
                ),
                None => failure(CareError::not_found("Notification", id)),
            });

        let delete = warp::path!("api" / "notifications" / u64)
            .and(warp::delete())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond_deleted(s.notifications.delete(id), "Notification", id)
            });

        let content = warp::path!("api" / "notifications" / u64 / "content")
            .and(warp::get())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.notifications.content(id, care::now()), "Notification content")
            });

        let send = warp::path!("api" / "notifications" / u64 / "send")
            .and(warp::post())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.notifications.send(id, care::now()), "Notification sent")
            });

        let follow_up = warp::path!("api" / "notifications" / u64 / "follow-up")
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|id: u64, s: CareServices, body: FollowUpRequest| {
                respond_created(
                    s.notifications.follow_up(id, body.hours_before, care::now()),
                    "Follow-up reminder created",
                )
            });

        let delivered = warp::path!("api" / "notifications" / u64 / "delivered")
            .and(warp::post())
            .and(self.with_services())
            .map(|id: u64, s: CareServices| {
                respond(s.notifications.mark_delivered(id), "Notification marked delivered")
            });

        let failed = warp::path!("api" / "notifications" / u64 / "failed")
            .and(warp::post())
            .and(self.with_services())
            .and(json_body())
            .map(|id: u64, s: CareServices, body: FailureRequest| {
                respond(
                    s.notifications.mark_failed(id, &body.reason),
                    "Notification marked failed",
                )
            });

        list.boxed().or(for_patient.boxed())
            .unify()
            .or(pending.boxed())
            .unify()
            .or(due.boxed())
            .unify()
            .or(overdue.boxed())
            .unify()
            .or(send_due.boxed())
            .unify()
            .or(schedule.boxed())
            .unify()
            .or(create_medication.boxed())
            .unify()
            .or(create_appointment.boxed())
            .unify()
            .or(statistics.boxed())
            .unify()
            .or(high_priority.boxed())
            .unify()
            .or(urgent.boxed())
            .unify()
            .or(get.boxed())
            .unify()
            .or(delete.boxed())
            .unify()
            .or(content.boxed())
            .unify()
            .or(send.boxed())
            .unify()
            .or(follow_up.boxed())
            .unify()
            .or(delivered.boxed())
            .unify()
            .or(failed.boxed())
            .unify()
            .boxed()
    }
}

fn views(result: CareResult<Vec<care::Notification>>, message: &str) -> ApiReply {
    match result {
        Ok(notifications) => success(
            StatusCode::OK,
            message,
            NotificationView::list(&notifications, care::now()),
        ),
        Err(err) => failure(err),
    }
}
