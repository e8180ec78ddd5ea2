//! Sample data loaded at startup when `sample_data` is enabled.

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::care::notification::{AppointmentReminder, MedicationReminder};
use crate::care::{Medication, Patient, Priority};
use crate::error::{CareError, CareResult};
use crate::service::CareServices;
use crate::storage::Entity;

/// How many entities of each kind were created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub patients: usize,
    pub medications: usize,
    pub notifications: usize,
}

struct SampleMedication {
    name: &'static str,
    dosage: &'static str,
    frequency: u32,
    instructions: &'static str,
    taken: u32,
    missed: u32,
}

const SARAH_MEDICATIONS: &[SampleMedication] = &[
    SampleMedication {
        name: "Metformin",
        dosage: "500mg",
        frequency: 2,
        instructions: "Take with meals to reduce stomach upset",
        taken: 14,
        missed: 7,
    },
    SampleMedication {
        name: "Lisinopril",
        dosage: "10mg",
        frequency: 1,
        instructions: "Take at the same time each day",
        taken: 10,
        missed: 0,
    },
    SampleMedication {
        name: "Aspirin",
        dosage: "81mg",
        frequency: 1,
        instructions: "Take with food to prevent stomach irritation",
        taken: 9,
        missed: 1,
    },
];

const MICHAEL_MEDICATIONS: &[SampleMedication] = &[
    SampleMedication {
        name: "Albuterol",
        dosage: "90mcg",
        frequency: 4,
        instructions: "Use as needed for breathing difficulties",
        taken: 8,
        missed: 2,
    },
    SampleMedication {
        name: "Atorvastatin",
        dosage: "20mg",
        frequency: 1,
        instructions: "Take in the evening",
        taken: 7,
        missed: 3,
    },
];

fn saved_id<T: Entity>(entity: &T) -> CareResult<u64> {
    entity
        .id()
        .ok_or_else(|| CareError::state(format!("{} was saved without an id", T::KIND)))
}

fn add_patient(
    services: &CareServices,
    name: &str,
    condition: &str,
    email: &str,
    phone: &str,
) -> CareResult<u64> {
    let patient = Patient::new(name, condition)?.with_contact(Some(email), Some(phone))?;
    saved_id(&services.patients.save(patient)?)
}

fn add_medications(
    services: &CareServices,
    patient_id: u64,
    samples: &[SampleMedication],
    now: NaiveDateTime,
) -> CareResult<usize> {
    for sample in samples {
        let medication = Medication::new(
            sample.name,
            sample.dosage,
            sample.frequency,
            sample.instructions,
            now,
        )?
        .with_dose_history(sample.taken, sample.missed);
        services.medications.create_for_patient(patient_id, medication)?;
    }
    Ok(samples.len())
}

fn add_medication_reminder(
    services: &CareServices,
    patient_id: u64,
    name: &str,
    dosage: &str,
    scheduled_at: NaiveDateTime,
    priority: Priority,
    now: NaiveDateTime,
) -> CareResult<()> {
    services.notifications.create_medication_reminder(
        patient_id,
        MedicationReminder::new(name, dosage)?,
        Some(scheduled_at),
        priority,
        now,
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add_appointment(
    services: &CareServices,
    patient_id: u64,
    doctor: &str,
    location: &str,
    kind: &str,
    appointment_time: NaiveDateTime,
    lead_hours: u32,
    minutes: u32,
    now: NaiveDateTime,
) -> CareResult<()> {
    let reminder = AppointmentReminder::new(
        doctor,
        location,
        Some(kind),
        Some(appointment_time),
        lead_hours,
        minutes,
    )?;
    services
        .notifications
        .create_appointment_reminder(patient_id, reminder, None, now)?;
    Ok(())
}

/// Three patients, five medications with dose history, and five reminders
/// timed relative to `now`.
pub fn load_sample_data(services: &CareServices, now: NaiveDateTime) -> CareResult<SeedSummary> {
    let sarah = add_patient(
        services,
        "Sarah Johnson",
        "Diabetes Type 2, Hypertension",
        "sarah.johnson@email.com",
        "+1-555-555-0123",
    )?;
    let michael = add_patient(
        services,
        "Michael Chen",
        "Asthma, High Cholesterol",
        "michael.chen@email.com",
        "+1-555-555-0124",
    )?;
    add_patient(
        services,
        "Emily Rodriguez",
        "Rheumatoid Arthritis",
        "emily.rodriguez@email.com",
        "+1-555-555-0125",
    )?;

    let mut medications = add_medications(services, sarah, SARAH_MEDICATIONS, now)?;
    medications += add_medications(services, michael, MICHAEL_MEDICATIONS, now)?;

    add_medication_reminder(
        services,
        sarah,
        "Metformin",
        "500mg",
        now + Duration::hours(1),
        Priority::Normal,
        now,
    )?;
    add_medication_reminder(
        services,
        sarah,
        "Lisinopril",
        "10mg",
        now + Duration::minutes(30),
        Priority::High,
        now,
    )?;
    add_appointment(
        services,
        sarah,
        "Smith",
        "Main Street Medical Center",
        "Regular Checkup",
        now + Duration::days(1),
        24,
        30,
        now,
    )?;
    add_medication_reminder(
        services,
        michael,
        "Albuterol",
        "90mcg",
        now + Duration::hours(2),
        Priority::High,
        now,
    )?;
    add_appointment(
        services,
        michael,
        "Johnson",
        "Pulmonology Clinic",
        "Asthma Follow-up",
        now + Duration::days(3),
        48,
        45,
        now,
    )?;

    let summary = SeedSummary {
        patients: 3,
        medications,
        notifications: 5,
    };
    info!(
        patients = summary.patients,
        medications = summary.medications,
        notifications = summary.notifications,
        "Sample data loaded"
    );
    Ok(summary)
}
