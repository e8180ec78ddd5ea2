use chrono::NaiveDateTime;
use serde::Serialize;

use super::adherence::{self, AdherenceStatus};
use super::{required, schedule};
use crate::error::CareResult;
use crate::storage::Entity;

/// A prescribed medication with its dose counters and daily schedule.
///
/// `total_doses_recorded` always equals `doses_taken + doses_missed`; the
/// counters only move through [`Medication::record_dose_taken`] and
/// [`Medication::record_dose_missed`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    id: Option<u64>,
    patient_id: Option<u64>,
    name: String,
    dosage: String,
    frequency_per_day: u32,
    instructions: String,
    doses_taken: u32,
    doses_missed: u32,
    total_doses_recorded: u32,
    active: bool,
    created_at: NaiveDateTime,
    last_taken: Option<NaiveDateTime>,
    #[serde(skip)]
    schedule: Vec<String>,
}

impl Medication {
    pub fn new(
        name: &str,
        dosage: &str,
        frequency_per_day: u32,
        instructions: &str,
        created_at: NaiveDateTime,
    ) -> CareResult<Self> {
        let schedule = schedule::schedule_times(frequency_per_day)?;
        Ok(Medication {
            id: None,
            patient_id: None,
            name: required(name, "Medication name cannot be empty")?,
            dosage: required(dosage, "Dosage cannot be empty")?,
            frequency_per_day,
            instructions: instructions.trim().to_string(),
            doses_taken: 0,
            doses_missed: 0,
            total_doses_recorded: 0,
            active: true,
            created_at,
            last_taken: None,
            schedule,
        })
    }

    /// Seeds the counters from an existing dose history.
    pub fn with_dose_history(mut self, taken: u32, missed: u32) -> Self {
        self.doses_taken = taken;
        self.doses_missed = missed;
        self.total_doses_recorded = taken + missed;
        self
    }

    pub fn set_name(&mut self, name: &str) -> CareResult<()> {
        self.name = required(name, "Medication name cannot be empty")?;
        Ok(())
    }

    pub fn set_dosage(&mut self, dosage: &str) -> CareResult<()> {
        self.dosage = required(dosage, "Dosage cannot be empty")?;
        Ok(())
    }

    pub fn set_frequency_per_day(&mut self, frequency_per_day: u32) -> CareResult<()> {
        self.schedule = schedule::schedule_times(frequency_per_day)?;
        self.frequency_per_day = frequency_per_day;
        Ok(())
    }

    pub fn set_instructions(&mut self, instructions: &str) {
        self.instructions = instructions.trim().to_string();
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_patient(&mut self, patient_id: Option<u64>) {
        self.patient_id = patient_id;
    }

    pub fn validate(&self) -> CareResult<()> {
        required(&self.name, "Medication name cannot be empty")?;
        required(&self.dosage, "Medication dosage cannot be empty")?;
        schedule::validate_frequency(self.frequency_per_day)?;
        Ok(())
    }

    pub fn record_dose_taken(&mut self, at: NaiveDateTime) {
        self.doses_taken += 1;
        self.total_doses_recorded += 1;
        self.last_taken = Some(at);
    }

    pub fn record_dose_missed(&mut self) {
        self.doses_missed += 1;
        self.total_doses_recorded += 1;
    }

    pub fn adherence_rate(&self) -> f64 {
        adherence::adherence_rate(self.doses_taken, self.doses_missed)
    }

    pub fn adherence_percentage(&self) -> String {
        adherence::format_percentage(self.adherence_rate())
    }

    pub fn adherence_status(&self) -> AdherenceStatus {
        AdherenceStatus::from_rate(self.adherence_rate())
    }

    pub fn is_due_soon(&self, now: NaiveDateTime) -> bool {
        schedule::is_due_soon(self.frequency_per_day, self.last_taken, now)
    }

    pub fn next_scheduled_time(&self) -> String {
        schedule::next_scheduled_time(&self.schedule)
    }

    pub fn schedule_times(&self) -> &[String] {
        &self.schedule
    }

    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.dosage.to_lowercase().contains(query)
            || self.instructions.to_lowercase().contains(query)
    }

    pub fn patient_id(&self) -> Option<u64> {
        self.patient_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dosage(&self) -> &str {
        &self.dosage
    }

    pub fn frequency_per_day(&self) -> u32 {
        self.frequency_per_day
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn doses_taken(&self) -> u32 {
        self.doses_taken
    }

    pub fn doses_missed(&self) -> u32 {
        self.doses_missed
    }

    pub fn total_doses_recorded(&self) -> u32 {
        self.total_doses_recorded
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn last_taken(&self) -> Option<NaiveDateTime> {
        self.last_taken
    }
}

impl Entity for Medication {
    const KIND: &'static str = "Medication";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}
