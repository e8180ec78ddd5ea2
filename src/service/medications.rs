use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{distribution, normalized_query};
use crate::care::{
    adherence, schedule, AdherenceStatus, HealthRecord, Medication, MedicationRecord, RecordKind,
};
use crate::error::{CareError, CareResult};
use crate::storage::{CareStores, Entity};

const NOTHING_DUE: &str = "No medications due soon";

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationChanges {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency_per_day: Option<u32>,
    pub instructions: Option<String>,
    pub active: Option<bool>,
}

impl MedicationChanges {
    fn apply(&self, medication: &mut Medication) -> CareResult<()> {
        if let Some(name) = &self.name {
            medication.set_name(name)?;
        }
        if let Some(dosage) = &self.dosage {
            medication.set_dosage(dosage)?;
        }
        if let Some(frequency) = self.frequency_per_day {
            medication.set_frequency_per_day(frequency)?;
        }
        if let Some(instructions) = &self.instructions {
            medication.set_instructions(instructions);
        }
        if let Some(active) = self.active {
            medication.set_active(active);
        }
        Ok(())
    }
}

/// Adherence figures after a dose was taken or missed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseOutcome {
    pub medication_id: u64,
    pub medication_name: String,
    pub dosage: String,
    pub doses_taken: u32,
    pub doses_missed: u32,
    pub adherence_rate: f64,
    pub adherence_percentage: String,
    pub adherence_status: AdherenceStatus,
    pub record_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationAdherence {
    pub medication_id: u64,
    pub medication_name: String,
    pub dosage: String,
    pub doses_taken: u32,
    pub doses_missed: u32,
    pub total_doses: u32,
    pub adherence_rate: f64,
    pub adherence_percentage: String,
    pub adherence_status: AdherenceStatus,
    pub is_due_soon: bool,
    pub next_scheduled_time: String,
    pub schedule_times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMedication {
    pub medication_id: u64,
    pub name: String,
    pub dosage: String,
    pub frequency: u32,
    pub times: Vec<String>,
    pub next_due: String,
    pub is_due_soon: bool,
    pub adherence: f64,
    pub adherence_status: AdherenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMedication {
    pub medication_id: u64,
    pub name: String,
    pub dosage: String,
    pub instructions: String,
    pub is_due_soon: bool,
    pub adherence_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub time: String,
    pub medications: Vec<SlotMedication>,
}

/// A patient's active medications, per medication and per time of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSchedule {
    pub patient_id: u64,
    pub patient_name: String,
    pub total_active_medications: usize,
    pub overall_adherence: f64,
    pub medications: Vec<ScheduledMedication>,
    pub time_slots: Vec<TimeSlot>,
    pub next_due: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationStatistics {
    pub total_medications: usize,
    pub active_medications: usize,
    pub inactive_medications: usize,
    pub medication_distribution: BTreeMap<String, usize>,
    pub frequency_distribution: BTreeMap<u32, usize>,
    pub average_adherence: f64,
    pub average_adherence_percentage: String,
    pub total_doses_taken: u64,
    pub total_doses_missed: u64,
    pub total_doses_recorded: u64,
    pub medications_with_excellent_adherence: usize,
    pub medications_with_poor_adherence: usize,
}

#[derive(Debug, Clone)]
pub struct MedicationService {
    stores: Arc<CareStores>,
}

impl MedicationService {
    pub fn new(stores: Arc<CareStores>) -> Self {
        MedicationService { stores }
    }

    pub fn list(&self) -> Vec<Medication> {
        self.stores.medications.list()
    }

    pub fn get(&self, id: u64) -> Option<Medication> {
        self.stores.medications.get(id)
    }

    fn require(&self, id: u64) -> CareResult<Medication> {
        self.stores.medications.require(id)
    }

    /// Stores a medication that already belongs to an existing patient.
    /// Re-saving under a different patient moves it off the previous owner.
    pub fn save(&self, medication: Medication) -> CareResult<Medication> {
        medication.validate()?;
        let patient_id = medication.patient_id().ok_or_else(|| {
            CareError::validation("Medication must be associated with a patient")
        })?;
        self.stores.patients.require(patient_id)?;

        let previous_owner = medication
            .id()
            .and_then(|id| self.stores.medications.get(id))
            .and_then(|stored| stored.patient_id())
            .filter(|owner| *owner != patient_id);

        let saved = self.stores.medications.save(medication);
        if let Some(id) = saved.id() {
            if let Some(previous) = previous_owner {
                let detached = self.stores.patients.update(previous, |patient| {
                    patient.detach_medication(id);
                    Ok(())
                });
                if let Err(err) = detached {
                    warn!(id, previous, %err, "Previous owner missing while moving medication");
                }
            }
            self.stores.patients.update(patient_id, |patient| {
                patient.attach_medication(id);
                Ok(())
            })?;
        }
        info!(id = ?saved.id(), name = saved.name(), patient_id, "Medication saved");
        Ok(saved)
    }

    pub fn create_for_patient(&self, patient_id: u64, mut medication: Medication) -> CareResult<Medication> {
        medication.set_patient(Some(patient_id));
        self.save(medication)
    }

    pub fn list_for_patient(&self, patient_id: u64) -> CareResult<Vec<Medication>> {
        self.stores.patients.require(patient_id)?;
        Ok(self
            .stores
            .medications
            .find(|m| m.patient_id() == Some(patient_id)))
    }

    pub fn update(&self, id: u64, changes: &MedicationChanges) -> CareResult<Medication> {
        let updated = self.stores.medications.update(id, |medication| {
            changes.apply(medication)?;
            Ok(medication.clone())
        })?;
        info!(id, name = updated.name(), "Medication updated");
        Ok(updated)
    }

    /// Removes the medication and unlinks it from its patient. Returns false
    /// when there was no such medication.
    pub fn delete(&self, id: u64) -> bool {
        let Some(medication) = self.stores.medications.remove(id) else {
            return false;
        };
        if let Some(patient_id) = medication.patient_id() {
            let unlinked = self.stores.patients.update(patient_id, |patient| {
                patient.detach_medication(id);
                Ok(())
            });
            if let Err(err) = unlinked {
                warn!(id, patient_id, %err, "Deleted medication had no owning patient");
            }
        }
        info!(id, name = medication.name(), "Medication deleted");
        true
    }

    pub fn search(&self, query: &str) -> Vec<Medication> {
        match normalized_query(query) {
            None => self.list(),
            Some(query) => self.stores.medications.find(|m| m.matches(&query)),
        }
    }

    pub fn active(&self) -> Vec<Medication> {
        self.stores.medications.find(Medication::is_active)
    }

    pub fn due_soon(&self, patient_id: u64, now: NaiveDateTime) -> CareResult<Vec<Medication>> {
        Ok(self
            .list_for_patient(patient_id)?
            .into_iter()
            .filter(|m| m.is_active() && m.is_due_soon(now))
            .collect())
    }

    pub fn with_poor_adherence(&self) -> Vec<Medication> {
        self.stores
            .medications
            .find(|m| adherence::is_poor(m.adherence_rate()))
    }

    pub fn with_excellent_adherence(&self) -> Vec<Medication> {
        self.stores
            .medications
            .find(|m| adherence::is_excellent(m.adherence_rate()))
    }

    /// Active medications that are poorly adhered to or due now.
    pub fn requiring_attention(&self, now: NaiveDateTime) -> Vec<Medication> {
        self.stores.medications.find(|m| {
            m.is_active() && (adherence::is_poor(m.adherence_rate()) || m.is_due_soon(now))
        })
    }

    /// Records a dose taken at `now` and files a health record for it.
    pub fn take(&self, id: u64, now: NaiveDateTime) -> CareResult<DoseOutcome> {
        let medication = self.stores.medications.update(id, |medication| {
            medication.record_dose_taken(now);
            Ok(medication.clone())
        })?;
        info!(id, name = medication.name(), "Dose taken");

        let record = MedicationRecord::taken(
            id,
            medication.name(),
            medication.dosage(),
            schedule::nearest_slot(medication.schedule_times(), now),
            now,
        );
        let record_id = self.file_record(&medication, record, now);
        Ok(Self::outcome(id, &medication, record_id))
    }

    /// Records a missed dose and files a health record carrying the reason.
    pub fn miss(&self, id: u64, reason: Option<&str>, now: NaiveDateTime) -> CareResult<DoseOutcome> {
        let medication = self.stores.medications.update(id, |medication| {
            medication.record_dose_missed();
            Ok(medication.clone())
        })?;
        info!(id, name = medication.name(), reason = reason.unwrap_or(""), "Dose missed");

        let record = MedicationRecord::missed(
            id,
            medication.name(),
            medication.dosage(),
            schedule::nearest_slot(medication.schedule_times(), now),
            reason,
        );
        let record_id = self.file_record(&medication, record, now);
        Ok(Self::outcome(id, &medication, record_id))
    }

    fn file_record(
        &self,
        medication: &Medication,
        record: MedicationRecord,
        now: NaiveDateTime,
    ) -> Option<u64> {
        let patient_id = medication.patient_id()?;
        let saved = self.stores.records.save(
            HealthRecord::new(patient_id, RecordKind::Medication(record), now),
        );
        let record_id = saved.id()?;

        let linked = self.stores.patients.update(patient_id, |patient| {
            patient.attach_health_record(record_id);
            Ok(())
        });
        if let Err(err) = linked {
            warn!(record_id, patient_id, %err, "Health record filed for a missing patient");
        }
        Some(record_id)
    }

    fn outcome(id: u64, medication: &Medication, record_id: Option<u64>) -> DoseOutcome {
        DoseOutcome {
            medication_id: id,
            medication_name: medication.name().to_string(),
            dosage: medication.dosage().to_string(),
            doses_taken: medication.doses_taken(),
            doses_missed: medication.doses_missed(),
            adherence_rate: medication.adherence_rate(),
            adherence_percentage: medication.adherence_percentage(),
            adherence_status: medication.adherence_status(),
            record_id,
        }
    }

    pub fn adherence(&self, id: u64, now: NaiveDateTime) -> CareResult<MedicationAdherence> {
        let medication = self.require(id)?;
        Ok(MedicationAdherence {
            medication_id: id,
            medication_name: medication.name().to_string(),
            dosage: medication.dosage().to_string(),
            doses_taken: medication.doses_taken(),
            doses_missed: medication.doses_missed(),
            total_doses: medication.total_doses_recorded(),
            adherence_rate: medication.adherence_rate(),
            adherence_percentage: medication.adherence_percentage(),
            adherence_status: medication.adherence_status(),
            is_due_soon: medication.is_due_soon(now),
            next_scheduled_time: medication.next_scheduled_time(),
            schedule_times: medication.schedule_times().to_vec(),
        })
    }

    pub fn schedule_for_patient(&self, patient_id: u64, now: NaiveDateTime) -> CareResult<PatientSchedule> {
        let patient = self.stores.patients.require(patient_id)?;
        let all = self.list_for_patient(patient_id)?;
        let overall = adherence::overall_adherence(all.iter().map(Medication::adherence_rate));
        let active: Vec<(u64, Medication)> = all
            .into_iter()
            .filter(Medication::is_active)
            .filter_map(|m| m.id().map(|id| (id, m)))
            .collect();

        let medications = active
            .iter()
            .map(|(id, m)| ScheduledMedication {
                medication_id: *id,
                name: m.name().to_string(),
                dosage: m.dosage().to_string(),
                frequency: m.frequency_per_day(),
                times: m.schedule_times().to_vec(),
                next_due: m.next_scheduled_time(),
                is_due_soon: m.is_due_soon(now),
                adherence: m.adherence_rate(),
                adherence_status: m.adherence_status(),
            })
            .collect();

        let mut slots: BTreeMap<&str, Vec<SlotMedication>> = BTreeMap::new();
        for (id, m) in &active {
            for time in m.schedule_times() {
                slots.entry(time.as_str()).or_default().push(SlotMedication {
                    medication_id: *id,
                    name: m.name().to_string(),
                    dosage: m.dosage().to_string(),
                    instructions: m.instructions().to_string(),
                    is_due_soon: m.is_due_soon(now),
                    adherence_rate: m.adherence_rate(),
                });
            }
        }
        let time_slots = slots
            .into_iter()
            .map(|(time, medications)| TimeSlot {
                time: time.to_string(),
                medications,
            })
            .collect();

        let next_due = active
            .iter()
            .find(|(_, m)| m.is_due_soon(now))
            .map(|(_, m)| format!("{} at {}", m.name(), m.next_scheduled_time()))
            .unwrap_or_else(|| NOTHING_DUE.to_string());

        Ok(PatientSchedule {
            patient_id,
            patient_name: patient.name().to_string(),
            total_active_medications: active.len(),
            overall_adherence: overall,
            medications,
            time_slots,
            next_due,
        })
    }

    pub fn statistics(&self) -> MedicationStatistics {
        let all = self.list();
        let total = all.len();
        let active = all.iter().filter(|m| m.is_active()).count();
        let average = adherence::overall_adherence(all.iter().map(Medication::adherence_rate));
        let taken: u64 = all.iter().map(|m| u64::from(m.doses_taken())).sum();
        let missed: u64 = all.iter().map(|m| u64::from(m.doses_missed())).sum();

        MedicationStatistics {
            total_medications: total,
            active_medications: active,
            inactive_medications: total - active,
            medication_distribution: distribution(&all, |m| m.name().to_string()),
            frequency_distribution: distribution(&all, Medication::frequency_per_day),
            average_adherence: average,
            average_adherence_percentage: adherence::format_percentage(average),
            total_doses_taken: taken,
            total_doses_missed: missed,
            total_doses_recorded: taken + missed,
            medications_with_excellent_adherence: all
                .iter()
                .filter(|m| adherence::is_excellent(m.adherence_rate()))
                .count(),
            medications_with_poor_adherence: all
                .iter()
                .filter(|m| adherence::is_poor(m.adherence_rate()))
                .count(),
        }
    }
}
