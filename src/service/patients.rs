use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{distribution, normalized_query};
use crate::care::{adherence, AdherenceStatus, HealthRecord, Medication, Patient};
use crate::error::CareResult;
use crate::storage::{CareStores, Entity};

/// Partial update; absent fields are left alone, an empty email or phone
/// clears it.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientChanges {
    pub name: Option<String>,
    pub condition: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PatientChanges {
    fn apply(&self, patient: &mut Patient) -> CareResult<()> {
        if let Some(name) = &self.name {
            patient.set_name(name)?;
        }
        if let Some(condition) = &self.condition {
            patient.set_condition(condition)?;
        }
        if let Some(email) = &self.email {
            patient.set_email(Some(email))?;
        }
        if let Some(phone) = &self.phone {
            patient.set_phone(Some(phone))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceSummary {
    pub patient_id: u64,
    pub patient_name: String,
    pub condition: String,
    pub overall_adherence: f64,
    pub adherence_percentage: String,
    pub active_medications: usize,
    pub total_medications: usize,
    pub status: AdherenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStatistics {
    pub total_patients: usize,
    pub condition_distribution: BTreeMap<String, usize>,
    pub average_adherence: f64,
    pub average_adherence_percentage: String,
    pub total_active_medications: usize,
    pub total_medications: usize,
    pub average_medications_per_patient: f64,
    pub patients_with_excellent_adherence: usize,
    pub patients_with_poor_adherence: usize,
}

#[derive(Debug, Clone)]
pub struct PatientService {
    stores: Arc<CareStores>,
}

impl PatientService {
    pub fn new(stores: Arc<CareStores>) -> Self {
        PatientService { stores }
    }

    pub fn list(&self) -> Vec<Patient> {
        self.stores.patients.list()
    }

    pub fn get(&self, id: u64) -> Option<Patient> {
        self.stores.patients.get(id)
    }

    /// Inserts a new patient, or for a stored one replaces the profile
    /// fields only. Medication and record links are owned by the store.
    pub fn save(&self, patient: Patient) -> CareResult<Patient> {
        patient.validate()?;
        let existing = patient.id().filter(|id| self.stores.patients.contains(*id));
        let saved = match existing {
            Some(id) => self.stores.patients.update(id, |stored| {
                stored.copy_profile(&patient);
                Ok(stored.clone())
            })?,
            None => self.stores.patients.save(patient),
        };
        info!(id = ?saved.id(), name = saved.name(), "Patient saved");
        Ok(saved)
    }

    pub fn update(&self, id: u64, changes: &PatientChanges) -> CareResult<Patient> {
        let updated = self.stores.patients.update(id, |patient| {
            changes.apply(patient)?;
            Ok(patient.clone())
        })?;
        info!(id, "Patient updated");
        Ok(updated)
    }

    /// Removes the patient along with everything they own. Returns false
    /// when there was no such patient.
    pub fn delete(&self, id: u64) -> bool {
        let Some(patient) = self.stores.patients.remove(id) else {
            return false;
        };

        let medications = self
            .stores
            .medications
            .remove_where(|m| m.patient_id() == Some(id));
        let notifications = self
            .stores
            .notifications
            .remove_where(|n| n.patient_id() == id);
        let records = self.stores.records.remove_where(|r| r.patient_id() == id);

        info!(
            id,
            name = patient.name(),
            medications,
            notifications,
            records,
            "Patient deleted"
        );
        true
    }

    pub fn search(&self, query: &str) -> Vec<Patient> {
        match normalized_query(query) {
            None => self.list(),
            Some(query) => self.stores.patients.find(|p| p.matches(&query)),
        }
    }

    pub fn by_condition(&self, condition: &str) -> Vec<Patient> {
        match normalized_query(condition) {
            None => Vec::new(),
            Some(condition) => self
                .stores
                .patients
                .find(|p| p.condition().to_lowercase().contains(&condition)),
        }
    }

    fn medications_of(&self, id: u64) -> Vec<Medication> {
        self.stores
            .medications
            .find(|m| m.patient_id() == Some(id))
    }

    fn adherence_of(medications: &[Medication]) -> f64 {
        adherence::overall_adherence(medications.iter().map(Medication::adherence_rate))
    }

    /// Mean adherence over every medication the patient owns.
    pub fn overall_adherence(&self, id: u64) -> CareResult<f64> {
        self.stores.patients.require(id)?;
        Ok(Self::adherence_of(&self.medications_of(id)))
    }

    pub fn adherence_summary(&self, id: u64) -> CareResult<AdherenceSummary> {
        let patient = self.stores.patients.require(id)?;
        let medications = self.medications_of(id);
        let overall = Self::adherence_of(&medications);

        Ok(AdherenceSummary {
            patient_id: id,
            patient_name: patient.name().to_string(),
            condition: patient.condition().to_string(),
            overall_adherence: overall,
            adherence_percentage: adherence::format_percentage(overall),
            active_medications: medications.iter().filter(|m| m.is_active()).count(),
            total_medications: medications.len(),
            status: AdherenceStatus::from_rate(overall),
        })
    }

    fn with_overall(&self) -> Vec<(Patient, Vec<Medication>, f64)> {
        self.list()
            .into_iter()
            .map(|patient| {
                let medications = patient
                    .id()
                    .map(|id| self.medications_of(id))
                    .unwrap_or_default();
                let overall = Self::adherence_of(&medications);
                (patient, medications, overall)
            })
            .collect()
    }

    /// Patients below the fair band, including those with no medications.
    pub fn with_poor_adherence(&self) -> Vec<Patient> {
        self.with_overall()
            .into_iter()
            .filter(|(_, _, overall)| adherence::is_poor(*overall))
            .map(|(patient, _, _)| patient)
            .collect()
    }

    pub fn with_excellent_adherence(&self) -> Vec<Patient> {
        self.with_overall()
            .into_iter()
            .filter(|(_, _, overall)| adherence::is_excellent(*overall))
            .map(|(patient, _, _)| patient)
            .collect()
    }

    pub fn requiring_attention(&self) -> Vec<Patient> {
        self.with_overall()
            .into_iter()
            .filter(|(_, medications, overall)| medications.is_empty() || adherence::is_poor(*overall))
            .map(|(patient, _, _)| patient)
            .collect()
    }

    pub fn health_records(&self, id: u64) -> CareResult<Vec<HealthRecord>> {
        self.stores.patients.require(id)?;
        Ok(self.stores.records.find(|r| r.patient_id() == id))
    }

    pub fn statistics(&self) -> PatientStatistics {
        let patients = self.with_overall();
        let total = patients.len();

        let condition_distribution = distribution(
            patients
                .iter()
                .flat_map(|(patient, _, _)| patient.conditions().map(str::to_string))
                .collect::<Vec<_>>(),
            |condition| condition,
        );

        let average = if total == 0 {
            0.0
        } else {
            patients.iter().map(|(_, _, overall)| overall).sum::<f64>() / total as f64
        };
        let total_medications: usize = patients.iter().map(|(_, meds, _)| meds.len()).sum();
        let total_active_medications: usize = patients
            .iter()
            .map(|(_, meds, _)| meds.iter().filter(|m| m.is_active()).count())
            .sum();

        PatientStatistics {
            total_patients: total,
            condition_distribution,
            average_adherence: average,
            average_adherence_percentage: adherence::format_percentage(average),
            total_active_medications,
            total_medications,
            average_medications_per_patient: if total == 0 {
                0.0
            } else {
                total_medications as f64 / total as f64
            },
            patients_with_excellent_adherence: patients
                .iter()
                .filter(|(_, _, overall)| adherence::is_excellent(*overall))
                .count(),
            patients_with_poor_adherence: patients
                .iter()
                .filter(|(_, _, overall)| adherence::is_poor(*overall))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::{Notification, Priority};
    use crate::care::notification::MedicationReminder;
    use crate::error::CareError;
    use crate::service::CareServices;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn services() -> CareServices {
        CareServices::new(Arc::new(CareStores::new()))
    }

    fn add_medication(services: &CareServices, patient_id: u64, name: &str, taken: u32, missed: u32) {
        let medication = Medication::new(name, "10mg", 1, "", now())
            .unwrap()
            .with_dose_history(taken, missed);
        services
            .medications
            .create_for_patient(patient_id, medication)
            .unwrap();
    }

    #[test]
    fn test_save_assigns_id_and_search_is_case_insensitive() {
        let services = services();
        let sarah = services
            .patients
            .save(Patient::new("Sarah Johnson", "Diabetes Type 2, Hypertension").unwrap())
            .unwrap();
        services
            .patients
            .save(Patient::new("Michael Chen", "Asthma").unwrap())
            .unwrap();

        assert_eq!(sarah.id(), Some(1));
        let found = services.patients.search("HYPERTENSION");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Sarah Johnson");
        assert_eq!(services.patients.search("").len(), 2);
        assert_eq!(services.patients.by_condition("asthma").len(), 1);
        assert!(services.patients.by_condition(" ").is_empty());
    }

    #[test]
    fn test_stale_save_keeps_links() {
        let services = services();
        services
            .patients
            .save(Patient::new("Sarah", "Asthma").unwrap())
            .unwrap();
        let mut snapshot = services.patients.get(1).unwrap();

        add_medication(&services, 1, "Albuterol", 0, 0);
        services.medications.take(1, now()).unwrap();

        snapshot.set_name("Sarah Johnson").unwrap();
        let saved = services.patients.save(snapshot).unwrap();
        assert_eq!(saved.name(), "Sarah Johnson");
        assert_eq!(saved.medication_ids(), &[1]);
        assert_eq!(saved.health_record_ids(), &[1]);

        let stored = services.patients.get(1).unwrap();
        assert_eq!(stored, saved);
        assert_eq!(services.medications.get(1).unwrap().patient_id(), Some(1));
    }

    #[test]
    fn test_failed_update_keeps_stored_patient() {
        let services = services();
        services
            .patients
            .save(Patient::new("Sarah", "Asthma").unwrap())
            .unwrap();

        let changes = PatientChanges {
            name: Some("Sarah J".to_string()),
            email: Some("broken".to_string()),
            ..PatientChanges::default()
        };
        assert!(matches!(
            services.patients.update(1, &changes),
            Err(CareError::Validation(_))
        ));
        assert_eq!(services.patients.get(1).unwrap().name(), "Sarah");

        assert_eq!(
            services.patients.update(9, &PatientChanges::default()),
            Err(CareError::not_found("Patient", 9))
        );
    }

    #[test]
    fn test_adherence_summary_averages_medications() {
        let services = services();
        services
            .patients
            .save(Patient::new("Sarah", "Diabetes").unwrap())
            .unwrap();
        add_medication(&services, 1, "Aspirin", 9, 1);
        add_medication(&services, 1, "Metformin", 5, 5);

        let summary = services.patients.adherence_summary(1).unwrap();
        assert!((summary.overall_adherence - 0.7).abs() < 1e-9);
        assert_eq!(summary.adherence_percentage, "70.0%");
        assert_eq!(summary.status, AdherenceStatus::Fair);
        assert_eq!(summary.total_medications, 2);
        assert_eq!(services.patients.overall_adherence(2), Err(CareError::not_found("Patient", 2)));
    }

    #[test]
    fn test_attention_lists() {
        let services = services();
        for name in ["Good", "Poor", "Empty"] {
            services
                .patients
                .save(Patient::new(name, "Asthma").unwrap())
                .unwrap();
        }
        add_medication(&services, 1, "Aspirin", 10, 0);
        add_medication(&services, 2, "Aspirin", 1, 9);

        let names = |patients: Vec<Patient>| -> Vec<String> {
            patients.iter().map(|p| p.name().to_string()).collect()
        };
        assert_eq!(names(services.patients.with_excellent_adherence()), vec!["Good"]);
        assert_eq!(names(services.patients.with_poor_adherence()), vec!["Poor", "Empty"]);
        assert_eq!(names(services.patients.requiring_attention()), vec!["Poor", "Empty"]);
    }

    #[test]
    fn test_delete_cascades_to_owned_entities() {
        let services = services();
        services
            .patients
            .save(Patient::new("Sarah", "Diabetes").unwrap())
            .unwrap();
        services
            .patients
            .save(Patient::new("Michael", "Asthma").unwrap())
            .unwrap();
        add_medication(&services, 1, "Metformin", 0, 0);
        add_medication(&services, 2, "Albuterol", 0, 0);
        services.medications.take(1, now()).unwrap();
        services
            .notifications
            .create_medication_reminder(
                1,
                MedicationReminder::new("Metformin", "500mg").unwrap(),
                None,
                Priority::Normal,
                now(),
            )
            .unwrap();

        assert!(services.patients.delete(1));
        assert!(!services.patients.delete(1));
        assert_eq!(services.medications.list().len(), 1);
        assert!(services
            .notifications
            .list()
            .iter()
            .all(|n: &Notification| n.patient_id() != 1));
        assert!(services.patients.health_records(1).is_err());
        assert_eq!(services.patients.list().len(), 1);
    }

    #[test]
    fn test_statistics() {
        let services = services();
        services
            .patients
            .save(Patient::new("Sarah", "Diabetes Type 2, Hypertension").unwrap())
            .unwrap();
        services
            .patients
            .save(Patient::new("Michael", "Asthma, Hypertension").unwrap())
            .unwrap();
        add_medication(&services, 1, "Aspirin", 9, 1);
        add_medication(&services, 1, "Lisinopril", 10, 0);

        let stats = services.patients.statistics();
        assert_eq!(stats.total_patients, 2);
        assert_eq!(stats.condition_distribution.get("Hypertension"), Some(&2));
        assert_eq!(stats.condition_distribution.get("Asthma"), Some(&1));
        assert_eq!(stats.total_medications, 2);
        assert_eq!(stats.average_medications_per_patient, 1.0);
        assert_eq!(stats.patients_with_excellent_adherence, 1);
        assert_eq!(stats.patients_with_poor_adherence, 1);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = services().patients.statistics();
        assert_eq!(stats.total_patients, 0);
        assert_eq!(stats.average_adherence, 0.0);
        assert_eq!(stats.average_adherence_percentage, "0.0%");
        assert_eq!(stats.average_medications_per_patient, 0.0);
    }
}
