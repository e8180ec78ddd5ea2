use serde::Serialize;

use super::required;
use crate::error::{CareError, CareResult};
use crate::storage::Entity;

const MIN_PHONE_DIGITS: usize = 10;

/// A patient and the ids of the medications and health records they own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    id: Option<u64>,
    name: String,
    condition: String,
    email: Option<String>,
    phone: Option<String>,
    medication_ids: Vec<u64>,
    health_record_ids: Vec<u64>,
}

impl Patient {
    pub fn new(name: &str, condition: &str) -> CareResult<Self> {
        Ok(Patient {
            id: None,
            name: required(name, "Name cannot be empty")?,
            condition: required(condition, "Condition cannot be empty")?,
            email: None,
            phone: None,
            medication_ids: Vec::new(),
            health_record_ids: Vec::new(),
        })
    }

    pub fn with_contact(mut self, email: Option<&str>, phone: Option<&str>) -> CareResult<Self> {
        self.set_email(email)?;
        self.set_phone(phone)?;
        Ok(self)
    }

    pub fn set_name(&mut self, name: &str) -> CareResult<()> {
        self.name = required(name, "Name cannot be empty")?;
        Ok(())
    }

    pub fn set_condition(&mut self, condition: &str) -> CareResult<()> {
        self.condition = required(condition, "Condition cannot be empty")?;
        Ok(())
    }

    pub fn set_email(&mut self, email: Option<&str>) -> CareResult<()> {
        self.email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            None => None,
            Some(e) if e.contains('@') && e.contains('.') => Some(e.to_lowercase()),
            Some(_) => return Err(CareError::validation("Invalid email format")),
        };
        Ok(())
    }

    pub fn set_phone(&mut self, phone: Option<&str>) -> CareResult<()> {
        self.phone = match phone.map(str::trim).filter(|p| !p.is_empty()) {
            None => None,
            Some(p) => {
                let cleaned: String = p
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '+' || *c == '-' || c.is_whitespace())
                    .collect();
                let digits = cleaned.chars().filter(char::is_ascii_digit).count();
                if digits < MIN_PHONE_DIGITS {
                    return Err(CareError::validation(
                        "Phone number must have at least 10 digits",
                    ));
                }
                Some(cleaned.trim().to_string())
            }
        };
        Ok(())
    }

    /// Re-checks the invariants a stored patient must satisfy.
    pub fn validate(&self) -> CareResult<()> {
        required(&self.name, "Name cannot be empty")?;
        required(&self.condition, "Condition cannot be empty")?;
        Ok(())
    }

    /// Takes name, condition and contact details from `other` while keeping
    /// this patient's medication and health record links.
    pub fn copy_profile(&mut self, other: &Patient) {
        self.name = other.name.clone();
        self.condition = other.condition.clone();
        self.email = other.email.clone();
        self.phone = other.phone.clone();
    }

    pub fn attach_medication(&mut self, medication_id: u64) {
        if !self.medication_ids.contains(&medication_id) {
            self.medication_ids.push(medication_id);
        }
    }

    pub fn detach_medication(&mut self, medication_id: u64) {
        self.medication_ids.retain(|id| *id != medication_id);
    }

    pub fn attach_health_record(&mut self, record_id: u64) {
        if !self.health_record_ids.contains(&record_id) {
            self.health_record_ids.push(record_id);
        }
    }

    /// Individual conditions from the comma-separated label.
    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.condition
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.condition.to_lowercase().contains(query)
            || self
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(query))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn medication_ids(&self) -> &[u64] {
        &self.medication_ids
    }

    pub fn health_record_ids(&self) -> &[u64] {
        &self.health_record_ids
    }
}

impl Entity for Patient {
    const KIND: &'static str = "Patient";

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
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_trims_and_requires_fields() {
        let patient = Patient::new("  Sarah Johnson ", "Diabetes Type 2").unwrap();
        assert_eq!(patient.name(), "Sarah Johnson");
        assert!(Patient::new("", "Asthma").is_err());
        assert!(Patient::new("Michael", "   ").is_err());
    }

    #[test]
    fn test_email_is_validated_and_lowercased() {
        let patient = Patient::new("Sarah", "Asthma")
            .unwrap()
            .with_contact(Some("Sarah.J@Email.com"), None)
            .unwrap();
        assert_eq!(patient.email(), Some("sarah.j@email.com"));

        let mut patient = patient;
        assert!(patient.set_email(Some("not-an-email")).is_err());
        assert_eq!(patient.email(), Some("sarah.j@email.com"));
        patient.set_email(Some("  ")).unwrap();
        assert_eq!(patient.email(), None);
    }

    #[test]
    fn test_phone_is_cleaned_and_needs_ten_digits() {
        let mut patient = Patient::new("Emily", "Arthritis").unwrap();
        patient.set_phone(Some("+1 (555) 012-3456")).unwrap();
        assert_eq!(patient.phone(), Some("+1 555 012-3456"));
        assert!(patient.set_phone(Some("555-0123")).is_err());
    }

    #[test]
    fn test_medication_links_are_unique() {
        let mut patient = Patient::new("Emily", "Arthritis").unwrap();
        patient.attach_medication(3);
        patient.attach_medication(3);
        patient.attach_medication(5);
        assert_eq!(patient.medication_ids(), &[3, 5]);
        patient.detach_medication(3);
        assert_eq!(patient.medication_ids(), &[5]);
    }

    #[test]
    fn test_copy_profile_keeps_links() {
        let mut stored = Patient::new("Emily", "Arthritis").unwrap();
        stored.attach_medication(4);
        stored.attach_health_record(9);
        let edited = Patient::new("Emily Rodriguez", "Rheumatoid Arthritis")
            .unwrap()
            .with_contact(Some("emily@email.com"), None)
            .unwrap();

        stored.copy_profile(&edited);
        assert_eq!(stored.name(), "Emily Rodriguez");
        assert_eq!(stored.email(), Some("emily@email.com"));
        assert_eq!(stored.medication_ids(), &[4]);
        assert_eq!(stored.health_record_ids(), &[9]);
    }

    #[test]
    fn test_conditions_split_on_commas() {
        let patient = Patient::new("Sarah", "Diabetes Type 2, Hypertension").unwrap();
        let conditions: Vec<&str> = patient.conditions().collect();
        assert_eq!(conditions, vec!["Diabetes Type 2", "Hypertension"]);
    }
}
