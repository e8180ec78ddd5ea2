//! Domain services
//!
//! Services own no data themselves. Each holds the shared [`CareStores`] and
//! keeps cross-entity links consistent: a medication's `patient_id` and the
//! patient's `medication_ids` always move together.

pub mod medications;
pub mod notifications;
pub mod patients;

pub use medications::{MedicationChanges, MedicationService};
pub use notifications::NotificationService;
pub use patients::{PatientChanges, PatientService};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::CareStores;

#[derive(Debug, Clone)]
pub struct CareServices {
    pub patients: PatientService,
    pub medications: MedicationService,
    pub notifications: NotificationService,
}

impl CareServices {
    pub fn new(stores: Arc<CareStores>) -> Self {
        CareServices {
            patients: PatientService::new(Arc::clone(&stores)),
            medications: MedicationService::new(Arc::clone(&stores)),
            notifications: NotificationService::new(stores),
        }
    }
}

/// Counts items per key.
fn distribution<T, K: Ord>(items: impl IntoIterator<Item = T>, key: impl Fn(T) -> K) -> BTreeMap<K, usize> {
    items.into_iter().fold(BTreeMap::new(), |mut counts, item| {
        *counts.entry(key(item)).or_insert(0) += 1;
        counts
    })
}

fn normalized_query(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_distribution_counts_keys() {
        let counts = distribution(["b", "a", "b"], |s| s.to_string());
        assert_eq!(counts.get("a"), Some(&1));
        assert_eq!(counts.get("b"), Some(&2));
    }

    #[test]
    fn test_blank_query_matches_everything() {
        assert_eq!(normalized_query("   "), None);
        assert_eq!(normalized_query(" MetFormin "), Some("metformin".to_string()));
    }
}
