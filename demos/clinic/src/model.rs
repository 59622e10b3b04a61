//! Records managed by the clinic demo
//!
//! Field names follow the backend's camelCase JSON.

use entity_dispatch::Entity;
use serde::{Deserialize, Serialize};

#[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[entity(name = "patient", input = PatientInput)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Patient {
    pub fn build(id: &str, input: &PatientInput) -> Self {
        Self {
            id: id.to_string(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
        }
    }
}

#[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[entity(name = "pregnancy", input = PregnancyInput)]
#[serde(rename_all = "camelCase")]
pub struct Pregnancy {
    pub id: String,
    pub patient_id: String,
    /// `ACTIVE`, `DELIVERED` or `INTERRUPTED`
    pub status: String,
    /// ISO date of the last menstrual period
    pub lmp_date: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PregnancyInput {
    pub patient_id: String,
    pub status: String,
    pub lmp_date: String,
}

impl Pregnancy {
    pub fn build(id: &str, input: &PregnancyInput) -> Self {
        Self {
            id: id.to_string(),
            patient_id: input.patient_id.clone(),
            status: input.status.clone(),
            lmp_date: input.lmp_date.clone(),
        }
    }
}

#[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[entity(name = "delivery", input = DeliveryInput)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[entity(id)]
    pub delivery_id: String,
    pub pregnancy_id: String,
    pub delivered_on: String,
    pub mode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInput {
    pub pregnancy_id: String,
    pub delivered_on: String,
    pub mode: String,
}

impl Delivery {
    pub fn build(id: &str, input: &DeliveryInput) -> Self {
        Self {
            delivery_id: id.to_string(),
            pregnancy_id: input.pregnancy_id.clone(),
            delivered_on: input.delivered_on.clone(),
            mode: input.mode.clone(),
        }
    }
}

pub fn seed_patients() -> Vec<Patient> {
    [
        ("Awa", "Diallo"),
        ("Fatou", "Ndiaye"),
        ("Mariam", "Traore"),
        ("Aminata", "Kone"),
        ("Khadija", "Sow"),
        ("Salimata", "Diarra"),
    ]
    .iter()
    .enumerate()
    .map(|(n, (first, last))| Patient {
        id: format!("p{}", n + 1),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}@clinic.test", first.to_lowercase(), last.to_lowercase()),
    })
    .collect()
}

pub fn seed_pregnancies() -> Vec<Pregnancy> {
    vec![
        Pregnancy {
            id: "g1".into(),
            patient_id: "p1".into(),
            status: "ACTIVE".into(),
            lmp_date: "2026-03-02".into(),
        },
        Pregnancy {
            id: "g2".into(),
            patient_id: "p2".into(),
            status: "DELIVERED".into(),
            lmp_date: "2025-09-14".into(),
        },
        Pregnancy {
            id: "g3".into(),
            patient_id: "p4".into(),
            status: "ACTIVE".into(),
            lmp_date: "2026-05-20".into(),
        },
    ]
}
