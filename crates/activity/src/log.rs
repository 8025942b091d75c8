//! Self-reported progress: daily macros and body measurements.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{DomainError, DomainResult, Entity, LogId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroLog {
    pub id: LogId,
    pub member_id: UserId,
    pub date: NaiveDate,
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    pub fat_g: u32,
    pub logged_at: DateTime<Utc>,
}

impl MacroLog {
    pub fn new(
        member_id: UserId,
        date: NaiveDate,
        calories: u32,
        protein_g: u32,
        carbs_g: u32,
        fat_g: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if date > now.date_naive() {
            return Err(DomainError::validation("cannot log macros for a future date"));
        }
        Ok(Self {
            id: LogId::new(),
            member_id,
            date,
            calories,
            protein_g,
            carbs_g,
            fat_g,
            logged_at: now,
        })
    }
}

impl Entity for MacroLog {
    type Id = LogId;
    const COLLECTION: &'static str = "macro_logs";

    fn id(&self) -> LogId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyLog {
    pub id: LogId,
    pub member_id: UserId,
    pub date: NaiveDate,
    pub weight_kg: f64,
    #[serde(default)]
    pub body_fat_pct: Option<f64>,
    /// Public URLs returned by object storage.
    #[serde(default)]
    pub photos: Vec<String>,
    pub logged_at: DateTime<Utc>,
}

impl BodyLog {
    pub fn new(
        member_id: UserId,
        date: NaiveDate,
        weight_kg: f64,
        body_fat_pct: Option<f64>,
        photos: Vec<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 || weight_kg > 700.0 {
            return Err(DomainError::validation("weight must be between 0 and 700 kg"));
        }
        if let Some(pct) = body_fat_pct {
            if !pct.is_finite() || !(0.0..100.0).contains(&pct) {
                return Err(DomainError::validation("body fat must be a percentage below 100"));
            }
        }
        if date > now.date_naive() {
            return Err(DomainError::validation("cannot log body data for a future date"));
        }
        Ok(Self {
            id: LogId::new(),
            member_id,
            date,
            weight_kg,
            body_fat_pct,
            photos,
            logged_at: now,
        })
    }
}

impl Entity for BodyLog {
    type Id = LogId;
    const COLLECTION: &'static str = "body_logs";

    fn id(&self) -> LogId {
        self.id
    }
}
