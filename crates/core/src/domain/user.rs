// User Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Row ID assigned by the datastore
pub type UserId = i64;

/// Maximum accepted length for names and emails
pub const MAX_FIELD_LEN: usize = 255;

/// Upper bound for the age column
pub const MAX_AGE: i32 = 150;

/// Record submitted for insertion (no ID yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub age: i32,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
        }
    }

    /// Check the record before it is written.
    ///
    /// Runs inside the worker jobs, outside the connection lock.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "name cannot be empty".to_string(),
            ));
        }
        if self.name.len() > MAX_FIELD_LEN {
            return Err(DomainError::ValidationError(format!(
                "name too long (max {} chars)",
                MAX_FIELD_LEN
            )));
        }
        if self.email.len() > MAX_FIELD_LEN || !self.email.contains('@') {
            return Err(DomainError::ValidationError(format!(
                "invalid email: {}",
                self.email
            )));
        }
        if !(0..=MAX_AGE).contains(&self.age) {
            return Err(DomainError::ValidationError(format!(
                "age out of range: {} (expected 0..={})",
                self.age, MAX_AGE
            )));
        }
        Ok(())
    }
}

/// Persisted user row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub created_at: i64, // epoch ms
}
