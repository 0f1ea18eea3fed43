//! Field checks for generation requests.
//!
//! Violations name the field and what is wrong with it; turning them into
//! sentences for a person is left to the HTTP layer.

use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

use super::filename::is_path_safe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Empty,
    NotAYear,
    /// Path separators, reserved filename characters or `..`
    UnsafeForPath,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::NotAYear => "not a year",
            Self::UnsafeForPath => "not usable in a file name",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldViolation {
    pub field: &'static str,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, kind: ViolationKind) {
        self.violations.push(FieldViolation { field, kind });
    }

    /// Non-empty after trimming.
    pub fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, ViolationKind::Empty);
            return false;
        }
        true
    }

    /// Non-empty and ASCII digits only.
    pub fn require_year(&mut self, field: &'static str, value: &str) {
        if self.require(field, value) && !value.trim().chars().all(|c| c.is_ascii_digit()) {
            self.add(field, ViolationKind::NotAYear);
        }
    }

    /// Non-empty and safe to put in a file or folder name.
    pub fn require_path_segment(&mut self, field: &'static str, value: &str) {
        if self.require(field, value) && !is_path_safe(value.trim()) {
            self.add(field, ViolationKind::UnsafeForPath);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid input: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ({})", v.field, v.kind)?;
        }
        Ok(())
    }
}
