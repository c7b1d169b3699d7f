//! Record types for the catalog.

use crate::error::{Error, Result};
use crate::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roast category of a coffee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Roast {
    Light,
    Medium,
    Dark,
}

impl Roast {
    /// All roast categories, lightest first.
    pub const ALL: [Roast; 3] = [Roast::Light, Roast::Medium, Roast::Dark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Roast::Light => "light",
            Roast::Medium => "medium",
            Roast::Dark => "dark",
        }
    }
}

impl fmt::Display for Roast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Roast {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(Roast::Light),
            "medium" => Ok(Roast::Medium),
            "dark" => Ok(Roast::Dark),
            other => Err(Error::InvalidRecord(format!("unknown roast: {}", other))),
        }
    }
}

/// A coffee in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier for this record
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Growing region(s)
    pub origin: String,
    /// Roast category
    pub roast: Roast,
    /// Tasting notes, in display order
    pub tasting_notes: Vec<String>,
    /// Units in stock, never negative
    pub stock: u32,
    /// Unit price
    pub price: f64,
}

impl Record {
    /// Create a new record.
    pub fn new(
        id: impl Into<RecordId>,
        name: impl Into<String>,
        origin: impl Into<String>,
        roast: Roast,
        tasting_notes: Vec<String>,
        stock: u32,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origin: origin.into(),
            roast,
            tasting_notes,
            stock,
            price,
        }
    }

    /// Check that the record can be written to a document.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidRecord("empty id".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::InvalidRecord(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Apply a field change to this value.
    pub fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Stock { delta } => self.stock = clamp_stock(self.stock, *delta),
            FieldChange::Price { value } => self.price = *value,
            FieldChange::Name { value } => self.name = value.clone(),
            FieldChange::Origin { value } => self.origin = value.clone(),
            FieldChange::Roast { value } => self.roast = *value,
            FieldChange::AddTastingNote { value } => {
                if !self.tasting_notes.contains(value) {
                    self.tasting_notes.push(value.clone());
                }
            }
            FieldChange::RemoveTastingNote { value } => {
                self.tasting_notes.retain(|note| note != value)
            }
        }
    }
}

/// A single-field edit to an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "camelCase")]
pub enum FieldChange {
    /// Add `delta` to the stock count, clamping at zero
    Stock { delta: i64 },
    /// Replace the price
    Price { value: f64 },
    /// Replace the name
    Name { value: String },
    /// Replace the origin
    Origin { value: String },
    /// Replace the roast category
    Roast { value: Roast },
    /// Append a tasting note if absent
    AddTastingNote { value: String },
    /// Remove every occurrence of a tasting note
    RemoveTastingNote { value: String },
}

impl FieldChange {
    /// Reject changes that would break record invariants.
    pub fn validate(&self) -> Result<()> {
        match self {
            FieldChange::Price { value } if !value.is_finite() || *value < 0.0 => Err(
                Error::InvalidRecord(format!("price must be a non-negative number, got {}", value)),
            ),
            _ => Ok(()),
        }
    }
}

/// Apply a signed delta to a stock count, clamping at zero.
pub fn clamp_stock(current: u32, delta: i64) -> u32 {
    let next = i64::from(current).saturating_add(delta);
    next.clamp(0, i64::from(u32::MAX)) as u32
}
