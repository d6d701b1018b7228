// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage and governor crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CallwardenError;

/// Identifies one calling relationship: a business account and one contact number.
///
/// Both persisted records (rate limit and quality) are keyed by this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallKey {
    /// The business account that owns the relationship.
    pub owner_id: String,
    /// The contact's phone number, as supplied by the caller.
    pub phone_number: String,
}

impl CallKey {
    /// Build a key, rejecting blank components.
    ///
    /// Phone number format validation belongs to the calling layer; this only
    /// guards against empty keys reaching the store.
    pub fn new(
        owner_id: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Result<Self, CallwardenError> {
        let owner_id = owner_id.into().trim().to_string();
        let phone_number = phone_number.into().trim().to_string();
        if owner_id.is_empty() {
            return Err(CallwardenError::validation("owner id must not be empty"));
        }
        if phone_number.is_empty() {
            return Err(CallwardenError::validation("phone number must not be empty"));
        }
        Ok(Self {
            owner_id,
            phone_number,
        })
    }
}

impl std::fmt::Display for CallKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.phone_number)
    }
}

/// Terminal outcome of a call, as reported by the calling provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Connected,
    Missed,
    Rejected,
    Failed,
}

/// Direction of a logged call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Outbound,
    Inbound,
}

/// Health band derived from a pickup rate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl QualityStatus {
    /// All bands, best first.
    pub const ALL: [QualityStatus; 5] = [
        QualityStatus::Excellent,
        QualityStatus::Good,
        QualityStatus::Fair,
        QualityStatus::Poor,
        QualityStatus::Critical,
    ];

    /// Step function over a pickup rate in percent.
    pub fn from_pickup_rate(pickup_rate: u32) -> Self {
        match pickup_rate {
            90.. => QualityStatus::Excellent,
            75..=89 => QualityStatus::Good,
            60..=74 => QualityStatus::Fair,
            40..=59 => QualityStatus::Poor,
            _ => QualityStatus::Critical,
        }
    }
}
