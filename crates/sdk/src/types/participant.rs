use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Vetting state of a participant.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(into_wasm_abi, from_wasm_abi))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VettingStatus {
    /// Awaiting review.
    #[default]
    Pending,
    /// Cleared to attend.
    Approved,
    /// Declined.
    Rejected,
}

impl VettingStatus {
    /// String form used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VettingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered individual moving through the vetting and payment
/// pipeline of a cohort.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(into_wasm_abi))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Backend identifier.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Wallet address, if one was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Country of residence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// City of residence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Self-reported gender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Registration (cohort) the participant belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    /// Course the participant enrolled in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    /// Whether payment has been confirmed.
    #[serde(default)]
    pub payment_status: bool,
    /// Vetting state.
    #[serde(default)]
    pub vetting_status: VettingStatus,
    /// Server-side creation time.
    #[serde(with = "time::serde::rfc3339")]
    #[cfg_attr(js, tsify(type = "string"))]
    pub created_at: OffsetDateTime,
}

/// Sort participants newest-first, breaking ties by id so that the
/// order is stable across refetches.
pub fn sort_newest_first(participants: &mut [Participant]) {
    participants.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Decode one raw record, skipping it with a warning when malformed so
/// that a single bad row cannot sink a whole page or chunk.
pub(crate) fn decode_lenient(value: serde_json::Value) -> Option<Participant> {
    match serde_json::from_value(value) {
        Ok(participant) => Some(participant),
        Err(err) => {
            tracing::warn!(%err, "skipping malformed participant record");
            None
        }
    }
}
