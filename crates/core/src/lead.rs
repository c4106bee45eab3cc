//! Lead entity, pipeline stages and the lead request shapes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::record::{Collection, Record, Staged};
use crate::types::{RecordId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// PipelineStage
// ---------------------------------------------------------------------------

/// Sales pipeline stage. A lead's pipeline column is derived from this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PipelineStage {
    #[default]
    New,
    Contacted,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl PipelineStage {
    /// Every stage in pipeline column order.
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::New,
        PipelineStage::Contacted,
        PipelineStage::Qualified,
        PipelineStage::Proposal,
        PipelineStage::Won,
        PipelineStage::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::New => "New",
            PipelineStage::Contacted => "Contacted",
            PipelineStage::Qualified => "Qualified",
            PipelineStage::Proposal => "Proposal",
            PipelineStage::Won => "Won",
            PipelineStage::Lost => "Lost",
        }
    }

    /// Open leads are still being worked (neither won nor lost).
    pub fn is_open(&self) -> bool {
        !matches!(self, PipelineStage::Won | PipelineStage::Lost)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = CoreError;

    /// Case-insensitive parse of the stage label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "pipeline stage",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// A lead row from the `leads` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: PipelineStage,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: Timestamp,
}

/// Form input for creating a lead.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLead {
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    #[validate(custom(function = "crate::validation::blank_or_email"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "crate::validation::deal_value"))]
    pub value: f64,
    /// Defaults to [`PipelineStage::New`] if omitted.
    #[serde(default)]
    pub status: PipelineStage,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub source: String,
}

impl CreateLead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            company: String::new(),
            email: String::new(),
            phone: None,
            value: 0.0,
            status: PipelineStage::New,
            owner: String::new(),
            source: String::new(),
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_status(mut self, status: PipelineStage) -> Self {
        self.status = status;
        self
    }
}

/// Insert payload for the `leads` collection.
#[derive(Debug, Clone, Serialize)]
pub struct NewLead {
    pub user_id: UserId,
    pub name: String,
    pub company: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub value: f64,
    pub status: PipelineStage,
    pub owner: String,
    pub source: String,
    pub created_at: Timestamp,
}

/// Partial update for a lead. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct LeadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::blank_or_email"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::deal_value"))]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PipelineStage>,
}

impl LeadPatch {
    /// A patch that only moves the lead to another stage.
    pub fn status(status: PipelineStage) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl Record for Lead {
    type Create = CreateLead;
    type Insert = NewLead;
    type Patch = LeadPatch;

    const COLLECTION: Collection = Collection::Leads;

    fn id(&self) -> &str {
        &self.id
    }

    fn insert_payload(input: CreateLead, owner: &str, now: Timestamp) -> NewLead {
        NewLead {
            user_id: owner.to_string(),
            name: input.name.trim().to_string(),
            company: input.company,
            email: input.email.trim().to_string(),
            phone: input.phone,
            value: input.value,
            status: input.status,
            owner: input.owner,
            source: input.source,
            created_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &LeadPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(company) = &patch.company {
            self.company = company.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

impl Staged for Lead {
    type Status = PipelineStage;

    fn status(&self) -> PipelineStage {
        self.status
    }

    fn status_patch(status: PipelineStage) -> LeadPatch {
        LeadPatch::status(status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
