//! Claims identity produced by token verification

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single `(type, value)` assertion taken from a verified token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim name (payload key)
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Claim value; non-string JSON values are kept in their JSON text form
    pub value: String,
}

impl Claim {
    /// Create a claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Claims-based identity for one inbound request
///
/// Immutable after construction. Claim types are not guaranteed unique;
/// lookups return the first match in payload order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClaimsIdentity {
    claims: Vec<Claim>,
    is_authenticated: bool,
}

impl ClaimsIdentity {
    /// Create an identity from explicit claims
    pub fn new(claims: Vec<Claim>, is_authenticated: bool) -> Self {
        Self {
            claims,
            is_authenticated,
        }
    }

    /// Identity with no claims that is not authenticated
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Build an authenticated identity with one claim per payload field
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let claims = payload
            .into_iter()
            .map(|(claim_type, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Claim { claim_type, value }
            })
            .collect();

        Self::new(claims, true)
    }

    /// All claims in payload order
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Whether the identity was verified
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Value of the first claim with the given type
    pub fn get_claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }
}
