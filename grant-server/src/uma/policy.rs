use super::context::UmaAuthorizationContext;
use super::UmaError;
use crate::store::dn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Claim a policy needs before it can decide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claim_token_format: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuer: Vec<String>,
}

impl ClaimDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            claim_type: None,
            claim_token_format: Vec::new(),
            issuer: Vec::new(),
        }
    }
}

/// Authorization policy bound to UMA scopes.
///
/// Policies may add redirect parameters or claims to the context they are given.
pub trait UmaPolicyScript: Send + Sync {
    fn name(&self) -> &str;

    /// DN the scope descriptions refer to the policy by
    fn dn(&self) -> &str;

    fn configuration_attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Claims that must be known before the policy can be evaluated
    fn required_claims(
        &self,
        context: &mut UmaAuthorizationContext,
    ) -> Result<Vec<ClaimDefinition>, UmaError>;

    /// Name of the claims gathering script collecting the required claims
    fn claims_gathering_script_name(&self, context: &mut UmaAuthorizationContext)
        -> Option<String>;
}

/// Policy scripts by DN
#[derive(Clone, Default)]
pub struct PolicyScriptRegistry {
    scripts: HashMap<String, Arc<dyn UmaPolicyScript>>,
}

impl fmt::Debug for PolicyScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyScriptRegistry")
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PolicyScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, script: Arc<dyn UmaPolicyScript>) {
        log::debug!("Registered UMA policy script {} ({})", script.name(), script.dn());
        self.scripts.insert(dn::normalize(script.dn()), script);
    }

    pub fn get_script_by_dn(&self, script_dn: &str) -> Option<Arc<dyn UmaPolicyScript>> {
        self.scripts.get(&dn::normalize(script_dn)).cloned()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
