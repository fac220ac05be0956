//! UMA 2 ticket economy: permission tickets, persisted claims tokens (PCT),
//! requesting party tokens (RPT) and the claims gathering decision.

use crate::cache::CacheError;
use crate::store::StoreError;
use thiserror::Error;

pub mod claims;
pub mod context;
pub mod gathering;
pub mod needs_info;
pub mod pct;
pub mod permission;
pub mod policy;
pub mod resource;
pub mod rpt;
pub mod scope;

pub use claims::Claims;
pub use context::{RedirectParameters, UmaAuthorizationContext, UmaAuthorizationContextBuilder};
pub use gathering::{ClaimsGatheringRegistry, ClaimsGatheringScript};
pub use needs_info::{NeedsInfoError, UmaNeedInfoResponse, UmaNeedsInfoService, UmaScriptByScope};
pub use pct::{UmaPct, UmaPctService};
pub use permission::{PermissionRequest, UmaPermission, UmaPermissionService};
pub use policy::{ClaimDefinition, PolicyScriptRegistry, UmaPolicyScript};
pub use resource::{UmaResource, UmaResourceService};
pub use rpt::{UmaRpt, UmaRptService};
pub use scope::{UmaScopeDescription, UmaScopeService};

#[derive(Debug, Error)]
pub enum UmaError {
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
    #[error("Client not found: {0}")]
    ClientNotFound(String),
    #[error("Policy script error: {0}")]
    Script(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}
