use super::claims::Claims;
use super::context::{UmaAuthorizationContext, UmaAuthorizationContextBuilder};
use super::pct::UmaPct;
use super::permission::{UmaPermission, UmaPermissionService, GATHERING_ID, PCT};
use super::policy::{ClaimDefinition, PolicyScriptRegistry};
use super::resource::UmaResourceService;
use super::scope::UmaScopeDescription;
use crate::client::Client;
use crate::store::StoreError;
use log::{error, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Policy script evaluated for one scope
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UmaScriptByScope {
    pub scope_id: String,
    pub script_dn: String,
}

/// Body of the `need_info` answer sent back to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmaNeedInfoResponse {
    pub error: String,
    pub ticket: String,
    pub required_claims: Vec<ClaimDefinition>,
    pub redirect_user: String,
}

#[derive(Debug, Error)]
pub enum NeedsInfoError {
    /// More claims are needed; the client must continue with the new ticket
    #[error("need_info, new ticket: {}", .0.ticket)]
    NeedInfo(Box<UmaNeedInfoResponse>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decides whether a ticket can be exchanged for an RPT or more claims must be gathered
#[derive(Debug, Clone)]
pub struct UmaNeedsInfoService {
    permission_service: UmaPermissionService,
    resource_service: UmaResourceService,
    policies: Arc<PolicyScriptRegistry>,
    issuer: String,
    gathering_endpoint: String,
}

impl UmaNeedsInfoService {
    pub fn new(
        permission_service: UmaPermissionService,
        resource_service: UmaResourceService,
        policies: Arc<PolicyScriptRegistry>,
        issuer: impl Into<String>,
        gathering_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            permission_service,
            resource_service,
            policies,
            issuer: issuer.into(),
            gathering_endpoint: gathering_endpoint.into(),
        }
    }

    /// Runs the policy scripts of the requested scopes against `claims`.
    ///
    /// Returns the context built for every script when all required claims are known.
    /// Otherwise the permissions are moved to a new ticket carrying the PCT code and
    /// the claims gathering script names, and [`NeedsInfoError::NeedInfo`] is returned.
    pub async fn check_needs_info(
        &self,
        claims: &Claims,
        requested_scopes: &[(UmaScopeDescription, bool)],
        permissions: &[UmaPermission],
        pct: &UmaPct,
        client: &Client,
    ) -> Result<BTreeMap<UmaScriptByScope, UmaAuthorizationContext>, NeedsInfoError> {
        let builder = UmaAuthorizationContextBuilder::new(
            &self.issuer,
            &self.resource_service,
            permissions,
            requested_scopes,
            claims,
            client,
        )
        .await?;

        let mut script_map = BTreeMap::new();
        let mut ticket_attributes = BTreeMap::new();
        let mut missed_claims: Vec<ClaimDefinition> = Vec::new();

        for (scope, _) in requested_scopes {
            if scope.authorization_policies.is_empty() {
                trace!("No policies defined for scope: {}, dn: {}", scope.id, scope.dn);
                continue;
            }
            for script_dn in &scope.authorization_policies {
                let Some(script) = self.policies.get_script_by_dn(script_dn) else {
                    error!("Unable to load UMA script dn: '{}'", script_dn);
                    continue;
                };
                let mut context = builder.build(script.as_ref());

                match script.required_claims(&mut context) {
                    Ok(required) => missed_claims.extend(
                        required
                            .into_iter()
                            .filter(|definition| !claims.has(&definition.name)),
                    ),
                    Err(e) => error!("Policy script {} failed: {}", script.name(), e),
                }

                match script
                    .claims_gathering_script_name(&mut context)
                    .filter(|name| !name.trim().is_empty())
                {
                    Some(name) => {
                        let value = match ticket_attributes.get(GATHERING_ID) {
                            Some(existing) => format!("{} {}", existing, name),
                            None => name,
                        };
                        ticket_attributes.insert(GATHERING_ID.to_string(), value);
                    }
                    None => error!(
                        "Policy script {} returned no claims gathering script name",
                        script.name()
                    ),
                }

                script_map.insert(
                    UmaScriptByScope {
                        scope_id: scope.id.clone(),
                        script_dn: script_dn.clone(),
                    },
                    context,
                );
            }
        }

        if missed_claims.is_empty() {
            return Ok(script_map);
        }

        ticket_attributes.insert(PCT.to_string(), pct.code.clone());
        let new_ticket = self
            .permission_service
            .change_ticket(permissions, ticket_attributes)
            .await?;
        let redirect_user =
            self.build_claims_gathering_redirect_uri(script_map.values(), client, &new_ticket);
        Err(NeedsInfoError::NeedInfo(Box::new(UmaNeedInfoResponse {
            error: "need_info".to_string(),
            ticket: new_ticket,
            required_claims: missed_claims,
            redirect_user,
        })))
    }

    fn build_claims_gathering_redirect_uri<'c>(
        &self,
        contexts: impl Iterator<Item = &'c UmaAuthorizationContext>,
        client: &Client,
        ticket: &str,
    ) -> String {
        let mut query: Vec<String> = contexts
            .map(|context| context.redirect_user_parameters().build_query_string())
            .filter(|params| !params.is_empty())
            .collect();
        query.push(
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("client_id", &client.client_id)
                .append_pair("ticket", ticket)
                .finish(),
        );
        format!("{}?{}", self.gathering_endpoint, query.join("&"))
    }

    /// DNs of every policy script bound to `scopes`
    pub fn script_dns(scopes: &[UmaScopeDescription]) -> Vec<String> {
        let mut dns: Vec<String> = scopes
            .iter()
            .flat_map(|scope| scope.authorization_policies.iter().cloned())
            .collect();
        dns.sort();
        dns.dedup();
        dns
    }
}
