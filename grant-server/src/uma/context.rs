use super::claims::Claims;
use super::permission::UmaPermission;
use super::policy::UmaPolicyScript;
use super::resource::{UmaResource, UmaResourceService};
use super::scope::UmaScopeDescription;
use crate::client::Client;
use crate::store::StoreError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Query parameters added to the claims gathering redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParameters {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl RedirectParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.entry(name.into()).or_default().insert(value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.map.remove(name);
    }

    pub fn map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.map
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Form encoded `name=value` pairs joined by `&`, empty without parameters
    pub fn build_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.map {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }
}

/// What a policy script sees while evaluating one authorization request.
///
/// Each context holds its own copy of the claims; changes made by one script are
/// not visible to the others.
#[derive(Debug, Clone)]
pub struct UmaAuthorizationContext {
    issuer: String,
    /// Scope and whether the client requested it (false: it came with the ticket)
    scopes: Vec<(UmaScopeDescription, bool)>,
    resources: Vec<UmaResource>,
    claims: Claims,
    script_dn: String,
    configuration_attributes: BTreeMap<String, String>,
    redirect_user_parameters: RedirectParameters,
    client: Client,
}

impl UmaAuthorizationContext {
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn script_dn(&self) -> &str {
        &self.script_dn
    }

    pub fn configuration_attributes(&self) -> &BTreeMap<String, String> {
        &self.configuration_attributes
    }

    pub fn scope_map(&self) -> &[(UmaScopeDescription, bool)] {
        &self.scopes
    }

    pub fn scopes(&self) -> BTreeSet<String> {
        self.scopes.iter().map(|(scope, _)| scope.id.clone()).collect()
    }

    /// Scopes bound to the script this context was built for
    pub fn script_scopes(&self) -> BTreeSet<String> {
        self.scopes
            .iter()
            .filter(|(scope, _)| scope.authorization_policies.contains(&self.script_dn))
            .map(|(scope, _)| scope.id.clone())
            .collect()
    }

    pub fn resources(&self) -> &[UmaResource] {
        &self.resources
    }

    pub fn resource_ids(&self) -> BTreeSet<String> {
        self.resources.iter().map(|r| r.id.clone()).collect()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn claim_token(&self) -> Option<String> {
        self.claims.claim_token_as_string()
    }

    pub fn claim_token_claim(&self, key: &str) -> Option<&Value> {
        self.claims.claim_token_claim(key)
    }

    pub fn pct_claim(&self, key: &str) -> Option<&Value> {
        self.claims.pct_claim(key)
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn has_claim(&self, name: &str) -> bool {
        self.claims.has(name)
    }

    pub fn put_claim(&mut self, name: impl Into<String>, value: Value) {
        self.claims.put(name, value);
    }

    pub fn remove_claim(&mut self, name: &str) {
        self.claims.remove(name);
    }

    pub fn add_redirect_user_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.redirect_user_parameters.add(name, value);
    }

    pub fn remove_redirect_user_param(&mut self, name: &str) {
        self.redirect_user_parameters.remove(name);
    }

    pub fn redirect_user_parameters(&self) -> &RedirectParameters {
        &self.redirect_user_parameters
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builds one [`UmaAuthorizationContext`] per policy script of a request
pub struct UmaAuthorizationContextBuilder<'a> {
    issuer: &'a str,
    permissions: &'a [UmaPermission],
    scopes: &'a [(UmaScopeDescription, bool)],
    claims: &'a Claims,
    client: &'a Client,
    resources: Vec<UmaResource>,
}

impl<'a> UmaAuthorizationContextBuilder<'a> {
    /// Resolves the resources the permissions point at once for all contexts
    pub async fn new(
        issuer: &'a str,
        resource_service: &UmaResourceService,
        permissions: &'a [UmaPermission],
        scopes: &'a [(UmaScopeDescription, bool)],
        claims: &'a Claims,
        client: &'a Client,
    ) -> Result<UmaAuthorizationContextBuilder<'a>, StoreError> {
        let resources = resource_service
            .get_resources(&Self::resource_ids_of(permissions))
            .await?;
        Ok(Self {
            issuer,
            permissions,
            scopes,
            claims,
            client,
            resources,
        })
    }

    fn resource_ids_of(permissions: &[UmaPermission]) -> HashSet<String> {
        permissions.iter().map(|p| p.resource_id.clone()).collect()
    }

    pub fn resource_ids(&self) -> HashSet<String> {
        Self::resource_ids_of(self.permissions)
    }

    pub fn resources(&self) -> &[UmaResource] {
        &self.resources
    }

    pub fn build(&self, script: &dyn UmaPolicyScript) -> UmaAuthorizationContext {
        UmaAuthorizationContext {
            issuer: self.issuer.to_string(),
            scopes: self.scopes.to_vec(),
            resources: self.resources.clone(),
            claims: self.claims.clone(),
            script_dn: script.dn().to_string(),
            configuration_attributes: script.configuration_attributes(),
            redirect_user_parameters: RedirectParameters::new(),
            client: self.client.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_parameters_query_string() {
        let mut params = RedirectParameters::new();
        assert_eq!(params.build_query_string(), "");

        params.add("locale", "en nz");
        params.add("step", "1");
        params.add("step", "2");
        assert_eq!(params.build_query_string(), "locale=en+nz&step=1&step=2");

        params.remove("step");
        assert_eq!(params.build_query_string(), "locale=en+nz");
        assert_eq!(params.map().len(), 1);
    }
}
