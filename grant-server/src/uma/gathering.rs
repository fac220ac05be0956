use super::permission::{UmaPermission, GATHERING_ID};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Interactive step sequence collecting claims from the requesting party
pub trait ClaimsGatheringScript: Send + Sync {
    fn name(&self) -> &str;

    fn steps_count(&self) -> usize;

    /// Page rendered for `step` (1-based)
    fn page_for_step(&self, step: usize) -> Option<String>;
}

/// Claims gathering scripts by name
#[derive(Clone, Default)]
pub struct ClaimsGatheringRegistry {
    scripts: HashMap<String, Arc<dyn ClaimsGatheringScript>>,
}

impl fmt::Debug for ClaimsGatheringRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsGatheringRegistry")
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClaimsGatheringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, script: Arc<dyn ClaimsGatheringScript>) {
        self.scripts.insert(script.name().to_string(), script);
    }

    pub fn get_script(&self, name: &str) -> Option<Arc<dyn ClaimsGatheringScript>> {
        self.scripts.get(name).cloned()
    }

    /// Script names attached to the ticket the permissions belong to, in order
    pub fn script_names(permissions: &[UmaPermission]) -> Vec<String> {
        permissions
            .first()
            .and_then(|permission| permission.attribute(GATHERING_ID))
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Scripts attached to the ticket; unknown names are logged and skipped
    pub fn scripts_for_ticket(
        &self,
        permissions: &[UmaPermission],
    ) -> Vec<Arc<dyn ClaimsGatheringScript>> {
        Self::script_names(permissions)
            .iter()
            .filter_map(|name| {
                let script = self.get_script(name);
                if script.is_none() {
                    log::error!("Unknown claims gathering script: {}", name);
                }
                script
            })
            .collect()
    }

    pub fn steps_count(&self, name: &str) -> Option<usize> {
        self.get_script(name).map(|script| script.steps_count())
    }

    pub fn page_for_step(&self, name: &str, step: usize) -> Option<String> {
        let script = self.get_script(name)?;
        if step == 0 || step > script.steps_count() {
            return None;
        }
        script.page_for_step(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    struct EmailGathering;

    impl ClaimsGatheringScript for EmailGathering {
        fn name(&self) -> &str {
            "email_gathering"
        }

        fn steps_count(&self) -> usize {
            2
        }

        fn page_for_step(&self, step: usize) -> Option<String> {
            Some(format!("/uma/gather/email_{}.htm", step))
        }
    }

    #[test]
    fn test_scripts_resolved_from_ticket_attributes() {
        let mut registry = ClaimsGatheringRegistry::new();
        registry.register(Arc::new(EmailGathering));

        let mut attributes = BTreeMap::new();
        attributes.insert(
            GATHERING_ID.to_string(),
            "email_gathering country_gathering".to_string(),
        );
        let permission = UmaPermission {
            dn: "ticket=t,ou=uma_permission,inum=c,ou=clients,o=test".to_string(),
            ticket: "t".to_string(),
            resource_id: "photos".to_string(),
            scope_dns: Vec::new(),
            configuration_code: "x.1".to_string(),
            expiration_date: Utc::now(),
            attributes,
            status: None,
        };

        let permissions = [permission];
        assert_eq!(
            ClaimsGatheringRegistry::script_names(&permissions),
            vec!["email_gathering", "country_gathering"]
        );
        assert_eq!(registry.scripts_for_ticket(&permissions).len(), 1);
        assert_eq!(registry.steps_count("email_gathering"), Some(2));
        assert_eq!(
            registry.page_for_step("email_gathering", 2).as_deref(),
            Some("/uma/gather/email_2.htm")
        );
        assert!(registry.page_for_step("email_gathering", 3).is_none());
        assert!(registry.page_for_step("email_gathering", 0).is_none());
        assert!(registry.steps_count("country_gathering").is_none());
    }
}
