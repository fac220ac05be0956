use super::pct::UmaPct;
use serde_json::{Map, Value};

/// Claims known about the requesting party during one authorization request.
///
/// Combines the claims of the pushed claim token, the claims persisted in the PCT
/// and claims added while the request is evaluated. Lookups check the added claims
/// first, then the claim token, then the PCT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    claim_token: Map<String, Value>,
    pct: Map<String, Value>,
    ad_hoc: Map<String, Value>,
}

impl Claims {
    pub fn new(claim_token: Option<Map<String, Value>>, pct: Option<&UmaPct>) -> Self {
        Self {
            claim_token: claim_token.unwrap_or_default(),
            pct: pct.map(|pct| pct.claims.clone()).unwrap_or_default(),
            ad_hoc: Map::new(),
        }
    }

    pub fn claim_token_claim(&self, key: &str) -> Option<&Value> {
        self.claim_token.get(key)
    }

    pub fn pct_claim(&self, key: &str) -> Option<&Value> {
        self.pct.get(key)
    }

    /// The claim token claims as a JSON object, `None` without a claim token
    pub fn claim_token_as_string(&self) -> Option<String> {
        if self.claim_token.is_empty() {
            return None;
        }
        Some(Value::Object(self.claim_token.clone()).to_string())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ad_hoc
            .get(name)
            .or_else(|| self.claim_token.get(name))
            .or_else(|| self.pct.get(name))
            .filter(|value| !value.is_null())
    }

    pub fn put(&mut self, name: impl Into<String>, value: Value) {
        self.ad_hoc.insert(name.into(), value);
    }

    /// Forgets the claim in every source
    pub fn remove(&mut self, name: &str) {
        self.ad_hoc.remove(name);
        self.claim_token.remove(name);
        self.pct.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_lookup_order_and_removal() {
        let mut claims = Claims::new(
            Some(map(json!({"email": "token@example.org", "nickname": null}))),
            None,
        );
        assert!(claims.has("email"));
        assert!(!claims.has("nickname"));
        assert!(claims.claim_token_as_string().unwrap().contains("token@example.org"));

        claims.put("email", json!("added@example.org"));
        assert_eq!(claims.get("email"), Some(&json!("added@example.org")));
        assert_eq!(
            claims.claim_token_claim("email"),
            Some(&json!("token@example.org"))
        );

        claims.remove("email");
        assert!(!claims.has("email"));
        assert!(Claims::default().claim_token_as_string().is_none());
    }
}
