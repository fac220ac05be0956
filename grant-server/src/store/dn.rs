//! Distinguished name helpers

use super::StoreError;

/// One `attribute=value` assertion of a DN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    pub attribute: String,
    pub value: String,
}

/// Splits `input` on every unescaped occurrence of `separator`
fn split_unescaped(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            result.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            result.push(c);
        }
    }
    result
}

/// Escapes the characters that carry meaning inside a DN value
pub fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '=' | '\\' | '"' | '<' | '>' | ';') {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Parses a DN into its assertions, leftmost first.
///
/// Multi-valued RDNs (`a=1+b=2`) are flattened into consecutive assertions.
pub fn parse(dn: &str) -> Result<Vec<Rdn>, StoreError> {
    if dn.trim().is_empty() {
        return Err(StoreError::InvalidDn(dn.to_string()));
    }

    let mut result = Vec::new();
    for component in split_unescaped(dn, ',') {
        for assertion in split_unescaped(&component, '+') {
            let (attribute, value) = assertion
                .split_once('=')
                .ok_or_else(|| StoreError::InvalidDn(dn.to_string()))?;
            let attribute = attribute.trim();
            if attribute.is_empty() || attribute.contains('\\') {
                return Err(StoreError::InvalidDn(dn.to_string()));
            }
            result.push(Rdn {
                attribute: attribute.to_string(),
                value: unescape(value.trim()),
            });
        }
    }
    Ok(result)
}

/// Canonical form used for DN comparisons
pub fn normalize(dn: &str) -> String {
    split_unescaped(dn, ',')
        .iter()
        .map(|component| component.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parent DN, or `None` for a single component DN
pub fn parent(dn: &str) -> Option<String> {
    let components = split_unescaped(dn, ',');
    if components.len() < 2 {
        return None;
    }
    Some(
        components[1..]
            .iter()
            .map(|c| c.trim())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// True if `dn` equals `base` or lies underneath it
pub fn is_within(dn: &str, base: &str) -> bool {
    let dn = normalize(dn);
    let base = normalize(base);
    dn == base || dn.ends_with(&format!(",{}", base))
}

/// First value of `attribute` in `dn`, matched case-insensitively
pub fn first_value(dn: &str, attribute: &str) -> Result<Option<String>, StoreError> {
    Ok(parse(dn)?
        .into_iter()
        .find(|rdn| rdn.attribute.eq_ignore_ascii_case(attribute))
        .map(|rdn| rdn.value))
}

/// Client id (`inum` component) of a token entry DN.
///
/// Malformed or blank DNs yield an empty string.
pub fn extract_client_id_from_token_dn(dn: &str) -> String {
    if dn.trim().is_empty() {
        return String::new();
    }
    match first_value(dn, "inum") {
        Ok(Some(value)) => value,
        Ok(None) => String::new(),
        Err(e) => {
            log::trace!("Unable to extract client id from DN '{}': {}", dn, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_dn() {
        let rdns = parse("uniqueIdentifier=abc,grantId=g1,inum=client-1,ou=clients,o=authz").unwrap();
        assert_eq!(rdns.len(), 5);
        assert_eq!(rdns[0].attribute, "uniqueIdentifier");
        assert_eq!(rdns[2].value, "client-1");
    }

    #[test]
    fn test_parse_escaped_comma() {
        let rdns = parse(r"cn=Smith\, John,ou=people").unwrap();
        assert_eq!(rdns[0].value, "Smith, John");
        assert_eq!(rdns[1].value, "people");
    }

    #[test]
    fn test_extract_client_id() {
        assert_eq!(
            extract_client_id_from_token_dn(
                "uniqueIdentifier=t1,grantId=g1,inum=@!1111!0008,ou=clients,o=authz"
            ),
            "@!1111!0008"
        );
        assert_eq!(extract_client_id_from_token_dn("INUM=abc,o=authz"), "abc");
    }

    #[test]
    fn test_extract_client_id_tolerates_malformed_input() {
        assert_eq!(extract_client_id_from_token_dn(""), "");
        assert_eq!(extract_client_id_from_token_dn("   "), "");
        assert_eq!(extract_client_id_from_token_dn("not a dn"), "");
        assert_eq!(extract_client_id_from_token_dn("=value,inum=x"), "");
        assert_eq!(extract_client_id_from_token_dn("ou=clients,o=authz"), "");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("inum=1,ou=clients,o=authz", "ou=clients,o=authz"));
        assert!(is_within("ou=clients,o=authz", "OU=Clients, o=authz"));
        assert!(!is_within("inum=1,ou=people,o=authz", "ou=clients,o=authz"));
        assert!(!is_within("inum=1,xou=clients,o=authz", "ou=clients,o=authz"));
    }

    #[test]
    fn test_parent() {
        assert_eq!(
            parent("ticket=t,ou=uma_permission,inum=c"),
            Some("ou=uma_permission,inum=c".to_string())
        );
        assert_eq!(parent("o=authz"), None);
    }

    #[test]
    fn test_escape_round_trip_through_parse() {
        let dn = format!("cn={},o=authz", escape("a,b+c"));
        assert_eq!(first_value(&dn, "cn").unwrap(), Some("a,b+c".to_string()));
    }
}
