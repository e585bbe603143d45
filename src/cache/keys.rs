//! Distributed-tier key namespacing: `config:{application}:{key}`.

const NAMESPACE: &str = "config";

/// Key under which `key` of `application_name` lives in the distributed tier.
pub fn entry_key(application_name: &str, key: &str) -> String {
    format!("{NAMESPACE}:{application_name}:{key}")
}

/// Prefix shared by every distributed key of `application_name`.
pub fn application_prefix(application_name: &str) -> String {
    format!("{NAMESPACE}:{application_name}:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_keys_are_namespaced_by_application() {
        assert_eq!(
            entry_key("SERVICE-A", "MaxItemCount"),
            "config:SERVICE-A:MaxItemCount"
        );
        assert!(entry_key("SERVICE-A", "MaxItemCount").starts_with(&application_prefix("SERVICE-A")));
        assert!(!entry_key("SERVICE-AB", "x").starts_with(&application_prefix("SERVICE-A")));
    }
}
