//! Resource Name Normalization
//!
//! Turns free-form remote names (realm names, client IDs, role names) into
//! identifiers that are valid resource names in the emitted configuration.

/// Placeholder used when a raw name has no usable characters
pub const EMPTY_NAME_PLACEHOLDER: &str = "unnamed";

/// Normalize a raw remote name into a configuration identifier.
///
/// The result only contains `[a-z0-9_]`, never starts or ends with `_`,
/// never contains `__`, never starts with a digit and is never empty.
/// Applying it twice yields the same value as applying it once.
pub fn normalize_resource_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());

    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };

        if c == '_' && (name.is_empty() || name.ends_with('_')) {
            continue;
        }
        name.push(c);
    }

    while name.ends_with('_') {
        name.pop();
    }

    if name.is_empty() {
        return EMPTY_NAME_PLACEHOLDER.to_string();
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "n_");
    }

    name
}

/// Join already-normalized parts into one symbolic name
pub fn join_name_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts.into_iter().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_punctuation_and_whitespace() {
        assert_eq!(normalize_resource_name("My Client"), "my_client");
        assert_eq!(normalize_resource_name("my-client.app"), "my_client_app");
        assert_eq!(normalize_resource_name("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_collapses_and_trims_separators() {
        assert_eq!(normalize_resource_name("--a  --  b--"), "a_b");
        assert_eq!(normalize_resource_name("__x__"), "x");
    }

    #[test]
    fn test_empty_input_falls_back_to_placeholder() {
        assert_eq!(normalize_resource_name(""), EMPTY_NAME_PLACEHOLDER);
        assert_eq!(normalize_resource_name("$$$"), EMPTY_NAME_PLACEHOLDER);
        assert_eq!(normalize_resource_name("ünïcødé"), "n_c_d");
    }

    #[test]
    fn test_leading_digit_gets_prefix() {
        assert_eq!(normalize_resource_name("1st-realm"), "n_1st_realm");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            "My-Client",
            "My_Client",
            "  spaced  out ",
            "123",
            "_leading",
            "${interpolated}",
            "realm-management",
            "Ελληνικά",
            "a__b__c",
        ];

        for input in inputs {
            let once = normalize_resource_name(input);
            let twice = normalize_resource_name(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
            assert!(!once.is_empty());
        }
    }

    #[test]
    fn test_distinct_names_can_collapse() {
        assert_eq!(
            normalize_resource_name("My-Client"),
            normalize_resource_name("My_Client")
        );
    }

    #[test]
    fn test_join_name_parts() {
        assert_eq!(join_name_parts(["realm", "master"]), "realm_master");
    }
}
