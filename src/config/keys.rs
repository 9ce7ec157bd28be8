//! # Key Normalization
//!
//! Key vault secret names cannot contain `:`, so nested settings are written
//! with `--` instead (`Database--Password`). These helpers turn such names
//! into colon-delimited paths (`Database:Password`) and add a condensed alias
//! with dashes dropped (`My-Key-1` → `MyKey1`) so a flat secret name can bind
//! to a field name without punctuation. Both spellings are kept.
//!
//! Colon paths are the public key syntax of this crate. The `config` crate
//! uses dots, see [`to_config_path`]. Keys are case-insensitive: every
//! source stores them lowercased, so `Database:Password` and
//! `database:password` name the same setting.

/// Separator secret names use in place of `:`.
pub const VAULT_SEPARATOR: &str = "--";

/// Delimiter of hierarchical keys.
pub const KEY_DELIMITER: char = ':';

/// Replace every `--` with `:`.
pub fn to_hierarchical(raw: &str) -> String {
    raw.replace(VAULT_SEPARATOR, ":")
}

/// Keys under which a secret named `raw` is published.
///
/// The first entry is the hierarchical key, prefixed with `prefix:` when a
/// prefix is given. If the secret part still contains `-`, a second entry
/// follows with those dashes removed. The prefix itself is never condensed.
///
/// ```
/// use vaultbind::config::keys::normalize_secret_key;
///
/// assert_eq!(
///     normalize_secret_key("My-Key-1", Some("base")),
///     vec!["base:My-Key-1".to_string(), "base:MyKey1".to_string()]
/// );
/// assert_eq!(normalize_secret_key("Db--Host", None), vec!["Db:Host".to_string()]);
/// ```
pub fn normalize_secret_key(raw: &str, prefix: Option<&str>) -> Vec<String> {
    let hierarchical = to_hierarchical(raw);
    let prefix = prefix.map(|p| p.trim_end_matches(KEY_DELIMITER)).filter(|p| !p.is_empty());

    let with_prefix = |key: &str| match prefix {
        Some(p) => format!("{}{}{}", p, KEY_DELIMITER, key),
        None => key.to_string(),
    };

    let mut keys = vec![with_prefix(&hierarchical)];
    if hierarchical.contains('-') {
        keys.push(with_prefix(&hierarchical.replace('-', "")));
    }
    keys
}

/// Expand `(secret name, value)` pairs into `(key, value)` pairs, keeping
/// input order and emitting the hierarchical key before its alias.
pub fn normalize_entries<I, V>(entries: I, prefix: Option<&str>) -> Vec<(String, V)>
where
    I: IntoIterator<Item = (String, V)>,
    V: Clone,
{
    entries
        .into_iter()
        .flat_map(|(raw, value)| {
            normalize_secret_key(&raw, prefix)
                .into_iter()
                .map(move |key| (key, value.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Colon path → lowercase `config` crate path. Empty segments are dropped.
pub fn to_config_path(key: &str) -> String {
    key.split(KEY_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_double_dash_becomes_path() {
        assert_eq!(to_hierarchical("Database--Password"), "Database:Password");
        assert_eq!(normalize_secret_key("Database--Password", None), vec!["Database:Password"]);
    }

    #[test]
    fn test_dashed_key_gets_condensed_alias() {
        assert_eq!(
            normalize_secret_key("My-Key-1", Some("base")),
            vec!["base:My-Key-1".to_string(), "base:MyKey1".to_string()]
        );
        assert_eq!(
            normalize_secret_key("Api--Client-Id", None),
            vec!["Api:Client-Id".to_string(), "Api:ClientId".to_string()]
        );
    }

    #[test]
    fn test_prefix_is_not_condensed() {
        assert_eq!(
            normalize_secret_key("db-password", Some("my-app:")),
            vec!["my-app:db-password".to_string(), "my-app:dbpassword".to_string()]
        );
        assert_eq!(normalize_secret_key("token", Some("")), vec!["token"]);
    }

    #[test]
    fn test_normalize_entries_keeps_order() {
        let entries = vec![
            ("a-b".to_string(), "1".to_string()),
            ("C--D".to_string(), "2".to_string()),
        ];
        let keys: Vec<_> = normalize_entries(entries, None).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a-b", "ab", "C:D"]);
    }

    #[test]
    fn test_to_config_path() {
        assert_eq!(to_config_path("Database:Password"), "database.password");
        assert_eq!(to_config_path("base:My-Key-1"), "base.my-key-1");
        assert_eq!(to_config_path(":leading::double:"), "leading.double");
        assert_eq!(to_config_path("flat"), "flat");
    }

    proptest! {
        #[test]
        fn prop_hierarchical_keys_are_fixed_points(segments in prop::collection::vec("[A-Za-z0-9]{1,8}", 1..5)) {
            let key = segments.join(":");
            prop_assert_eq!(normalize_secret_key(&key, None), vec![key.clone()]);
        }

        #[test]
        fn prop_normalization_is_idempotent(raw in "[A-Za-z0-9-]{1,24}") {
            let first = normalize_secret_key(&raw, Some("base"));
            let hierarchical = first[0].strip_prefix("base:").unwrap().to_string();
            prop_assert_eq!(normalize_secret_key(&hierarchical, Some("base")), first.clone());

            prop_assert!(!first[0].contains(VAULT_SEPARATOR));
            if let Some(alias) = first.get(1) {
                prop_assert!(!alias.strip_prefix("base:").unwrap().contains('-'));
            }
        }
    }
}
