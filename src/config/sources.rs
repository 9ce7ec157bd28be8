//! `config` crate sources for command-line arguments and key/value overlays.
//!
//! Both sources take colon-delimited keys (`Database:Password`) and hand the
//! `config` crate lowercase dotted paths. [`CaseFolded`] does the same for
//! sources this crate does not own, such as settings files.

use std::fmt;

use config::{ConfigError, Map, Source, Value, ValueKind};

use super::keys::to_config_path;

/// Settings passed as process arguments.
///
/// Recognised forms:
///
/// ```text
/// --Key=value   /Key=value   Key=value
/// --Key value   /Key value
/// ```
///
/// A prefixed key with nothing after it, and anything else, is skipped.
#[derive(Debug, Clone, Default)]
pub struct CommandLineSource {
    args: Vec<String>,
}

impl CommandLineSource {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { args: args.into_iter().map(Into::into).collect() }
    }

    /// Arguments of the current process, program name excluded.
    pub fn from_process() -> Self {
        Self::new(std::env::args().skip(1))
    }

    /// Parse into `(colon key, value)` pairs in argument order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut args = self.args.iter();

        while let Some(arg) = args.next() {
            let (body, prefixed) = if let Some(rest) = arg.strip_prefix("--") {
                (rest, true)
            } else if let Some(rest) = arg.strip_prefix('/') {
                (rest, true)
            } else if arg.starts_with('-') {
                tracing::debug!(argument = %arg, "Skipping unrecognised argument");
                continue;
            } else {
                (arg.as_str(), false)
            };

            let (key, value) = match body.split_once('=') {
                Some((key, value)) => (key, value.to_string()),
                None if prefixed => match args.next() {
                    Some(value) => (body, value.clone()),
                    None => {
                        tracing::debug!(argument = %arg, "Argument has no value, skipping");
                        continue;
                    }
                },
                None => continue,
            };

            if key.trim().is_empty() {
                continue;
            }
            pairs.push((key.trim().to_string(), value));
        }

        pairs
    }
}

impl Source for CommandLineSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(collect_pairs(self.pairs(), "command line"))
    }
}

/// An ordered set of key/value pairs layered on top of other sources.
///
/// Used for in-memory overrides and for fetched secrets. Later entries win
/// over earlier ones with the same key. `Debug` prints keys only.
#[derive(Clone, Default)]
pub struct KeyValueSource {
    name: String,
    entries: Vec<(String, String)>,
}

impl KeyValueSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: Vec::new() }
    }

    pub fn with_entries<I, K, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::new(name);
        source.extend(entries);
        source
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for KeyValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueSource")
            .field("name", &self.name)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Source for KeyValueSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(collect_pairs(self.entries.iter().cloned(), &self.name))
    }
}

/// Wraps another source and lowercases every key it collects, nested
/// tables included, so it shares one key space with the other layers.
pub struct CaseFolded {
    inner: Box<dyn Source + Send + Sync>,
}

impl CaseFolded {
    pub fn new<S>(inner: S) -> Self
    where
        S: Source + Send + Sync + 'static,
    {
        Self { inner: Box::new(inner) }
    }
}

impl Clone for CaseFolded {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone_into_box() }
    }
}

impl fmt::Debug for CaseFolded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CaseFolded").field(&self.inner).finish()
    }
}

impl Source for CaseFolded {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(fold_table(self.inner.collect()?))
    }
}

fn fold_table(table: Map<String, Value>) -> Map<String, Value> {
    table.into_iter().map(|(key, value)| (key.to_lowercase(), fold_value(value))).collect()
}

fn fold_value(mut value: Value) -> Value {
    match &mut value.kind {
        ValueKind::Table(table) => *table = fold_table(std::mem::take(table)),
        ValueKind::Array(items) => {
            for item in items.iter_mut() {
                *item = fold_value(std::mem::take(item));
            }
        }
        _ => {}
    }
    value
}

fn collect_pairs<I>(pairs: I, origin: &str) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let origin = origin.to_string();
    let mut map = Map::new();
    for (key, value) in pairs {
        let path = to_config_path(&key);
        if path.is_empty() {
            continue;
        }
        map.insert(path, Value::new(Some(&origin), value));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<(String, String)> {
        CommandLineSource::new(raw.iter().copied()).pairs()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_command_line_forms() {
        assert_eq!(
            args(&["--a=1", "/b=2", "c=3", "--d", "4", "/e", "5"]),
            vec![pair("a", "1"), pair("b", "2"), pair("c", "3"), pair("d", "4"), pair("e", "5")]
        );
    }

    #[test]
    fn test_command_line_skips_unusable_arguments() {
        assert_eq!(args(&["positional", "-x", "--dangling"]), Vec::<(String, String)>::new());
        assert_eq!(args(&["--=x", "--k=a=b"]), vec![pair("k", "a=b")]);
    }

    #[test]
    fn test_command_line_source_builds_nested_config() {
        let config = config::Config::builder()
            .add_source(CommandLineSource::new(["--database:host=db.local", "--database:port", "5432"]))
            .build()
            .unwrap();

        assert_eq!(config.get_string("database.host").unwrap(), "db.local");
        assert_eq!(config.get_int("database.port").unwrap(), 5432);
    }

    #[test]
    fn test_key_value_source_last_write_wins() {
        let mut source = KeyValueSource::new("overrides");
        source.insert("app:name", "first");
        source.insert("app:name", "second");
        source.insert("app:mode", "fast");

        let map = source.collect().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["app.name"].clone().into_string().unwrap(), "second");
    }

    #[test]
    fn test_key_value_source_folds_case() {
        let source = KeyValueSource::with_entries("overrides", [("App:Name", "first"), ("app:NAME", "second")]);
        let map = source.collect().unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map["app.name"].clone().into_string().unwrap(), "second");
    }

    #[test]
    fn test_case_folded_lowercases_nested_file_keys() {
        let json = r#"{ "Database": { "Host": "db.local", "Replicas": [ { "Url": "r1" } ] } }"#;
        let config = config::Config::builder()
            .add_source(CaseFolded::new(config::File::from_str(json, config::FileFormat::Json)))
            .add_source(KeyValueSource::with_entries("overrides", [("DATABASE:HOST", "db.override")]))
            .build()
            .unwrap();

        assert_eq!(config.get_string("database.host").unwrap(), "db.override");
        assert_eq!(config.get_string("database.replicas[0].url").unwrap(), "r1");
        assert!(config.get_string("Database.Host").is_err());
    }

    #[test]
    fn test_key_value_source_debug_hides_values() {
        let source = KeyValueSource::with_entries("secrets", [("db-password", "hunter2")]);
        let debug = format!("{:?}", source);

        assert!(debug.contains("db-password"));
        assert!(!debug.contains("hunter2"));
    }
}
