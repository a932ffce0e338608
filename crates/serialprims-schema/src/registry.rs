use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::kind::MessageKind;

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Kind-keyed registry of compiled payload schemas.
///
/// The envelope itself is checked by the [`Verifier`](crate::Verifier); this
/// registry adds a second, optional gate on the payload of each kind.
pub struct SchemaRegistry {
    validators: HashMap<MessageKind, Validator>,
    config: SchemaConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(SchemaConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a payload schema for a kind from a JSON string.
    pub fn register(&mut self, kind: MessageKind, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)
            .map_err(|err| SchemaError::CompileFailed(format!("{kind}: {err}")))?;
        self.register_value(kind, &schema)
    }

    /// Register a payload schema for a kind from a JSON value.
    pub fn register_value(&mut self, kind: MessageKind, schema: &Value) -> Result<()> {
        let mut schema = schema.clone();
        if self.config.strict_mode {
            apply_strict_mode(&mut schema);
        }

        let compiled = jsonschema::validator_for(&schema)
            .map_err(|err| SchemaError::CompileFailed(format!("{kind}: {err}")))?;
        self.validators.insert(kind, compiled);
        Ok(())
    }

    /// Load from embedded schema strings.
    pub fn from_embedded(schemas: &[(MessageKind, &str)]) -> Result<Self> {
        Self::from_embedded_with_config(schemas, SchemaConfig::default())
    }

    pub fn from_embedded_with_config(
        schemas: &[(MessageKind, &str)],
        config: SchemaConfig,
    ) -> Result<Self> {
        let mut registry = Self::with_config(config);
        for (kind, schema) in schemas {
            registry.register(*kind, schema)?;
        }
        Ok(registry)
    }

    /// Load schemas from a directory with default config.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, SchemaConfig::default())
    }

    /// Load `<kind>.schema.json` / `kind_<n>.schema.json` files from a
    /// directory.
    ///
    /// Schema symlinks, unrecognized schema names, and files or counts above
    /// the configured limits are errors. Other files are ignored.
    pub fn from_directory_with_config(path: &Path, config: SchemaConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if !file_name.ends_with(SCHEMA_SUFFIX) {
                continue;
            }

            let entry_path = entry.path();
            let file_type = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?
                .file_type();
            if file_type.is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !file_type.is_file() {
                continue;
            }

            let kind = kind_from_file_name(&file_name).ok_or_else(|| {
                SchemaError::LoadFailed(format!("unrecognized schema filename: {file_name}"))
            })?;

            loaded += 1;
            if loaded > config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({})",
                    config.max_schemas_from_directory
                )));
            }

            let content = read_bounded(&entry_path, config.max_schema_file_size)?;
            registry.register(kind, &content)?;
            debug!(%kind, path = %entry_path.display(), "loaded payload schema");
        }

        Ok(registry)
    }

    /// Validate a payload against the schema for `kind`.
    ///
    /// Kinds without a schema pass unless `fail_on_missing_schema` is set.
    pub fn validate(&self, kind: MessageKind, payload: &str) -> Result<()> {
        let Some(validator) = self.validators.get(&kind) else {
            if self.config.fail_on_missing_schema {
                return Err(SchemaError::NoSchema(kind));
            }
            return Ok(());
        };

        let value: Value =
            serde_json::from_str(payload).map_err(|err| SchemaError::Malformed(err.to_string()))?;

        let mut errors = validator.iter_errors(&value);
        if let Some(first) = errors.next() {
            let mut message = first.to_string();
            for err in errors.take(3) {
                message.push_str("; ");
                message.push_str(&err.to_string());
            }
            return Err(SchemaError::ValidationFailed { kind, message });
        }

        Ok(())
    }

    /// Check if a kind has a registered schema.
    pub fn has_schema(&self, kind: MessageKind) -> bool {
        self.validators.contains_key(&kind)
    }

    /// Kinds that have registered schemas, in discriminator order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<MessageKind> = self.validators.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_from_file_name(file_name: &str) -> Option<MessageKind> {
    let stem = file_name.strip_suffix(SCHEMA_SUFFIX)?;
    match stem.strip_prefix("kind_") {
        Some(number) => number.parse::<u8>().ok().and_then(MessageKind::from_u8),
        None => MessageKind::ALL.into_iter().find(|kind| kind.name() == stem),
    }
}

fn read_bounded(path: &Path, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
    })?;

    let limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(limit).read_to_string(&mut content).map_err(|err| {
        SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
    })?;

    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large (max {max_bytes} bytes): {}",
            path.display()
        )));
    }
    Ok(content)
}

/// Close every object schema to properties it does not declare.
fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in ["properties", "patternProperties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(apply_strict_mode);
                }
            }
            for key in ["items", "additionalProperties", "not", "if", "then", "else"] {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
            for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(apply_strict_mode);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(apply_strict_mode),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|kind| matches!(kind, Value::String(kind) if kind == "object")),
        _ => ["properties", "required", "patternProperties"]
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const TEST_INFO_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "id": { "type": "integer", "minimum": 0 }
        },
        "required": ["id"]
    }"#;

    fn make_temp_schema_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "serialprims-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn register_and_validate() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(MessageKind::TestInfo, TEST_INFO_SCHEMA)
            .unwrap();

        assert!(registry.validate(MessageKind::TestInfo, r#"{"id":1}"#).is_ok());
        assert!(matches!(
            registry.validate(MessageKind::TestInfo, r#"{"id":"one"}"#),
            Err(SchemaError::ValidationFailed {
                kind: MessageKind::TestInfo,
                ..
            })
        ));
    }

    #[test]
    fn missing_schema_permissive_by_default() {
        let registry = SchemaRegistry::new();
        assert!(registry.validate(MessageKind::Echo, r#"{"any":1}"#).is_ok());
    }

    #[test]
    fn missing_schema_fails_when_required() {
        let registry = SchemaRegistry::with_config(SchemaConfig {
            fail_on_missing_schema: true,
            ..SchemaConfig::default()
        });
        assert!(matches!(
            registry.validate(MessageKind::Echo, "{}"),
            Err(SchemaError::NoSchema(MessageKind::Echo))
        ));
    }

    #[test]
    fn strict_mode_rejects_undeclared_properties() {
        let payload = r#"{"id":1,"extra":true}"#;

        let permissive =
            SchemaRegistry::from_embedded(&[(MessageKind::TestInfo, TEST_INFO_SCHEMA)]).unwrap();
        let strict = SchemaRegistry::from_embedded_with_config(
            &[(MessageKind::TestInfo, TEST_INFO_SCHEMA)],
            SchemaConfig {
                strict_mode: true,
                ..SchemaConfig::default()
            },
        )
        .unwrap();

        assert!(permissive.validate(MessageKind::TestInfo, payload).is_ok());
        assert!(strict.validate(MessageKind::TestInfo, payload).is_err());
    }

    #[test]
    fn strict_mode_reaches_nested_objects() {
        let schema = r#"{
            "type": "object",
            "properties": {
                "inner": { "properties": { "v": { "type": "integer" } } }
            }
        }"#;
        let strict = SchemaRegistry::from_embedded_with_config(
            &[(MessageKind::Echo, schema)],
            SchemaConfig {
                strict_mode: true,
                ..SchemaConfig::default()
            },
        )
        .unwrap();

        assert!(strict
            .validate(MessageKind::Echo, r#"{"inner":{"v":1}}"#)
            .is_ok());
        assert!(strict
            .validate(MessageKind::Echo, r#"{"inner":{"v":1,"w":2}}"#)
            .is_err());
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register(MessageKind::Ping, r#"{"type":"definitely-not-a-type"}"#),
            Err(SchemaError::CompileFailed(_))
        ));
        assert!(matches!(
            registry.register(MessageKind::Ping, "not json"),
            Err(SchemaError::CompileFailed(_))
        ));
    }

    #[test]
    fn from_directory_resolves_names_and_numbers() {
        let dir = make_temp_schema_dir("names");
        std::fs::write(dir.join("test_info.schema.json"), TEST_INFO_SCHEMA).unwrap();
        std::fs::write(dir.join("kind_2.schema.json"), r#"{"type":"object"}"#).unwrap();
        std::fs::write(dir.join("README.md"), "ignored").unwrap();

        let registry = SchemaRegistry::from_directory(&dir).unwrap();
        assert_eq!(
            registry.kinds(),
            vec![MessageKind::TestInfo, MessageKind::Echo]
        );
        assert!(registry.has_schema(MessageKind::Echo));
        assert!(!registry.has_schema(MessageKind::Ping));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_directory_rejects_unknown_schema_name() {
        let dir = make_temp_schema_dir("unknown");
        std::fs::write(dir.join("telemetry.schema.json"), TEST_INFO_SCHEMA).unwrap();

        assert!(matches!(
            SchemaRegistry::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn schema_limits_are_enforced() {
        let dir = make_temp_schema_dir("limits");
        std::fs::write(dir.join("echo.schema.json"), TEST_INFO_SCHEMA).unwrap();
        std::fs::write(dir.join("ping.schema.json"), TEST_INFO_SCHEMA).unwrap();

        let too_many = SchemaRegistry::from_directory_with_config(
            &dir,
            SchemaConfig {
                max_schemas_from_directory: 1,
                ..SchemaConfig::default()
            },
        );
        assert!(matches!(too_many, Err(SchemaError::LoadFailed(_))));

        let too_big = SchemaRegistry::from_directory_with_config(
            &dir,
            SchemaConfig {
                max_schema_file_size: 8,
                ..SchemaConfig::default()
            },
        );
        assert!(matches!(too_big, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_schema_is_rejected() {
        let dir = make_temp_schema_dir("symlink");
        let target = dir.join("target.json");
        std::fs::write(&target, TEST_INFO_SCHEMA).unwrap();
        std::os::unix::fs::symlink(&target, dir.join("echo.schema.json")).unwrap();

        assert!(matches!(
            SchemaRegistry::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_name_resolution() {
        assert_eq!(
            kind_from_file_name("ping.schema.json"),
            Some(MessageKind::Ping)
        );
        assert_eq!(
            kind_from_file_name("kind_4.schema.json"),
            Some(MessageKind::Error)
        );
        assert_eq!(kind_from_file_name("kind_0.schema.json"), None);
        assert_eq!(kind_from_file_name("kind_300.schema.json"), None);
        assert_eq!(kind_from_file_name("ping.json"), None);
    }
}
