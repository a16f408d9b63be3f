//! Module loaders for declarative module files.
//!
//! A module file is a map of export name to value. Map-valued exports are
//! descriptors; anything else is a primitive export. Descriptor fields
//! `path`, `method`, `name` and `rule` must be strings, handler fields
//! (`onRequest`, `onGuard`, `onEvent`, `onJob`) must be command specs,
//! and every other field is kept as documentation.

use crate::command::{CommandHandler, CommandSpec};
use crate::resolver::ResolverOptions;
use async_trait::async_trait;
use faas_types::{
    EventHandler, ExportValue, FunctionDescriptor, GuardHandler, JobHandler, LoadError,
    ModuleExports, ModuleLoader, RequestHandler,
};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

fn invalid(path: &Path, message: impl Into<String>) -> LoadError {
    LoadError::InvalidModule {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn string_field(path: &Path, export: &str, key: &str, value: Value) -> Result<String, LoadError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(
            path,
            format!("field `{key}` of `{export}` must be a string, got {other}"),
        )),
    }
}

fn descriptor_from_map(
    path: &Path,
    export: &str,
    map: Map<String, Value>,
    options: &ResolverOptions,
) -> Result<FunctionDescriptor, LoadError> {
    let module_dir = path.parent().unwrap_or(Path::new("."));
    let command = |key: &str, value: &Value| -> Result<Arc<CommandHandler>, LoadError> {
        let spec = CommandSpec::from_value(value)
            .map_err(|e| invalid(path, format!("handler `{key}` of `{export}`: {e}")))?;
        Ok(Arc::new(CommandHandler::new(
            export,
            spec,
            module_dir,
            options.handler_timeout,
        )))
    };

    let mut descriptor = FunctionDescriptor::default();
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            "path" => descriptor.path = Some(string_field(path, export, &key, value)?),
            "method" => descriptor.method = Some(string_field(path, export, &key, value)?),
            "name" => descriptor.name = Some(string_field(path, export, &key, value)?),
            "rule" => descriptor.rule = Some(string_field(path, export, &key, value)?),
            "onRequest" => {
                let handler: Arc<dyn RequestHandler> = command(&key, &value)?;
                descriptor.on_request = Some(handler);
            }
            "onGuard" => {
                let handler: Arc<dyn GuardHandler> = command(&key, &value)?;
                descriptor.on_guard = Some(handler);
            }
            "onEvent" => {
                let handler: Arc<dyn EventHandler> = command(&key, &value)?;
                descriptor.on_event = Some(handler);
            }
            "onJob" => {
                let handler: Arc<dyn JobHandler> = command(&key, &value)?;
                descriptor.on_job = Some(handler);
            }
            _ => {
                descriptor.docs.insert(key, value);
            }
        }
    }
    Ok(descriptor)
}

/// Turn a parsed module file into its exports.
pub fn module_from_value(
    path: &Path,
    value: Value,
    options: &ResolverOptions,
) -> Result<ModuleExports, LoadError> {
    let Value::Object(top) = value else {
        return Err(invalid(path, "top level must be a map of exports"));
    };
    let mut exports = ModuleExports::new();
    for (name, value) in top {
        let export = match value {
            Value::Object(map) => {
                ExportValue::Descriptor(descriptor_from_map(path, &name, map, options)?)
            }
            other => ExportValue::Primitive(other),
        };
        exports.push(name, export);
    }
    Ok(exports)
}

async fn read(path: &Path) -> Result<String, LoadError> {
    Ok(tokio::fs::read_to_string(path).await?)
}

fn parse_error(path: &Path, error: impl std::fmt::Display) -> LoadError {
    LoadError::Parse {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Loads `*.fn.json` files.
#[derive(Debug, Clone, Default)]
pub struct JsonModuleLoader {
    options: ResolverOptions,
}

impl JsonModuleLoader {
    /// Create a loader whose handlers use `options`.
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ModuleLoader for JsonModuleLoader {
    fn suffixes(&self) -> &[&'static str] {
        &[".fn.json"]
    }

    async fn load(&self, path: &Path) -> Result<ModuleExports, LoadError> {
        let text = read(path).await?;
        let value: Value = serde_json::from_str(&text).map_err(|e| parse_error(path, e))?;
        module_from_value(path, value, &self.options)
    }
}

/// Loads `*.fn.toml` files.
#[derive(Debug, Clone, Default)]
pub struct TomlModuleLoader {
    options: ResolverOptions,
}

impl TomlModuleLoader {
    /// Create a loader whose handlers use `options`.
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ModuleLoader for TomlModuleLoader {
    fn suffixes(&self) -> &[&'static str] {
        &[".fn.toml"]
    }

    async fn load(&self, path: &Path) -> Result<ModuleExports, LoadError> {
        let text = read(path).await?;
        let value: Value = toml::from_str(&text).map_err(|e| parse_error(path, e))?;
        module_from_value(path, value, &self.options)
    }
}

/// Loads `*.fn.yaml` and `*.fn.yml` files.
#[derive(Debug, Clone, Default)]
pub struct YamlModuleLoader {
    options: ResolverOptions,
}

impl YamlModuleLoader {
    /// Create a loader whose handlers use `options`.
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ModuleLoader for YamlModuleLoader {
    fn suffixes(&self) -> &[&'static str] {
        &[".fn.yaml", ".fn.yml"]
    }

    async fn load(&self, path: &Path) -> Result<ModuleExports, LoadError> {
        let text = read(path).await?;
        let value: Value = serde_yaml::from_str(&text).map_err(|e| parse_error(path, e))?;
        module_from_value(path, value, &self.options)
    }
}
