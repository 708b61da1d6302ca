//! JSON Schema validation for report configuration documents.
//!
//! This is the structural half of config validation: required fields, value
//! types and ranges. Cross-field rules (type/config agreement, data source
//! tags, connection references) are checked afterwards in
//! [`crate::config::ReportConfig::from_value`], where they can produce typed
//! errors.
//!
//! # Example
//! ```rust
//! use reportgen_core::validation::validate_config_document;
//! use serde_json::json;
//!
//! let document = json!({
//!     "sections": [{
//!         "section_id": "summary",
//!         "type": "table",
//!         "grid": {"row_number": 0, "col_start": 0, "col_end": 12},
//!         "config": {"columns": []}
//!     }]
//! });
//! assert!(validate_config_document(&document).is_ok());
//! ```

use jsonschema::Validator;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// JSON Schema validation errors with field-level reporting
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Schema compilation failed during initialization
    #[error("JSON Schema compilation failed: {message}")]
    SchemaCompilation { message: String },

    /// Validation failed with specific field errors
    #[error("{error_count} validation error(s): {}", .errors.join("; "))]
    ValidationFailed {
        error_count: usize,
        errors: Vec<String>,
    },
}

/// Embedded JSON Schema for report configuration documents
const CONFIG_SCHEMA: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "reportgen report configuration",
  "type": "object",
  "required": ["sections"],
  "properties": {
    "title": { "type": ["string", "null"] },
    "orientation": { "enum": ["portrait", "landscape"] },
    "paper_size": { "enum": ["a4", "a3", "a5", "letter", "legal"] },
    "margin": { "type": "number", "minimum": 0 },
    "logo_path": { "type": ["string", "null"] },
    "data_source": { "$ref": "#/$defs/data_source" },
    "parameters": { "type": "object" },
    "connections": {
      "type": "object",
      "additionalProperties": { "$ref": "#/$defs/connection" }
    },
    "sections": {
      "type": "array",
      "items": { "$ref": "#/$defs/section" }
    }
  },
  "$defs": {
    "section": {
      "type": "object",
      "required": ["section_id", "type", "grid", "config"],
      "properties": {
        "section_id": { "type": "string", "minLength": 1 },
        "name": { "type": ["string", "null"] },
        "type": { "type": "string" },
        "grid": {
          "type": "object",
          "required": ["row_number", "col_start", "col_end"],
          "properties": {
            "row_number": { "type": "integer", "minimum": 0 },
            "row_height": { "type": ["integer", "null"], "minimum": 1 },
            "col_start": { "type": "integer", "minimum": 0, "maximum": 11 },
            "col_end": { "type": "integer", "minimum": 1, "maximum": 12 }
          }
        },
        "config": { "type": "object" },
        "data_source": { "$ref": "#/$defs/data_source" }
      }
    },
    "data_source": {
      "type": "object",
      "required": ["type"],
      "properties": {
        "type": { "enum": ["json", "sql"] },
        "data": { "type": "object" },
        "connection_id": { "type": "string" },
        "query": { "type": "string" }
      }
    },
    "connection": {
      "type": "object",
      "required": ["driver_kind"],
      "properties": {
        "connection_string": { "type": "string", "minLength": 1 },
        "connection_string_env": { "type": "string", "minLength": 1 },
        "driver_kind": { "enum": ["sqlite", "postgresql", "postgres", "mysql"] },
        "execution_mode": { "enum": ["sync", "async"] },
        "options": { "type": "object" }
      }
    }
  }
}"##;

/// Compiled JSON Schema instance (initialized once)
static COMPILED_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// Initialize and compile the JSON Schema for validation.
///
/// Called lazily by [`validate_config_document`]; calling it up front moves
/// the compilation cost to startup.
///
/// # Errors
/// Returns `ValidationError::SchemaCompilation` if the embedded schema is invalid.
pub fn initialize_config_validator() -> Result<(), ValidationError> {
    if COMPILED_SCHEMA.get().is_some() {
        return Ok(());
    }

    let schema_json = get_schema_definition()?;
    let compiled = jsonschema::validator_for(&schema_json).map_err(|e| {
        ValidationError::SchemaCompilation {
            message: format!("Schema compilation error: {}", e),
        }
    })?;

    // Another thread may have won the race; either instance is equivalent
    let _ = COMPILED_SCHEMA.set(compiled);

    Ok(())
}

/// Validates a raw configuration document against the embedded schema.
///
/// All violations are collected rather than stopping at the first one.
///
/// # Errors
/// Returns `ValidationError::ValidationFailed` listing every violation.
pub fn validate_config_document(json_value: &Value) -> Result<(), ValidationError> {
    initialize_config_validator()?;
    let schema = COMPILED_SCHEMA
        .get()
        .ok_or_else(|| ValidationError::SchemaCompilation {
            message: "Schema validator not initialized".to_string(),
        })?;

    let errors: Vec<String> = schema
        .iter_errors(json_value)
        .map(|error| format!("{}: {}", error.instance_path(), error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::ValidationFailed {
            error_count: errors.len(),
            errors,
        })
    }
}

/// Get the embedded JSON Schema as a parsed Value for external use
pub fn get_schema_definition() -> Result<Value, ValidationError> {
    serde_json::from_str(CONFIG_SCHEMA).map_err(|e| ValidationError::SchemaCompilation {
        message: format!("Failed to parse embedded schema: {}", e),
    })
}
