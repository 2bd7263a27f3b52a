//! Structural validation of inbound JSON frames.

use super::SecurityError;
use crate::config::SecurityConfig;
use serde_json::Value;

/// Validates a JSON frame against the configured limits
pub fn validate_json_message(message: &[u8], config: &SecurityConfig) -> Result<(), SecurityError> {
    if message.len() > config.max_message_size {
        return Err(SecurityError::MessageTooLarge(message.len()));
    }

    let json: Value = serde_json::from_slice(message)
        .map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))?;

    validate_json_value(&json, 0, config)?;

    if let Some(field) = json.get("field").and_then(Value::as_str) {
        validate_field_name(field)?;
    }

    Ok(())
}

/// Recursively validates a JSON value
fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), SecurityError> {
    if depth > config.max_json_depth {
        return Err(SecurityError::InvalidMessageFormat(
            "JSON nesting too deep".to_string(),
        ));
    }

    match value {
        Value::String(s) => {
            if s.len() > config.max_string_length {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "String too long: {} characters",
                    s.len()
                )));
            }
            validate_string_content(s)?;
        }
        Value::Array(arr) => {
            if arr.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Array too large: {} elements",
                    arr.len()
                )));
            }
            for item in arr {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(obj) => {
            if obj.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Object too large: {} keys",
                    obj.len()
                )));
            }
            for (key, val) in obj {
                if key.len() > config.max_string_length {
                    return Err(SecurityError::InvalidMessageFormat(format!(
                        "Object key too long: {} characters",
                        key.len()
                    )));
                }
                validate_string_content(key)?;
                validate_json_value(val, depth + 1, config)?;
            }
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(SecurityError::InvalidMessageFormat(
                        "Invalid number: not finite".to_string(),
                    ));
                }
            }
        }
        Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

/// Rejects null bytes and runs of control characters
fn validate_string_content(s: &str) -> Result<(), SecurityError> {
    if s.contains('\0') {
        return Err(SecurityError::MaliciousContent);
    }

    let control_char_count = s
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count();
    if control_char_count > 5 {
        return Err(SecurityError::MaliciousContent);
    }

    Ok(())
}

/// Validates a field name: non-empty, at most 64 ASCII alphanumerics or underscores
pub fn validate_field_name(field: &str) -> Result<(), SecurityError> {
    if field.is_empty() || field.len() > 64 {
        return Err(SecurityError::InvalidMessageFormat(
            "Invalid field name length".to_string(),
        ));
    }

    if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SecurityError::InvalidMessageFormat(
            "Invalid field name characters".to_string(),
        ));
    }

    Ok(())
}
