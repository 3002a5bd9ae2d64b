// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parameter validation against a type's declared schema.

use crate::typedef::{ParamKind, WantTypeDefinition};
use mw_core::Params;
use thiserror::Error;

/// A parameter set rejected by its schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamError {
    #[error("required parameter '{param}' is missing")]
    Missing { param: String },

    #[error("parameter '{param}' must be a {expected}")]
    WrongKind { param: String, expected: ParamKind },

    #[error("parameter '{param}' must be within [{min}, {max}], got {got}")]
    OutOfRange { param: String, min: f64, max: f64, got: f64 },

    #[error("parameter '{param}' is not one of the allowed values")]
    NotInEnum { param: String },

    #[error("parameter '{param}' does not match pattern '{pattern}'")]
    PatternMismatch { param: String, pattern: String },

    #[error("parameter '{param}' has an invalid pattern '{pattern}': {message}")]
    BadPattern { param: String, pattern: String, message: String },
}

/// Validate `params` against `def`, applying declared defaults.
///
/// Returns the effective parameter map the factory receives. Keys not
/// covered by the schema pass through untouched.
pub fn validate_params(
    def: &WantTypeDefinition,
    params: &Params,
) -> Result<Params, ParamError> {
    let mut effective = params.clone();

    for schema in &def.parameters {
        let value = match effective.get(&schema.name) {
            Some(v) => v.clone(),
            None => {
                if let Some(default) = &schema.default {
                    effective.insert(schema.name.clone(), default.clone());
                    default.clone()
                } else if schema.required {
                    return Err(ParamError::Missing { param: schema.name.clone() });
                } else {
                    continue;
                }
            }
        };

        if !schema.kind.accepts(&value) {
            return Err(ParamError::WrongKind {
                param: schema.name.clone(),
                expected: schema.kind,
            });
        }

        if schema.min.is_some() || schema.max.is_some() {
            if let Some(n) = value.as_f64() {
                let min = schema.min.unwrap_or(f64::MIN);
                let max = schema.max.unwrap_or(f64::MAX);
                if n < min || n > max {
                    return Err(ParamError::OutOfRange {
                        param: schema.name.clone(),
                        min,
                        max,
                        got: n,
                    });
                }
            }
        }

        if !schema.one_of.is_empty() && !schema.one_of.contains(&value) {
            return Err(ParamError::NotInEnum { param: schema.name.clone() });
        }

        if let Some(pattern) = &schema.pattern {
            let re = regex::Regex::new(pattern).map_err(|e| ParamError::BadPattern {
                param: schema.name.clone(),
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            match value.as_str() {
                Some(s) if re.is_match(s) => {}
                Some(_) => {
                    return Err(ParamError::PatternMismatch {
                        param: schema.name.clone(),
                        pattern: pattern.clone(),
                    })
                }
                None => {
                    return Err(ParamError::WrongKind {
                        param: schema.name.clone(),
                        expected: ParamKind::String,
                    })
                }
            }
        }
    }

    Ok(effective)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
