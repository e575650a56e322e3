//! Variable interpolation for command templates
//!
//! Command capabilities receive per-mapping values (`${src}`, `${dest}`,
//! task options) using the `${var}` syntax. This is separate from the
//! `<%= key %>` configuration templates, which are resolved at load time.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::sync::LazyLock;

/// Expansion passes before values are considered to refer to each other
const MAX_PASSES: usize = 10;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable regex is valid"));

/// Interpolate variables in a string
///
/// Supports:
/// - `${var}` - variable from the provided map
/// - Environment variables (when not found in the map)
///
/// Values may themselves contain `${var}` references. Unknown variables
/// are left in place.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let mut result = s.to_string();

    for _ in 0..MAX_PASSES {
        let mut changed = false;

        let next = VARIABLE
            .replace_all(&result, |caps: &regex::Captures| {
                let var_name = &caps[1];

                if let Some(value) = vars.get(var_name) {
                    changed = true;
                    return value.clone();
                }

                if let Ok(value) = env::var(var_name) {
                    changed = true;
                    return value;
                }

                format!("${{{}}}", var_name)
            })
            .into_owned();

        if !changed {
            return Ok(result);
        }
        result = next;
    }

    Err(InterpolationError::CyclicReference(s.to_string()))
}

/// Interpolate once, failing on the first unknown variable
///
/// Substituted values are inserted as-is and never scanned again, so a
/// value that happens to contain `${...}` (a file name, for instance) is
/// passed through literally.
pub fn interpolate_strict(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let mut unknown = None;

    let result = VARIABLE.replace_all(s, |caps: &regex::Captures| {
        let var_name = &caps[1];

        if let Some(value) = vars.get(var_name) {
            return value.clone();
        }
        if let Ok(value) = env::var(var_name) {
            return value;
        }

        if unknown.is_none() {
            unknown = Some(var_name.to_string());
        }
        String::new()
    });

    match unknown {
        Some(name) => Err(InterpolationError::UnknownVariable(name)),
        None => Ok(result.into_owned()),
    }
}
