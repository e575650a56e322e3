//! Glob expansion against a source tree
//!
//! `*` matches within one path component, `**` across components, and
//! `{a,b}` lists alternatives. Results are relative to the base directory,
//! ordered by include pattern first and then by sorted directory walk.

use crate::error::{ConfigError, ConfigResult};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Characters that start a glob construct
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Split grunt-style source lists into includes and `!`-prefixed excludes
pub fn split_patterns(src: &[String]) -> (Vec<String>, Vec<String>) {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();

    for pattern in src {
        match pattern.strip_prefix('!') {
            Some(rest) => excludes.push(rest.to_string()),
            None => includes.push(pattern.clone()),
        }
    }

    (includes, excludes)
}

/// Collapse repeated separators and drop a leading `./`
pub fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_slash = false;

    for c in pattern.chars() {
        let is_slash = c == '/' || c == '\\';
        if is_slash && prev_slash {
            continue;
        }
        out.push(if is_slash { '/' } else { c });
        prev_slash = is_slash;
    }

    let mut trimmed = out.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Whether a pattern component contains glob syntax
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(GLOB_META)
}

/// Directory part of a pattern that contains no glob syntax
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let normalized = normalize_pattern(pattern);
    let components: Vec<&str> = normalized.split('/').collect();
    let mut prefix = PathBuf::new();

    // The last component is always a file name pattern
    for component in &components[..components.len().saturating_sub(1)] {
        if has_glob_meta(component) {
            break;
        }
        prefix.push(component);
    }

    prefix
}

/// Compile a single pattern where `*` does not cross `/`
pub fn compile(pattern: &str) -> ConfigResult<GlobMatcher> {
    let normalized = normalize_pattern(pattern);
    GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            error: e.to_string(),
        })
}

/// Compile a set of patterns with the same matching rules as [`compile`]
pub fn build_globset(patterns: &[String]) -> ConfigResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = normalize_pattern(pattern);
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                error: e.to_string(),
            })?;
        builder.add(glob);
    }

    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: patterns.join(", "),
        error: e.to_string(),
    })
}

/// Concrete paths that a pattern is guaranteed to match
///
/// Every brace alternative is tried, `**/` stands for zero and for one
/// directory, and other wildcards are filled with a placeholder name.
pub fn sample_paths(pattern: &str) -> Vec<String> {
    let mut samples = Vec::new();
    for alternative in expand_braces(&normalize_pattern(pattern)) {
        let with_dir = alternative.replace("**/", "x/");
        let without_dir = alternative.replace("**/", "");
        for candidate in [without_dir, with_dir] {
            let filled = fill_wildcards(&candidate);
            if !samples.contains(&filled) {
                samples.push(filled);
            }
        }
    }
    samples
}

/// Expand `{a,b}` groups into every combination
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| open + i) else {
        return vec![pattern.to_string()];
    };

    let head = &pattern[..open];
    let tail = &pattern[close + 1..];
    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{}{}{}", head, alt, tail)))
        .collect()
}

fn fill_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push('x');
            }
            '?' => out.push('x'),
            '[' => {
                let class: String = chars.by_ref().take_while(|&inner| inner != ']').collect();
                out.push(class_member(&class));
            }
            other => out.push(other),
        }
    }

    out
}

/// A character accepted by a `[...]` class body
fn class_member(class: &str) -> char {
    match class.strip_prefix(['!', '^']) {
        Some(negated) => "xyz_0"
            .chars()
            .find(|c| !negated.contains(*c))
            .unwrap_or('x'),
        None => class.chars().next().unwrap_or('x'),
    }
}

/// Expand include and exclude patterns under `base`
///
/// Includes are applied in order and their union keeps first-seen order.
/// Any path matching an exclude is then dropped. A missing `base` yields
/// an empty list.
pub fn expand(base: &Path, includes: &[String], excludes: &[String]) -> ConfigResult<Vec<PathBuf>> {
    let exclude_set = build_globset(excludes)?;

    if !base.is_dir() {
        debug!(base = %base.display(), "base directory does not exist; nothing to expand");
        return Ok(Vec::new());
    }

    let mut walked: HashMap<PathBuf, Vec<String>> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut result: Vec<String> = Vec::new();

    for pattern in includes {
        let matcher = compile(pattern)?;
        let prefix = literal_prefix(pattern);

        let files = walked
            .entry(prefix.clone())
            .or_insert_with(|| walk_sorted(base, &prefix));

        let before = result.len();
        for rel in files.iter() {
            if matcher.is_match(rel) && seen.insert(rel.clone()) {
                result.push(rel.clone());
            }
        }

        if result.len() == before {
            debug!(pattern = %pattern, base = %base.display(), "pattern added no new files");
        }
    }

    Ok(result
        .into_iter()
        .filter(|rel| !exclude_set.is_match(rel))
        .map(PathBuf::from)
        .collect())
}

/// Collect every file under `base/prefix`, relative to `base`, in sorted walk order
///
/// Symlinked directories are followed; loops are reported and skipped.
fn walk_sorted(base: &Path, prefix: &Path) -> Vec<String> {
    let start = base.join(prefix);
    if !start.is_dir() {
        return Vec::new();
    }

    WalkDir::new(&start)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(dir = %start.display(), error = %e, "failed to read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(base).ok()?;
            Some(rel.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}
