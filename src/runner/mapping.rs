//! Turning file rules into concrete source → destination mappings

use crate::config::{ConfigContext, ExtDot, FileRule};
use crate::config::resolve::resolve_list;
use crate::error::{ConfigResult, InterpolationResult};
use crate::runner::glob::{expand, split_patterns};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// A file rule with every placeholder resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub cwd: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub dest: Option<PathBuf>,
    pub ext: Option<String>,
    pub ext_dot: ExtDot,
    pub flatten: bool,
    pub expand: bool,
}

impl MappingRule {
    /// Resolve a configured rule against the context
    pub fn resolve(rule: &FileRule, ctx: &ConfigContext) -> InterpolationResult<Self> {
        let cwd = match &rule.cwd {
            Some(cwd) => clean_path(&ctx.resolve_str(cwd)?),
            None => PathBuf::new(),
        };
        let (includes, excludes) = split_patterns(&resolve_list(&rule.src, ctx)?);
        let dest = match &rule.dest {
            Some(dest) => Some(clean_path(&ctx.resolve_str(dest)?)),
            None => None,
        };
        let ext = match &rule.ext {
            Some(ext) => Some(ctx.resolve_str(ext)?),
            None => None,
        };

        Ok(MappingRule {
            cwd,
            includes,
            excludes,
            dest,
            ext,
            ext_dot: rule.ext_dot,
            flatten: rule.flatten,
            expand: rule.expand,
        })
    }

    /// Expand this rule's patterns under `root` and build its mappings
    pub fn mappings(&self, root: &Path) -> ConfigResult<Vec<ResolvedMapping>> {
        let expanded = expand(&root.join(&self.cwd), &self.includes, &self.excludes)?;
        Ok(build(self, &expanded, root))
    }
}

/// One concrete unit of work for a capability
///
/// Expanded rules produce exactly one source per mapping; compact rules
/// gather every source into a single destination file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub sources: Vec<PathBuf>,
    pub dest: Option<PathBuf>,
}

impl ResolvedMapping {
    /// First (for expanded rules: the only) source
    pub fn source(&self) -> Option<&Path> {
        self.sources.first().map(PathBuf::as_path)
    }
}

impl fmt::Display for ResolvedMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self
            .sources
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        match &self.dest {
            Some(dest) => write!(f, "{} -> {}", sources.join(", "), dest.display()),
            None => write!(f, "{}", sources.join(", ")),
        }
    }
}

/// Build mappings for already-expanded source paths (relative to the rule's `cwd`)
///
/// When two sources map to the same destination, the later source replaces
/// the earlier one at the earlier position.
pub fn build(rule: &MappingRule, expanded: &[PathBuf], root: &Path) -> Vec<ResolvedMapping> {
    let base = root.join(&rule.cwd);
    let sources: Vec<PathBuf> = expanded.iter().map(|rel| base.join(rel)).collect();

    let dest = match &rule.dest {
        Some(dest) => root.join(dest),
        None => {
            // Check-only rules (linting) have no output
            return sources
                .into_iter()
                .map(|source| ResolvedMapping {
                    sources: vec![source],
                    dest: None,
                })
                .collect();
        }
    };

    if !rule.expand {
        if sources.is_empty() {
            warn!(dest = %dest.display(), "no source files matched; nothing to write");
            return Vec::new();
        }
        return vec![ResolvedMapping {
            sources,
            dest: Some(dest),
        }];
    }

    let mut mappings: Vec<ResolvedMapping> = Vec::with_capacity(sources.len());
    for (rel, source) in expanded.iter().zip(sources) {
        let out_rel = if rule.flatten {
            rel.file_name().map(PathBuf::from).unwrap_or_else(|| rel.clone())
        } else {
            rel.clone()
        };
        let out_rel = match &rule.ext {
            Some(ext) => with_extension(&out_rel, ext, rule.ext_dot),
            None => out_rel,
        };
        let target = dest.join(out_rel);

        match mappings
            .iter_mut()
            .find(|m| m.dest.as_deref() == Some(target.as_path()))
        {
            Some(existing) => {
                warn!(
                    dest = %target.display(),
                    replaced = %existing.sources[0].display(),
                    by = %source.display(),
                    "duplicate destination; later source wins"
                );
                existing.sources = vec![source];
            }
            None => mappings.push(ResolvedMapping {
                sources: vec![source],
                dest: Some(target),
            }),
        }
    }

    mappings
}

/// Replace the extension of the file name in `path`
///
/// `ExtDot::First` treats everything after the first dot as the extension
/// (`jquery.ui.js` → `jquery.min.js`); `ExtDot::Last` only the final one.
pub fn with_extension(path: &Path, ext: &str, ext_dot: ExtDot) -> PathBuf {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return path.to_path_buf();
    };

    let dot = match ext_dot {
        ExtDot::First => name.find('.'),
        ExtDot::Last => name.rfind('.'),
    };
    let stem = match dot {
        Some(0) | None => name.as_str(),
        Some(i) => &name[..i],
    };

    path.with_file_name(format!("{}{}", stem, ext))
}

/// Normalize a configured path: collapse separators and drop `.` components
pub fn clean_path(s: &str) -> PathBuf {
    Path::new(s)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
