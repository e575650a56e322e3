//! Command execution
//!
//! Capabilities declared under `capabilities:` run an external command per
//! mapping. The command template sees `${src}` (all sources, space
//! separated), `${dest}`, and every scalar task option by name.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::capability::{ensure_parent, Capability, TaskOptions};
use crate::runner::interpolate::{interpolate, interpolate_strict};
use crate::runner::mapping::ResolvedMapping;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use tracing::{debug, info};

/// Interpreter used when the configuration names none
pub fn default_interpreter() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

/// A capability backed by a shell command template
#[derive(Debug, Clone)]
pub struct CommandCapability {
    /// Command template with `${var}` placeholders
    template: String,

    /// Interpreter (e.g., ["bash", "-c"])
    interpreter: Vec<String>,

    /// Directory the command runs in
    working_dir: PathBuf,
}

impl CommandCapability {
    pub fn new(template: impl Into<String>, interpreter: Vec<String>, working_dir: PathBuf) -> Self {
        let interpreter = if interpreter.is_empty() {
            default_interpreter()
        } else {
            interpreter
        };
        CommandCapability {
            template: template.into(),
            interpreter,
            working_dir,
        }
    }

    /// The command line that would run for this mapping
    ///
    /// Options may refer to each other and are expanded first. Paths are
    /// inserted afterwards and the template is scanned once, so `${...}`
    /// inside a file name is never treated as a placeholder.
    pub fn render(&self, mapping: &ResolvedMapping, options: &TaskOptions) -> ExecutionResult<String> {
        let raw: HashMap<String, String> = options.scalars().collect();
        let mut vars = HashMap::with_capacity(raw.len() + 2);
        for (key, value) in &raw {
            vars.insert(key.clone(), interpolate(value, &raw)?);
        }

        let sources: Vec<String> = mapping.sources.iter().map(|p| shell_quote(p)).collect();
        vars.insert("src".to_string(), sources.join(" "));
        if let Some(dest) = &mapping.dest {
            vars.insert("dest".to_string(), shell_quote(dest));
        }

        Ok(interpolate_strict(&self.template, &vars)?)
    }
}

impl Capability for CommandCapability {
    fn invoke(&self, mapping: &ResolvedMapping, options: &TaskOptions) -> ExecutionResult<()> {
        let exec_str = self.render(mapping, options)?;

        if let Some(dest) = &mapping.dest {
            ensure_parent(dest)?;
        }

        info!("[RUN] {}", exec_str);
        execute_command(&exec_str, &self.interpreter, &self.working_dir)
    }
}

/// Run a command line through the interpreter
pub fn execute_command(exec_str: &str, interpreter: &[String], working_dir: &Path) -> ExecutionResult<()> {
    let (program, args) = interpreter
        .split_first()
        .ok_or_else(|| ExecutionError::Invocation("interpreter is empty".to_string()))?;

    // Build the command
    let mut command = StdCommand::new(program);

    // Add interpreter args (e.g., "-c" for sh/bash)
    command.args(args);

    // Add the actual command to execute
    command.arg(exec_str);

    command.current_dir(working_dir);

    command.stdin(Stdio::null());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());

    let status = command
        .status()
        .map_err(|e| ExecutionError::io(format!("spawn {}", program), e))?;

    debug!(command = %exec_str, code = ?status.code(), "command finished");

    // Check exit status
    if !status.success() {
        return Err(ExecutionError::CommandFailed(status.code()));
    }

    Ok(())
}

/// Quote a path for a POSIX shell when it contains special characters
fn shell_quote(path: &Path) -> String {
    let s = path.display().to_string();
    let plain = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%=".contains(c));
    if plain && !s.is_empty() {
        s
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mapping(sources: &[&str], dest: Option<&str>) -> ResolvedMapping {
        ResolvedMapping {
            sources: sources.iter().map(PathBuf::from).collect(),
            dest: dest.map(PathBuf::from),
        }
    }

    #[test]
    fn test_render_with_options() {
        let cap = CommandCapability::new(
            "optipng -o${optimizationLevel} ${src} -out ${dest}",
            default_interpreter(),
            PathBuf::from("."),
        );
        let options = TaskOptions::new(serde_yaml::from_str("optimizationLevel: 7").unwrap());
        let rendered = cap
            .render(&mapping(&["img/a.png"], Some("public/img/a.png")), &options)
            .unwrap();
        assert_eq!(rendered, "optipng -o7 img/a.png -out public/img/a.png");
    }

    #[test]
    fn test_render_quotes_spaces() {
        let cap = CommandCapability::new("lint ${src}", default_interpreter(), PathBuf::from("."));
        let rendered = cap
            .render(&mapping(&["my file.js", "b.js"], None), &TaskOptions::default())
            .unwrap();
        assert_eq!(rendered, "lint 'my file.js' b.js");
    }

    #[test]
    fn test_render_unknown_variable() {
        let cap = CommandCapability::new("x ${nope_not_set_anywhere}", default_interpreter(), PathBuf::from("."));
        assert!(matches!(
            cap.render(&mapping(&["a"], None), &TaskOptions::default()),
            Err(ExecutionError::Interpolation(_))
        ));
    }

    #[test]
    fn test_render_keeps_placeholder_in_path() {
        let cap = CommandCapability::new("cleancss -o ${dest} ${src}", default_interpreter(), PathBuf::from("."));
        let rendered = cap
            .render(
                &mapping(&["css/${HOME}.css"], Some("out/${nope_not_set_anywhere}.css")),
                &TaskOptions::default(),
            )
            .unwrap();
        assert_eq!(
            rendered,
            "cleancss -o 'out/${nope_not_set_anywhere}.css' 'css/${HOME}.css'"
        );
    }

    #[test]
    fn test_render_options_refer_to_each_other() {
        let cap = CommandCapability::new("optipng -o${level} ${src}", default_interpreter(), PathBuf::from("."));
        let options = TaskOptions::new(serde_yaml::from_str("base: \"3\"\nlevel: \"${base}\"").unwrap());
        let rendered = cap.render(&mapping(&["a.png"], None), &options).unwrap();
        assert_eq!(rendered, "optipng -o3 a.png");
    }

    #[test]
    fn test_invoke_writes_dest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let source = dir.path().join("a.txt");
        let dest = dir.path().join("out/b.txt");

        let cap = CommandCapability::new("cp ${src} ${dest}", default_interpreter(), dir.path().to_path_buf());
        let mapping = ResolvedMapping {
            sources: vec![source],
            dest: Some(dest),
        };
        cap.invoke(&mapping, &TaskOptions::default()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out/b.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_execute_failing_command() {
        let dir = TempDir::new().unwrap();
        let result = execute_command("false", &default_interpreter(), dir.path());
        assert!(matches!(result, Err(ExecutionError::CommandFailed(_))));
    }

    #[test]
    fn test_empty_interpreter_falls_back() {
        let cap = CommandCapability::new("true", Vec::new(), PathBuf::from("."));
        assert!(cap.invoke(&mapping(&["a"], None), &TaskOptions::default()).is_ok());
    }
}
