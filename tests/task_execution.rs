//! Integration tests for task execution

mod common;

use assetflow::config::{build_project, load_project, parse_config};
use assetflow::error::ExecutionError;
use assetflow::runner::{Context, Executor, TaskState};
use common::{create_test_project, pipeline_config, write_file, PIPELINE_FILES};
use std::fs;

#[test]
fn test_cssmin_example_mapping() {
    let (dir, config_path) = create_test_project(&pipeline_config("cp ${src} ${dest}"), PIPELINE_FILES);
    let project = load_project(&config_path).unwrap();
    let ctx = Context::new().with_jobs(2);

    let report = Executor::new(&project, &ctx).run("cssmin").unwrap();

    assert!(report.is_success());
    assert_eq!(report.tasks[0].mappings, 1);
    let out = dir.path().join("public/assets/css/a.min.css");
    assert_eq!(fs::read_to_string(out).unwrap(), "body { color: red; }");
    // the pre-minified source is excluded, so no a.min.min.css
    assert!(!dir.path().join("public/assets/css/a.min.min.css").exists());
}

#[test]
fn test_build_alias_runs_in_order() {
    let (dir, config_path) = create_test_project(&pipeline_config("cp ${src} ${dest}"), PIPELINE_FILES);
    let project = load_project(&config_path).unwrap();
    let ctx = Context::new();

    let report = Executor::new(&project, &ctx).run("build").unwrap();

    assert!(report.is_success());
    let names: Vec<&str> = report.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["imagemin", "cssmin", "concat", "uglify"]);

    let root = dir.path();
    assert!(root.join("public/assets/img/logo.png").exists());
    assert!(root.join("public/assets/img/icons/star.gif").exists());
    assert_eq!(
        fs::read_to_string(root.join("public/assets/js/build.js")).unwrap(),
        "var $;\nvar app;\nmain();"
    );
    // uglify picked up the concatenated bundle
    assert!(root.join("public/assets/js/build.min.js").exists());
}

#[test]
fn test_failing_task_halts_alias() {
    let (dir, config_path) = create_test_project(&pipeline_config("exit 3"), PIPELINE_FILES);
    let project = load_project(&config_path).unwrap();
    let ctx = Context::new();

    let report = Executor::new(&project, &ctx).run("build").unwrap();

    assert!(!report.is_success());
    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.tasks[0].state, TaskState::Completed);
    assert_eq!(report.tasks[1].state, TaskState::Failed);
    assert_eq!(report.skipped, vec!["concat".to_string(), "uglify".to_string()]);

    match &report.tasks[1].errors[0] {
        ExecutionError::MappingInvocation { mapping, source } => {
            assert!(mapping.contains("a.css"));
            assert!(matches!(**source, ExecutionError::CommandFailed(Some(3))));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(!dir.path().join("public/assets/js/build.js").exists());
    assert!(!dir.path().join("public/assets/js/build.min.js").exists());
}

#[test]
fn test_flatten_later_source_wins() {
    let yaml = r#"
tasks:
  vendor:
    kind: copy
    files:
      - cwd: vendor
        src: "**/*.js"
        dest: public/js
        flatten: true
"#;
    let (dir, _) = create_test_project(
        yaml,
        &[("vendor/a/util.js", "first"), ("vendor/b/util.js", "second")],
    );
    let project = build_project(parse_config(yaml).unwrap(), dir.path().to_path_buf()).unwrap();
    let ctx = Context::new();

    let report = Executor::new(&project, &ctx).run("vendor").unwrap();

    assert!(report.is_success());
    assert_eq!(report.tasks[0].mappings, 1);
    assert_eq!(fs::read_to_string(dir.path().join("public/js/util.js")).unwrap(), "second");
}

#[test]
fn test_options_reach_command() {
    let yaml = r#"
vars:
  level: 7
capabilities:
  stamp:
    command: "echo level=${optimizationLevel} > ${dest}"
tasks:
  images:
    kind: stamp
    options:
      optimizationLevel: "<%= level %>"
    files:
      - cwd: img
        src: "*.png"
        dest: out
"#;
    let (dir, config_path) = create_test_project(yaml, &[("img/a.png", "png")]);
    let project = load_project(&config_path).unwrap();
    let ctx = Context::new();

    let report = Executor::new(&project, &ctx).run("images").unwrap();
    assert!(report.is_success());
    assert_eq!(fs::read_to_string(dir.path().join("out/a.png")).unwrap(), "level=7\n");
}

#[test]
fn test_missing_source_dir_is_not_an_error() {
    let yaml = r#"
tasks:
  fonts:
    kind: copy
    files:
      - cwd: fonts
        src: "*.woff"
        dest: public/fonts
"#;
    let (dir, config_path) = create_test_project(yaml, &[]);
    let project = load_project(&config_path).unwrap();
    let ctx = Context::new();

    let report = Executor::new(&project, &ctx).run("fonts").unwrap();
    assert!(report.is_success());
    assert_eq!(report.tasks[0].mappings, 0);
    assert!(!dir.path().join("public").exists());
}

#[test]
fn test_env_namespace_from_dotenv() {
    let yaml = r#"
tasks:
  copy:
    kind: copy
    files:
      - cwd: src
        src: "*.txt"
        dest: "<%= env.ASSETFLOW_TEST_OUT_DIR %>"
"#;
    let (dir, config_path) = create_test_project(yaml, &[("src/a.txt", "a")]);
    write_file(dir.path(), ".env", "ASSETFLOW_TEST_OUT_DIR=from-env\n");

    let project = load_project(&config_path).unwrap();
    let ctx = Context::new();
    let report = Executor::new(&project, &ctx).run("copy").unwrap();

    assert!(report.is_success());
    assert!(dir.path().join("from-env/a.txt").exists());
}
