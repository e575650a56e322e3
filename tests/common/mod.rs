//! Common test utilities

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory with an assetflow.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("assetflow.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a project directory with a config and source files
pub fn create_test_project(content: &str, files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let (temp_dir, config_path) = create_test_config(content);
    for (rel, body) in files {
        write_file(temp_dir.path(), rel, body);
    }
    (temp_dir, config_path)
}

/// Write a file below `root`, creating parent directories
pub fn write_file(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

/// The asset pipeline used across the integration tests
///
/// `cssmin` and `imagemin` stand in for the real tools with shell commands;
/// set `CSSMIN` to a failing command to break the build.
pub fn pipeline_config(cssmin: &str) -> String {
    format!(
        r#"
name: site
vars:
  path:
    dev: application/
    dist: public/
capabilities:
  cssmin:
    command: "{cssmin}"
  imagemin:
    command: "cp ${{src}} ${{dest}}"
    usage: Optimize images
tasks:
  cssmin:
    kind: cssmin
    files:
      - expand: true
        cwd: "<%= path.dev %>/assets/css/"
        src: ["*.css", "!*.min.css"]
        dest: "<%= path.dist %>/assets/css/"
        ext: .min.css
  imagemin:
    kind: imagemin
    options:
      optimizationLevel: 7
    files:
      - cwd: "<%= path.dev %>/assets/img/"
        src: ["**/*.{{png,jpg,gif}}"]
        dest: "<%= path.dist %>/assets/img/"
  concat:
    kind: concat
    options:
      separator: "\n"
    files:
      - expand: false
        src:
          - "<%= path.dev %>/assets/js/jquery.js"
          - "<%= path.dev %>/assets/js/*.js"
          - "<%= path.dev %>/assets/js/main.js"
        dest: "<%= path.dist %>/assets/js/build.js"
  uglify:
    kind: copy
    files:
      - cwd: "<%= path.dist %>/assets/js/"
        src: ["*.js", "!*.min.js"]
        dest: "<%= path.dist %>/assets/js/"
        ext: .min.js
aliases:
  build: [imagemin, cssmin, concat, uglify]
watch:
  css:
    files: "<%= path.dev %>/assets/css/*.css"
    tasks: cssmin
  javascript:
    files: ["<%= path.dev %>/assets/js/**/*.js"]
    tasks: [concat]
"#,
        cssmin = cssmin
    )
}

/// Source tree for [`pipeline_config`]
pub const PIPELINE_FILES: &[(&str, &str)] = &[
    ("application/assets/css/a.css", "body { color: red; }"),
    ("application/assets/css/a.min.css", "body{color:red}"),
    ("application/assets/img/logo.png", "png"),
    ("application/assets/img/icons/star.gif", "gif"),
    ("application/assets/js/jquery.js", "var $;"),
    ("application/assets/js/app.js", "var app;"),
    ("application/assets/js/main.js", "main();"),
];
