//! Integration tests for the watch coordinator

mod common;

use assetflow::config::{build_project_with, parse_config, Project};
use assetflow::error::{ExecutionError, ExecutionResult};
use assetflow::runner::{
    CapabilityRegistry, ChangeEvent, ChangeKind, Context, Executor, ResolvedMapping, TaskOptions,
    WatchCoordinator,
};
use common::create_test_project;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CONFIG: &str = r#"
tasks:
  styles:
    kind: count
    files:
      - cwd: app/css
        src: "*.css"
        dest: public/css
  broken:
    kind: fail
    files:
      - cwd: app/js
        src: "*.js"
watch:
  options:
    debounce: 50
  css:
    files: app/css/*.css
    tasks: styles
  js:
    files: ["app/js/**/*.js"]
    tasks: [broken, styles]
"#;

fn project(root: &Path, counter: Arc<AtomicUsize>) -> Project {
    let mut capabilities = CapabilityRegistry::new();
    capabilities
        .register("count", move |_: &ResolvedMapping, _: &TaskOptions| -> ExecutionResult<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    capabilities
        .register("fail", |_: &ResolvedMapping, _: &TaskOptions| -> ExecutionResult<()> {
            Err(ExecutionError::Invocation("lint errors".to_string()))
        })
        .unwrap();

    build_project_with(parse_config(CONFIG).unwrap(), root.to_path_buf(), capabilities).unwrap()
}

fn fixture() -> (tempfile::TempDir, Project, Arc<AtomicUsize>) {
    let (dir, _) = create_test_project(
        CONFIG,
        &[("app/css/site.css", "body {}"), ("app/js/main.js", "main();")],
    );
    let counter = Arc::new(AtomicUsize::new(0));
    let project = project(dir.path(), Arc::clone(&counter));
    (dir, project, counter)
}

#[test]
fn test_burst_of_events_runs_once() {
    let (dir, project, counter) = fixture();
    let ctx = Context::new();
    let mut coordinator = WatchCoordinator::new(Executor::new(&project, &ctx));

    let (tx, rx) = mpsc::channel();
    let changed = dir.path().join("app/css/site.css");
    for _ in 0..3 {
        tx.send(ChangeEvent::new(&changed, ChangeKind::Modified)).unwrap();
    }
    drop(tx);

    let mut reports = Vec::new();
    let runs = coordinator.run(rx, |binding, report| {
        reports.push((binding.to_string(), report.is_success()))
    });

    assert_eq!(runs, 1);
    assert_eq!(reports, vec![("css".to_string(), true)]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failures_do_not_stop_watching() {
    let (dir, project, counter) = fixture();
    let ctx = Context::new();
    let mut coordinator = WatchCoordinator::new(Executor::new(&project, &ctx));

    let (tx, rx) = mpsc::channel();
    let js = dir.path().join("app/js/main.js");
    let css = dir.path().join("app/css/site.css");
    let sender = thread::spawn(move || {
        tx.send(ChangeEvent::new(js, ChangeKind::Modified)).unwrap();
        thread::sleep(Duration::from_millis(400));
        tx.send(ChangeEvent::new(css, ChangeKind::Created)).unwrap();
    });

    let mut reports = Vec::new();
    let runs = coordinator.run(rx, |binding, report| {
        reports.push((binding.to_string(), report.is_success(), report.skipped.clone()))
    });
    sender.join().unwrap();

    assert_eq!(runs, 2);
    assert_eq!(
        reports,
        vec![
            ("js".to_string(), false, vec!["styles".to_string()]),
            ("css".to_string(), true, Vec::new()),
        ]
    );
    // styles only ran for the second change
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ignored_events() {
    let (dir, project, counter) = fixture();
    let ctx = Context::new();
    let mut coordinator = WatchCoordinator::new(Executor::new(&project, &ctx));

    let (tx, rx) = mpsc::channel();
    tx.send(ChangeEvent::new(dir.path().join("app/css/site.css"), ChangeKind::Access))
        .unwrap();
    tx.send(ChangeEvent::new(dir.path().join("public/css/site.css"), ChangeKind::Modified))
        .unwrap();
    tx.send(ChangeEvent::new("/somewhere/else/site.css", ChangeKind::Modified))
        .unwrap();
    drop(tx);

    let runs = coordinator.run(rx, |_, _| {});
    assert_eq!(runs, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shutdown_flag_stops_loop() {
    let (_dir, project, _) = fixture();
    let ctx = Context::new();
    let mut coordinator = WatchCoordinator::new(Executor::new(&project, &ctx));

    let (_tx, rx) = mpsc::channel::<ChangeEvent>();
    let shutdown = coordinator.shutdown_flag();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::SeqCst);
    });

    let runs = coordinator.run(rx, |_, _| {});
    stopper.join().unwrap();

    assert_eq!(runs, 0);
    assert!(ctx.is_cancelled());
}
