//! Editor and session flows against a scripted page

mod common;

use std::sync::Arc;
use std::time::Duration;

use pypyjs_common::ManualClock;
use pypyjs_e2e::{E2eError, EditorSession};
use tempfile::TempDir;

use common::{config_for, FakePage, Program};

async fn open(page: FakePage, clock: &ManualClock) -> (EditorSession<FakePage>, TempDir) {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path(), &tmp.path().join("out"));
    let session = EditorSession::open_with_clock(page, config, Arc::new(clock.clone()))
        .await
        .unwrap();
    (session, tmp)
}

#[tokio::test]
async fn hello_world_run_passes() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("Hello!", "Hello!\n")]);
    let state = page.state.clone();
    let (session, _tmp) = open(page, &clock).await;

    let info = session
        .editor()
        .assert_editor(r#"print "Hello!""#, "Hello!", None)
        .await
        .unwrap();

    assert!(info.ok);
    assert_eq!(info.duration_ms, Some(3.0));

    let state = state.lock();
    assert!(state.url.as_deref().unwrap().ends_with("/editor.html"));
    assert_eq!(state.window.unwrap().height, 900);
    assert!(state
        .scripts
        .contains(&r#"CodeMirrorEditor.setValue('print "Hello!"');"#.to_string()));
}

#[tokio::test]
async fn escaped_newline_reaches_the_editor_intact() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("new line", "a\nnew line\n")]);
    let state = page.state.clone();
    let (session, _tmp) = open(page, &clock).await;

    session
        .editor()
        .assert_editor(r#"print "a\nnew line""#, "a\nnew line", None)
        .await
        .unwrap();

    let state = state.lock();
    assert!(state
        .scripts
        .contains(&r#"CodeMirrorEditor.setValue('print "a\\nnew line"');"#.to_string()));
}

#[tokio::test]
async fn multiline_code_is_dedented_and_encoded() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("two", "one\ntwo")]);
    let state = page.state.clone();
    let (session, _tmp) = open(page, &clock).await;

    session
        .editor()
        .assert_editor(
            "\n    print 'one'\n    print 'two'\n",
            "\n    one\n    two\n",
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        state.lock().editor_value,
        r#"'print \'one\'\nprint \'two\'');"#
    );
}

#[tokio::test]
async fn console_mismatch_reports_a_diff() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("version", "2.7.9 (?, May 17 2015)")]);
    let (session, _tmp) = open(page, &clock).await;

    let err = session
        .editor()
        .assert_editor("import sys\nprint sys.version", "2.7.8 (?, May 17 2015)", None)
        .await
        .unwrap_err();

    assert!(err.is_failure());
    let message = err.to_string();
    assert!(message.starts_with("Console mismatch:"));
    assert!(message.contains("*** Console output is: ***\n2.7.9 (?, May 17 2015)"));
    assert!(message.contains("*** the reference: ***\n2.7.8 (?, May 17 2015)"));
    assert!(message.contains("*** diff: ***\n 0 - 2.7.9 (?, May 17 2015)"));
}

#[tokio::test]
async fn run_that_never_finishes_times_out_with_context() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::hangs("while True", "still busy")]);
    let (session, _tmp) = open(page, &clock).await;
    let before = clock.elapsed();

    let err = session
        .editor()
        .execute("\n    while True:\n        pass\n", None)
        .await
        .unwrap_err();

    assert_eq!(clock.elapsed() - before, Duration::from_secs(10));
    assert!(err.is_failure());
    match &err {
        E2eError::ExecutionTimeout {
            code,
            run_info,
            console,
        } => {
            assert_eq!(code, "while True:\n    pass");
            assert_eq!(run_info, "start vm...");
            assert_eq!(console, "still busy");
        }
        other => panic!("unexpected error: {}", other),
    }

    let message = err.to_string();
    assert!(message.starts_with("Timeout reached while execution of:\n"));
    assert!(message.contains("while True:\n    pass"));
    assert!(message.contains("Console output:"));
    assert!(message.contains("still busy"));
}

#[tokio::test]
async fn expect_timeout_passes_only_on_timeout() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![
        Program::hangs("sleep", ""),
        Program::prints("quick", "quick"),
    ]);
    let (session, _tmp) = open(page, &clock).await;
    let editor = session.editor();

    let report = editor.expect_timeout("time.sleep(99)", Some(2)).await.unwrap();
    assert!(report.contains("time.sleep(99)"));

    let err = editor.expect_timeout("print 'quick'", None).await.unwrap_err();
    assert!(matches!(err, E2eError::RunInfo { .. }));
}

#[tokio::test]
async fn alert_is_checked_and_dismissed_after_the_test() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::alerts("alert(", "hello world")]);
    let state = page.state.clone();
    let (session, _tmp) = open(page, &clock).await;

    let editor = session.editor();
    editor
        .run_code("import js\njs.eval(\"alert('hello world')\")")
        .await
        .unwrap();
    editor
        .expect_alert("hello world", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(state.lock().alert.is_some());

    session.after_test().await;
    assert!(state.lock().alert.is_none());

    // Nothing open any more: still fine
    session.after_test().await;
}

#[tokio::test]
async fn wrong_alert_text_fails() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::alerts("alert(", "goodbye")]);
    let (session, _tmp) = open(page, &clock).await;

    let editor = session.editor();
    editor.run_code("js.eval(\"alert('goodbye')\")").await.unwrap();
    let err = editor
        .expect_alert("hello world", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Alert(_)));
}

#[tokio::test]
async fn evaluate_trims_string_results() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("Hello", "Hello PyPy.js!\n")]);
    let (session, _tmp) = open(page, &clock).await;

    let editor = session.editor();
    editor.execute("print \"Hello PyPy.js!\"", None).await.unwrap();
    let expected = serde_json::json!("Hello PyPy.js!");
    editor
        .evaluate(r##"return $("#console").text();"##, Some(&expected))
        .await
        .unwrap();
}

#[tokio::test]
async fn wrong_title_fails_setup_and_quits() {
    let clock = ManualClock::new();
    let mut page = FakePage::new(Vec::new());
    page.title = "404 Not Found".to_string();
    let state = page.state.clone();

    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path(), tmp.path());
    let result = EditorSession::open_with_clock(page, config, Arc::new(clock)).await;

    assert!(matches!(result, Err(E2eError::PageInit(_))));
    assert!(state.lock().quit);
}

#[tokio::test]
async fn page_dump_drops_blank_lines() {
    let clock = ManualClock::new();
    let (session, _tmp) = open(FakePage::new(Vec::new()), &clock).await;

    let dump = session.page_dump().await.unwrap();
    assert!(!dump.contains("\n\n"));
    assert!(dump.contains("Welcome to PyPy.js!"));
}

#[tokio::test]
async fn import_all_modules_counts_good_imports() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![
        Program::prints("init done", "init done"),
        Program::prints("import this", "The Zen of Python, by Tim Peters\n...\nOK"),
        Program::prints("import", "OK"),
    ]);
    let (session, tmp) = open(page, &clock).await;

    let modules = tmp.path().join("modules");
    std::fs::create_dir(&modules).unwrap();
    for file in ["os.py", "random.py", "this.py", "_private.py", "README"] {
        std::fs::write(modules.join(file), "").unwrap();
    }

    let report = session
        .editor()
        .import_all_modules("modules", 10)
        .await
        .unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.good, 3);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn run_clears_run_info_before_setting_code() {
    let clock = ManualClock::new();
    let page = FakePage::new(vec![Program::prints("Hello!", "Hello!")]);
    let state = page.state.clone();
    let (session, _tmp) = open(page, &clock).await;

    session.editor().run_code(r#"print "Hello!""#).await.unwrap();

    let state = state.lock();
    assert_eq!(
        state.scripts,
        vec![
            r##"$("#run_info").text("");"##.to_string(),
            r#"CodeMirrorEditor.setValue('print "Hello!"');"#.to_string(),
        ]
    );
}

#[tokio::test]
async fn zero_step_timeout_is_rejected() {
    let clock = ManualClock::new();
    let (session, _tmp) = open(FakePage::new(Vec::new()), &clock).await;

    let err = session.editor().execute("print 1", Some(0)).await.unwrap_err();
    assert!(matches!(err, E2eError::Config(_)));
}
