//! End-to-end command protocol tests over a live scheduler.
//!
//! These drive the dispatcher directly (no HTTP) so they can assert on the
//! exact rendered documents and on scheduler side effects.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use taskserv::access::AccessPolicy;
use taskserv::config::{ServiceConfig, TaskDefinition};
use taskserv::error::TaskServError;
use taskserv::protocol::CommandDispatcher;
use taskserv::scheduler::{SchedulerHandle, SchedulerParams, TaskOutcome, TaskScheduler};
use taskserv::startup;
use taskserv::supervisor::{ShutdownSignal, Supervisor};

const SESSION_XML: &str = concat!(
    "<info><![CDATA[Done with success]]></info>",
    "<rowset type=\"user\"><row>",
    "<field name=\"valid\"><![CDATA[true]]></field>",
    "<field name=\"user\"><![CDATA[admin]]></field>",
    "<field name=\"guestUser\"><![CDATA[guest]]></field>",
    "<field name=\"lastName\"><![CDATA[admin]]></field>",
    "<field name=\"firstName\"><![CDATA[admin]]></field>",
    "<field name=\"email\"><![CDATA[none]]></field>",
    "</row></rowset>",
);

const SUCCESS_XML: &str = "<info><![CDATA[Done with success]]></info>";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn service_map(ips: Option<&str>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(
        "jdbc_url".to_owned(),
        "jdbc:postgresql://db/tasks".to_owned(),
    );
    map.insert("router_user".to_owned(), "router".to_owned());
    map.insert("router_pass".to_owned(), "secret".to_owned());
    map.insert(
        "exclusion_server_url".to_owned(),
        "https://exclusion.example.org".to_owned(),
    );
    map.insert("server_name".to_owned(), "protocol-test".to_owned());
    if let Some(ips) = ips {
        map.insert("ips".to_owned(), ips.to_owned());
    }
    map
}

fn definition(name: &str, command: &str, interval_secs: u64) -> TaskDefinition {
    TaskDefinition {
        name: name.to_owned(),
        command: command.to_owned(),
        description: None,
        locks: Vec::new(),
        priority: 0,
        interval_secs,
    }
}

fn scheduler_params() -> SchedulerParams {
    let config = ServiceConfig::from_map(&service_map(None)).unwrap();
    SchedulerParams::from_config(&config)
}

/// Dispatcher over a hand-built scheduler, for tests that need a custom
/// executor or tick interval.
fn custom_app(
    ips: Option<&str>,
    scheduler: SchedulerHandle,
) -> (CommandDispatcher<SchedulerHandle>, ShutdownSignal) {
    let signal = ShutdownSignal::new();
    let supervisor = Arc::new(Supervisor::with_scheduler(scheduler, signal.clone()));
    (
        CommandDispatcher::new(supervisor, AccessPolicy::from_ips(ips)),
        signal,
    )
}

fn no_args() -> BTreeMap<String, String> {
    BTreeMap::new()
}

// ---------------------------------------------------------------------------
// Document surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_session_info_returns_the_fixed_descriptor() {
    let app = startup::init(&service_map(None), Vec::new(), ShutdownSignal::new()).unwrap();

    let doc = app
        .dispatcher
        .execute("GetSessionInfo", &no_args(), "127.0.0.1")
        .await
        .unwrap();
    assert_eq!(doc.render(), SESSION_XML);

    app.supervisor.stop().await;
    app.supervisor.join().await.unwrap();
}

#[tokio::test]
async fn task_status_reflects_a_completed_run() {
    let signal = ShutdownSignal::new();
    let app = startup::init(
        &service_map(None),
        vec![definition("touch", "true", 3600)],
        signal,
    )
    .unwrap();

    // The default tick is one second; the first dispatch happens right away.
    let mut rendered = String::new();
    for _ in 0..200 {
        let doc = app
            .dispatcher
            .execute("GetTasksStatus", &no_args(), "127.0.0.1")
            .await
            .unwrap();
        rendered = doc.render();
        if rendered.contains("<field name=\"step\"><![CDATA[1]]></field>") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    assert!(rendered.starts_with(SUCCESS_XML));
    assert!(rendered.contains("<rowset><row>"));
    assert!(rendered.contains("<field name=\"name\"><![CDATA[touch]]></field>"));
    assert!(rendered.contains("<field name=\"command\"><![CDATA[true]]></field>"));
    assert!(rendered.contains("<field name=\"running\"><![CDATA[false]]></field>"));
    assert!(rendered.contains("<field name=\"success\"><![CDATA[true]]></field>"));
    assert!(rendered.contains("<field name=\"step\"><![CDATA[1]]></field>"));
    // No description was configured.
    assert!(rendered.contains("<field name=\"description\"><![CDATA[null]]></field>"));

    app.supervisor.stop().await;
    app.supervisor.join().await.unwrap();
}

#[tokio::test]
async fn running_task_renders_null_success_and_a_last_run_date() {
    let gate = Arc::new(AtomicBool::new(false));
    let release = Arc::clone(&gate);
    let scheduler = TaskScheduler::new(scheduler_params())
        .with_tick_interval(Duration::from_millis(10))
        .with_task(definition("slow", "irrelevant", 3600))
        .with_executor(Box::new(move |_| {
            while !release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            TaskOutcome::Success
        }))
        .start();
    let (dispatcher, _signal) = custom_app(None, scheduler);

    let mut rendered = String::new();
    for _ in 0..200 {
        let doc = dispatcher
            .execute("GetTasksStatus", &no_args(), "127.0.0.1")
            .await
            .unwrap();
        rendered = doc.render();
        if rendered.contains("<field name=\"running\"><![CDATA[true]]></field>") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(rendered.contains("<field name=\"running\"><![CDATA[true]]></field>"));
    assert!(rendered.contains("<field name=\"success\"><![CDATA[null]]></field>"));
    assert!(!rendered.contains("<field name=\"lastRunDate\"><![CDATA[null]]></field>"));

    gate.store(true, Ordering::SeqCst);
    dispatcher
        .execute("StopServer", &no_args(), "127.0.0.1")
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scheduler effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lock_suspends_dispatch_until_unlock() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let scheduler = TaskScheduler::new(scheduler_params())
        .with_tick_interval(Duration::from_millis(10))
        .with_task(definition("fast", "irrelevant", 0))
        .with_executor(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            TaskOutcome::Success
        }))
        .start();
    let (dispatcher, _signal) = custom_app(None, scheduler);

    let doc = dispatcher
        .execute("LockScheduler", &no_args(), "127.0.0.1")
        .await
        .unwrap();
    assert_eq!(doc.render(), SUCCESS_XML);

    // Wait out any run dispatched before the lock landed.
    let mut settled = false;
    for _ in 0..100 {
        let rendered = dispatcher
            .execute("GetTasksStatus", &no_args(), "127.0.0.1")
            .await
            .unwrap()
            .render();
        if rendered.contains("<field name=\"running\"><![CDATA[false]]></field>") {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(settled, "in-flight run never finished");

    let before = runs.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(runs.load(Ordering::SeqCst), before, "ran while locked");

    dispatcher
        .execute("UnlockScheduler", &no_args(), "127.0.0.1")
        .await
        .unwrap();
    let mut resumed = false;
    for _ in 0..200 {
        if runs.load(Ordering::SeqCst) > before {
            resumed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(resumed, "did not resume after unlock");

    dispatcher
        .execute("StopServer", &no_args(), "127.0.0.1")
        .await
        .unwrap();
}

#[tokio::test]
async fn stop_server_drains_and_triggers_shutdown() {
    let scheduler = TaskScheduler::new(scheduler_params())
        .with_tick_interval(Duration::from_millis(10))
        .start();
    let (dispatcher, signal) = custom_app(None, scheduler);

    let doc = dispatcher
        .execute("StopServer", &no_args(), "127.0.0.1")
        .await
        .unwrap();
    assert_eq!(doc.render(), SUCCESS_XML);
    assert!(signal.is_triggered());

    // Stopping an already-stopped server still succeeds.
    let doc = dispatcher
        .execute("StopServer", &no_args(), "127.0.0.1")
        .await
        .unwrap();
    assert_eq!(doc.render(), SUCCESS_XML);
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_origin_gets_the_exact_error_text() {
    let app = startup::init(
        &service_map(Some("10.0.0.1")),
        Vec::new(),
        ShutdownSignal::new(),
    )
    .unwrap();

    let err = app
        .dispatcher
        .execute("GetTasksStatus", &no_args(), "192.168.0.9")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "access denied for origin `192.168.0.9`"
    );

    let err = app
        .dispatcher
        .execute("Bogus", &no_args(), "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "command not found: `Bogus`");

    // Public command still answers a denied origin.
    let doc = app
        .dispatcher
        .execute("GetSessionInfo", &no_args(), "192.168.0.9")
        .await
        .unwrap();
    assert_eq!(doc.render(), SESSION_XML);

    app.supervisor.stop().await;
    app.supervisor.join().await.unwrap();
}

#[tokio::test]
async fn help_and_usage_respect_the_allowlist() {
    let app = startup::init(
        &service_map(Some("10.0.0.1")),
        Vec::new(),
        ShutdownSignal::new(),
    )
    .unwrap();

    assert_eq!(
        app.dispatcher.describe_help("GetSessionInfo", "192.168.0.9").unwrap(),
        "Get session info"
    );
    assert_eq!(
        app.dispatcher.describe_help("GetTasksStatus", "10.0.0.1").unwrap(),
        "Get task status"
    );
    assert_eq!(
        app.dispatcher.describe_help("LockScheduler", "10.0.0.1").unwrap(),
        "Lock the scheduler"
    );
    assert_eq!(
        app.dispatcher.describe_help("UnlockScheduler", "10.0.0.1").unwrap(),
        "Unlock the scheduler"
    );
    assert_eq!(
        app.dispatcher.describe_help("StopServer", "10.0.0.1").unwrap(),
        "Stop the server"
    );

    assert!(matches!(
        app.dispatcher.describe_help("StopServer", "192.168.0.9"),
        Err(TaskServError::AccessDenied(_))
    ));
    assert!(matches!(
        app.dispatcher.describe_usage("LockScheduler", "192.168.0.9"),
        Err(TaskServError::AccessDenied(_))
    ));
    assert_eq!(
        app.dispatcher.describe_usage("StopServer", "10.0.0.1").unwrap(),
        None
    );

    app.supervisor.stop().await;
    app.supervisor.join().await.unwrap();
}
