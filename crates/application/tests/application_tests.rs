use application::worker::{ContinuousWorker, from_fn};
use application::{Application, MachineState, StateMachine};
use domain::{AlarmState, DomainError, TagHistory, TagName, TagType, WorkerStatus};
use infrastructure::{InMemoryEventArchive, InMemoryTagHistory, RuntimeConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const PLANT: &str = r#"
[[tags]]
name = "level"
type = "float"

[[tags]]
name = "inlet"
type = "bool"
initial = true

[[tags]]
name = "mixer_stop"
type = "bool"

[[alarms]]
name = "high_level"
tag = "level"
description = "Tank level high"
priority = 2
trigger = { operator = "Greater", setpoint = 80.0 }

[[controls]]
name = "close_inlet"
tag = "level"
trigger = { operator = "GreaterOrEqual", setpoint = 90.0 }
target = "inlet"
value = false

[scheduler]
alarm_period_ms = 20
control_period_ms = 20
machine_period_ms = 20
drain_policy = "all"

[logging]
period_ms = 50
tags = ["level"]
"#;

async fn plant() -> (Application, Arc<InMemoryEventArchive>, Arc<InMemoryTagHistory>) {
    let archive = Arc::new(InMemoryEventArchive::new());
    let history = Arc::new(InMemoryTagHistory::new());
    let config = RuntimeConfig::from_toml(PLANT).unwrap();
    let app = Application::from_config(config, archive.clone(), history.clone())
        .await
        .unwrap();
    (app, archive, history)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Batch {
    Idle,
    Filling,
}

impl MachineState for Batch {
    fn states() -> &'static [Self] {
        &[Batch::Idle, Batch::Filling]
    }

    fn name(&self) -> &'static str {
        match self {
            Batch::Idle => "idle",
            Batch::Filling => "filling",
        }
    }
}

#[tokio::test]
async fn test_write_port_reports_rejections() {
    let (app, _, _) = plant().await;

    assert!(app.write("level", json!("42.5")).result);
    assert_eq!(app.read("level").unwrap(), json!(42.5));

    assert!(!app.write("level", json!("not a number")).result);
    assert!(!app.write("unknown", json!(1)).result);
    assert!(matches!(app.read("unknown"), Err(DomainError::TagNotFound(_))));
}

#[tokio::test]
async fn test_alarm_ports_for_unknown_alarm() {
    let (app, _, _) = plant().await;

    assert!(app.get_alarm("nope").await.is_none());
    assert!(app.acknowledge_alarm("nope").await.is_none());
    assert!(app.shelve_alarm("nope", None).await.is_none());
    assert!(app.unshelve_alarm("nope").await.is_none());

    let shelved = app.shelve_alarm("high_level", None).await.unwrap();
    assert_eq!(shelved.state, AlarmState::Shelved);
    assert_eq!(
        app.unshelve_alarm("high_level").await.unwrap().state,
        AlarmState::Normal
    );
}

#[tokio::test]
async fn test_register_validates_worker_tags() {
    let (app, _, _) = plant().await;

    let result = app.register(
        ContinuousWorker::builder(from_fn(|_| Ok(()))).stop_tag("no_such_tag"),
    );
    assert!(matches!(result, Err(DomainError::TagNotFound(_))));
    assert!(app.workers().is_empty());
}

#[tokio::test]
async fn test_start_fails_on_unknown_alarm_tag() {
    let app = Application::new(
        Arc::new(InMemoryEventArchive::new()),
        Arc::new(InMemoryTagHistory::new()),
    );
    app.append_alarm(domain::Alarm::new(
        "ghost",
        TagName::new("ghost").unwrap(),
        domain::Condition::threshold(domain::Operator::Greater, 1.0),
    ))
    .await
    .unwrap();

    let err = app.start().await.unwrap_err();
    assert!(err.to_string().contains("alarm engine"));
}

#[tokio::test]
async fn test_failed_start_can_be_retried() {
    let app = Application::new(
        Arc::new(InMemoryEventArchive::new()),
        Arc::new(InMemoryTagHistory::new()),
    );
    app.append_alarm(domain::Alarm::new(
        "ghost",
        TagName::new("ghost").unwrap(),
        domain::Condition::threshold(domain::Operator::Greater, 1.0),
    ))
    .await
    .unwrap();
    let worker = app
        .register(ContinuousWorker::builder(from_fn(|_| Ok(()))).name("idle"))
        .unwrap();

    assert!(app.start().await.is_err());

    // Nothing was spawned and registration is still open
    assert_eq!(worker.status(), WorkerStatus::Stop);
    app.every("tick", Duration::from_millis(10), from_fn(|_| Ok(())))
        .unwrap();

    app.define_tag(&TagName::new("ghost").unwrap(), TagType::Float, None)
        .unwrap();
    let scheduler = app.start().await.unwrap();
    assert!(app.start().await.unwrap_err().to_string().contains("already started"));

    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_registration_after_start_is_refused() {
    let (app, _, _) = plant().await;
    let scheduler = app.start().await.unwrap();
    let before = app.workers().len();

    let late = app.register(
        ContinuousWorker::builder(from_fn(|_| Ok(()))).name("late"),
    );
    assert!(matches!(late, Err(DomainError::InvalidConfiguration(_))));
    assert!(matches!(
        app.every("late_tick", Duration::from_millis(10), from_fn(|_| Ok(()))),
        Err(DomainError::InvalidConfiguration(_))
    ));

    assert_eq!(app.workers().len(), before);
    assert!(app.worker("late").is_none());

    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_alarm_condition_keeps_plant_running() {
    let (app, _, _) = plant().await;
    app.append_alarm(domain::Alarm::new(
        "overflow_sensor",
        TagName::new("level").unwrap(),
        domain::Condition::custom(|value| {
            if value.as_f64().is_some_and(|v| v > 90.0) {
                panic!("sensor driver fault");
            }
            Ok(false)
        }),
    ))
    .await
    .unwrap();
    let scheduler = app.start().await.unwrap();

    assert!(app.write("level", json!(95.0)).result);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(
        app.get_alarm("high_level").await.unwrap().state,
        AlarmState::Unacknowledged
    );
    assert_eq!(app.read("inlet").unwrap(), json!(false));
    assert!(scheduler.finished().is_empty());

    // Later changes are still evaluated
    app.acknowledge_alarm("high_level").await.unwrap();
    assert!(app.write("level", json!(10.0)).result);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        app.get_alarm("high_level").await.unwrap().state,
        AlarmState::ReturnedToNormal
    );

    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_plant() {
    let (app, archive, history) = plant().await;

    app.define_tag(&TagName::new("batches").unwrap(), TagType::Int, None)
        .unwrap();
    let mixer = app
        .register(
            ContinuousWorker::builder(from_fn(|tags| {
                let n = tags.read("batches")?.as_i64().unwrap_or(0);
                tags.write("batches", Value::from(n + 1))?;
                Ok(())
            }))
            .name("mixer")
            .period(Duration::from_millis(20))
            .stop_tag("mixer_stop"),
        )
        .unwrap();

    let machine = StateMachine::builder("batch", Batch::Idle, ())
        .on(Batch::Idle, |_, tags| {
            let inlet = tags.read("inlet")?;
            Ok((inlet == json!(true)).then_some(Batch::Filling))
        })
        .on(Batch::Filling, |_, tags| {
            let inlet = tags.read("inlet")?;
            Ok((inlet == json!(false)).then_some(Batch::Idle))
        })
        .build()
        .unwrap();
    app.append_machine(machine).await.unwrap();

    let scheduler = app.start().await.unwrap();
    assert!(app.start().await.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.machines().await[0].state, "filling");
    assert_eq!(mixer.status(), WorkerStatus::Running);

    assert!(app.write("level", json!(95.0)).result);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(app.read("inlet").unwrap(), json!(false));
    assert_eq!(
        app.get_alarm("high_level").await.unwrap().state,
        AlarmState::Unacknowledged
    );
    assert_eq!(app.machines().await[0].state, "idle");
    assert!(!archive.alarm_records().await.is_empty());

    let acked = app.acknowledge_alarm("high_level").await.unwrap();
    assert_eq!(acked.state, AlarmState::Acknowledged);

    assert!(mixer.stop().unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mixer.status(), WorkerStatus::Stop);
    assert!(!mixer.pause().unwrap());

    let summary = app.summary().await;
    assert_eq!(summary.alarms.alarms, vec!["high_level"]);
    assert_eq!(summary.machines.len(), 1);
    let names: Vec<_> = summary.workers.iter().filter_map(|w| w.name.clone()).collect();
    assert_eq!(names, vec!["mixer", "logger"]);

    assert!(history.len("level").await > 0);
    let samples = history.get_history("level").await.unwrap();
    assert_eq!(samples.last().unwrap().value, json!(95.0));

    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .expect("every worker should observe cancellation");
    let logger = app.worker("logger").unwrap();
    assert_eq!(logger.status(), WorkerStatus::Stop);
}
