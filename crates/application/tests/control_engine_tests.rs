use application::control::{Control, ControlEngine, Rule};
use application::tag::TagStore;
use domain::{Condition, DomainError, Operator, TagName, TagType};
use serde_json::{Value, json};
use std::sync::Arc;

fn name(s: &str) -> TagName {
    TagName::new(s).unwrap()
}

fn store() -> Arc<TagStore> {
    let store = Arc::new(TagStore::new());
    store.define(&name("level"), TagType::Float, None).unwrap();
    store.define(&name("flow"), TagType::Float, None).unwrap();
    store.define(&name("valve"), TagType::Bool, None).unwrap();
    store.define(&name("total"), TagType::Float, None).unwrap();
    store
}

#[tokio::test]
async fn test_control_writes_target_when_condition_holds() {
    let tags = store();
    let engine = ControlEngine::new(tags.clone());
    engine
        .append_control(Control::new(
            "close_on_high",
            name("level"),
            Condition::threshold(Operator::GreaterOrEqual, 80.0),
            name("valve"),
            json!(true),
        ))
        .await;
    engine.attach_all().await.unwrap();

    tags.write("level", json!(50.0)).unwrap();
    engine.execute("level").await;
    assert_eq!(tags.read("valve").unwrap(), json!(false));

    tags.write("level", json!(85.0)).unwrap();
    engine.execute("level").await;
    assert_eq!(tags.read("valve").unwrap(), json!(true));
}

#[tokio::test]
async fn test_rule_action_reads_other_tags() {
    let tags = store();
    let engine = ControlEngine::new(tags.clone());
    engine
        .append_rule(Rule::new(
            "sum",
            vec![name("level"), name("flow")],
            Condition::custom(|_| Ok(true)),
            |tags: &TagStore, _: &Value| {
                let level = tags.read("level")?.as_f64().unwrap_or(0.0);
                let flow = tags.read("flow")?.as_f64().unwrap_or(0.0);
                tags.write("total", json!(level + flow))?;
                Ok(())
            },
        ))
        .await;
    engine.attach_all().await.unwrap();

    tags.write("level", json!(2.0)).unwrap();
    tags.write("flow", json!(3.0)).unwrap();
    engine.execute("flow").await;

    assert_eq!(tags.read("total").unwrap(), json!(5.0));
    assert_eq!(engine.rule_tags().await, vec!["level", "flow"]);
}

#[tokio::test]
async fn test_failing_rule_does_not_block_siblings() {
    let tags = store();
    let engine = ControlEngine::new(tags.clone());
    engine
        .append_rule(Rule::new(
            "broken",
            vec![name("level")],
            Condition::custom(|_| Err("bad sensor".into())),
            |_: &TagStore, _: &Value| Ok(()),
        ))
        .await;
    engine
        .append_control(Control::new(
            "open",
            name("level"),
            Condition::threshold(Operator::Greater, 1.0),
            name("valve"),
            json!(true),
        ))
        .await;
    engine.attach_all().await.unwrap();

    tags.write("level", json!(10.0)).unwrap();
    engine.execute("level").await;
    assert_eq!(tags.read("valve").unwrap(), json!(true));
}

#[tokio::test]
async fn test_panicking_rule_does_not_block_siblings() {
    let tags = store();
    let engine = ControlEngine::new(tags.clone());
    engine
        .append_rule(Rule::new(
            "crashes",
            vec![name("level")],
            Condition::custom(|_| Ok(true)),
            |_: &TagStore, _: &Value| panic!("action crashed"),
        ))
        .await;
    engine
        .append_control(Control::new(
            "open",
            name("level"),
            Condition::threshold(Operator::Greater, 1.0),
            name("valve"),
            json!(true),
        ))
        .await;
    engine.attach_all().await.unwrap();

    tags.write("level", json!(10.0)).unwrap();
    engine.execute("level").await;
    assert_eq!(tags.read("valve").unwrap(), json!(true));

    // Next pass runs normally
    tags.write("valve", json!(false)).unwrap();
    engine.execute("level").await;
    assert_eq!(tags.read("valve").unwrap(), json!(true));
}

#[tokio::test]
async fn test_attach_all_checks_control_targets() {
    let engine = ControlEngine::new(store());
    engine
        .append_control(Control::new(
            "orphan",
            name("level"),
            Condition::threshold(Operator::Greater, 1.0),
            name("missing_valve"),
            json!(true),
        ))
        .await;

    assert!(matches!(
        engine.attach_all().await,
        Err(DomainError::TagNotFound(t)) if t == "missing_valve"
    ));
}

#[tokio::test]
async fn test_control_tags_are_distinct() {
    let engine = ControlEngine::new(store());
    for (n, setpoint) in [("a", 1.0), ("b", 2.0)] {
        engine
            .append_control(Control::new(
                n,
                name("level"),
                Condition::threshold(Operator::Greater, setpoint),
                name("valve"),
                json!(true),
            ))
            .await;
    }
    assert_eq!(engine.control_tags().await, vec!["level"]);
}
