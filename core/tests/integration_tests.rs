use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wot_servient::mesh::MeshConfig;
use wot_servient::{
    DataSchema, DataType, Form, Servient, ServientError, Thing, ThingAction, ThingEvent,
    ThingProperty,
};

fn counter_description() -> Thing {
    Thing::new("Counter")
        .with_id("urn:dev:counter")
        .with_property("count", ThingProperty::of(DataType::Integer).observable())
        .with_property("label", ThingProperty::of(DataType::String).read_only())
        .with_action(
            "reset",
            ThingAction::default().with_output(DataSchema::of(DataType::Integer)),
        )
        .with_event(
            "change",
            ThingEvent::default().with_data(DataSchema::of(DataType::Integer)),
        )
}

async fn started_servient() -> Servient {
    let servient = Servient::builder()
        .with_mesh(MeshConfig::default())
        .build();
    servient.start().await.unwrap();
    servient
}

#[tokio::test]
async fn test_expose_registers_every_interaction() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    // every leaf attached exactly one mesh form
    let description = thing.describe();
    assert_eq!(description.properties["count"].forms.len(), 1);
    assert_eq!(description.properties["label"].forms.len(), 1);
    assert_eq!(description.actions["reset"].forms.len(), 1);
    assert_eq!(description.events["change"].forms.len(), 1);
    assert_eq!(description.forms.len(), 2); // #thing and #all/properties

    let form = &description.properties["count"].forms[0];
    assert_eq!(
        form.href,
        "mesh://servient/things/urn:dev:counter#properties/count"
    );
    assert_eq!(form.scheme().as_deref(), Some("mesh"));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_expose_empty_thing_is_immediately_ready() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(
        Thing::new("Empty").with_id("urn:dev:empty"),
    ));
    servient.expose(thing).await.unwrap();
    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_expose_rejected() {
    let servient = started_servient().await;
    let first = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    let second = Arc::new(wot_servient::ExposedThing::new(counter_description()));

    servient.expose(first).await.unwrap();
    let err = servient.expose(second).await.unwrap_err();
    assert!(matches!(err, ServientError::AlreadyExposed(_)));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_read_write_property_end_to_end() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    assert_eq!(consumed.read_property("count").await.unwrap(), Value::Null);

    consumed.write_property("count", &json!(1337)).await.unwrap();
    assert_eq!(consumed.read_property("count").await.unwrap(), json!(1337));
    assert_eq!(
        thing.property("count").unwrap().last_value(),
        Some(json!(1337))
    );

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_read_only_property_advertises_no_write() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let err = consumed
        .write_property("label", &json!("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServientError::NoBinding(_)));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invoke_action_end_to_end() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    thing.action("reset").unwrap().set_handler(Arc::new(|input, _| {
        Box::pin(async move {
            // echo back the requested floor, defaulting to zero
            let floor = input
                .and_then(|v| v.get("floor").cloned())
                .unwrap_or(json!(0));
            Ok(Some(floor))
        })
    }));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let result = consumed
        .invoke_action("reset", Some(&json!({"floor": 5})))
        .await
        .unwrap();
    assert_eq!(result, Some(json!(5)));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_read_all_properties_end_to_end() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    thing.write_property("count", json!(3)).await.unwrap();
    thing.write_property("label", json!("main")).await.unwrap();
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let all = consumed.read_all_properties().await.unwrap();
    assert_eq!(all["count"], json!(3));
    assert_eq!(all["label"], json!("main"));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_describe_and_directory_via_mesh() {
    use wot_servient::mesh::{shared_system, MeshClientFactory, MeshServer};
    use wot_servient::{
        CodecRegistry, ProtocolClient, ProtocolClientFactory, ProtocolServer, ThingFilter,
    };

    let config = MeshConfig::default();
    let shared = shared_system(&config);
    let server = MeshServer::new(
        config.clone(),
        shared.clone(),
        Arc::new(CodecRegistry::default()),
    );
    let factory = MeshClientFactory::new(config, shared.clone());
    server.start().await.unwrap();
    factory.init().await.unwrap();

    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    server.expose(thing.clone()).await.unwrap();

    // the creation barrier has closed, so every leaf is routable:
    // registry + thing node + 2 properties + 1 action + 1 event
    let system = shared.retain().unwrap();
    assert_eq!(system.route_count(), 6);
    for path in [
        "/things",
        "/things/urn:dev:counter",
        "/things/urn:dev:counter/properties/count",
        "/things/urn:dev:counter/properties/label",
        "/things/urn:dev:counter/actions/reset",
        "/things/urn:dev:counter/events/change",
    ] {
        assert!(system.has_route(path), "{path} should be bound");
    }
    shared.release().unwrap();

    let client = factory.client();
    let td = client
        .read(&Form::new("mesh://servient/things/urn:dev:counter#thing"))
        .await
        .unwrap();
    assert_eq!(td.media_type, "application/td+json");
    let parsed: Thing = serde_json::from_slice(&td.body).unwrap();
    assert_eq!(parsed.id.as_deref(), Some("urn:dev:counter"));
    assert!(parsed.properties["count"].forms[0]
        .href
        .ends_with("#properties/count"));

    let directory = client
        .read(&Form::new("mesh://servient/things#thing-directory"))
        .await
        .unwrap();
    let things: std::collections::HashMap<String, Thing> =
        serde_json::from_slice(&directory.body).unwrap();
    assert!(things.contains_key("urn:dev:counter"));

    // discover streams the same directory
    let mut found = client.discover(&ThingFilter::default()).unwrap();
    let first = found.next().await.unwrap().unwrap();
    assert_eq!(first.id.as_deref(), Some("urn:dev:counter"));

    factory.destroy().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_observe_property_receives_writes_in_order() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let mut observation = consumed.observe_property("count").unwrap();

    for i in 1..=3 {
        thing.write_property("count", json!(i)).await.unwrap();
    }
    for i in 1..=3 {
        assert_eq!(observation.next().await.unwrap().unwrap(), json!(i));
    }

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_event_per_subscriber_streams() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let mut first = consumed.subscribe_event("change").unwrap();
    let mut second = consumed.subscribe_event("change").unwrap();

    thing.emit_event("change", Some(json!(1))).unwrap();
    assert_eq!(first.next().await.unwrap().unwrap(), json!(1));
    assert_eq!(second.next().await.unwrap().unwrap(), json!(1));

    // cancelling one subscriber leaves the other running
    drop(first);
    thing.emit_event("change", Some(json!(2))).unwrap();
    assert_eq!(second.next().await.unwrap().unwrap(), json!(2));

    // a payload-less emission arrives as null
    thing.emit_event("change", None).unwrap();
    assert_eq!(second.next().await.unwrap().unwrap(), Value::Null);

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_handler_failure_times_out() {
    let config = MeshConfig::default().with_ask_timeout(Duration::from_millis(100));
    let servient = Servient::builder().with_mesh(config).build();
    servient.start().await.unwrap();

    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    thing.property("count").unwrap().set_read_handler(Arc::new(|| {
        Box::pin(async { Err(ServientError::Transport("sensor unplugged".into())) })
    }));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let err = consumed.read_property("count").await.unwrap_err();
    assert!(matches!(err, ServientError::Timeout));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_strict_mode_forwards_handler_failure() {
    let config = MeshConfig::default()
        .with_ask_timeout(Duration::from_secs(2))
        .with_strict_errors(true);
    let servient = Servient::builder().with_mesh(config).build();
    servient.start().await.unwrap();

    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    thing.property("count").unwrap().set_read_handler(Arc::new(|| {
        Box::pin(async { Err(ServientError::Transport("sensor unplugged".into())) })
    }));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let err = consumed.read_property("count").await.unwrap_err();
    assert!(matches!(err, ServientError::Transport(_)));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_destroy_unbinds_routes() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    servient.destroy("urn:dev:counter").await.unwrap();

    // the leaf is gone; a subsequent read cannot resolve it
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = consumed.read_property("count").await.unwrap_err();
    assert!(matches!(
        err,
        ServientError::NotFound(_) | ServientError::Transport(_)
    ));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_write_then_notify_with_handler() {
    let servient = started_servient().await;
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    thing
        .property("count")
        .unwrap()
        .set_write_handler(Arc::new(|value| {
            Box::pin(async move {
                let clamped = value.as_i64().unwrap_or(0).min(100);
                Ok(json!(clamped))
            })
        }));
    servient.expose(thing.clone()).await.unwrap();

    let consumed = servient.consume(thing.describe());
    let mut observation = consumed.observe_property("count").unwrap();

    consumed.write_property("count", &json!(1337)).await.unwrap();

    // the handler's result, not the raw input, is stored and notified
    assert_eq!(observation.next().await.unwrap().unwrap(), json!(100));
    assert_eq!(consumed.read_property("count").await.unwrap(), json!(100));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fallback_codec_for_unknown_media_type() {
    let servient = started_servient().await;
    let codecs = servient.codecs();
    assert!(!codecs.is_supported("none/none"));

    let content = codecs.value_to_content(&json!(42), "none/none").unwrap();
    let value = codecs
        .content_to_value(&content, &DataSchema::default())
        .unwrap();
    assert_eq!(value, json!(42));

    servient.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_servient_restart_cycle() {
    let servient = started_servient().await;
    servient.shutdown().await.unwrap();

    // a second start/shutdown pair works because the shared system is
    // recreated on retain
    servient.start().await.unwrap();
    let thing = Arc::new(wot_servient::ExposedThing::new(counter_description()));
    servient.expose(thing).await.unwrap();
    servient.shutdown().await.unwrap();
}
