//! Expose-and-consume example
//!
//! Exposes a counter Thing over the mesh binding, then consumes it through
//! the same servient: reads, writes, invokes an action and watches an event.
//!
//! Run with: cargo run --example counter

use serde_json::json;
use std::sync::Arc;
use wot_servient::mesh::MeshConfig;
use wot_servient::{
    DataSchema, DataType, ExposedThing, Servient, Thing, ThingAction, ThingEvent, ThingProperty,
};

#[tokio::main]
async fn main() -> wot_servient::Result<()> {
    let servient = Servient::builder()
        .with_mesh(MeshConfig::default())
        .build();
    servient.start().await?;

    let description = Thing::new("Counter")
        .with_id("urn:dev:counter")
        .with_description("A counter with a reset action")
        .with_property("count", ThingProperty::of(DataType::Integer).observable())
        .with_action(
            "reset",
            ThingAction::default().with_output(DataSchema::of(DataType::Integer)),
        )
        .with_event(
            "reset-happened",
            ThingEvent::default().with_data(DataSchema::of(DataType::Integer)),
        );

    let thing = Arc::new(ExposedThing::new(description));
    thing
        .action("reset")
        .ok_or_else(|| wot_servient::ServientError::NotFound("reset".into()))?
        .set_handler(Arc::new(|_, _| Box::pin(async { Ok(Some(json!(0))) })));

    servient.expose(thing.clone()).await?;
    println!("exposed {} as {}", thing.title(), thing.id());

    let consumed = servient.consume(thing.describe());

    consumed.write_property("count", &json!(41)).await?;
    consumed.write_property("count", &json!(42)).await?;
    let count = consumed.read_property("count").await?;
    println!("count is now {count}");

    let reset_to = consumed.invoke_action("reset", None).await?;
    println!("reset returned {reset_to:?}");

    for (name, property) in thing.describe().properties {
        for form in property.forms {
            println!("property {name} reachable at {}", form.href);
        }
    }

    servient.shutdown().await?;
    Ok(())
}
