//! Core data types of the servient: Forms, data schemas and Thing Descriptions.

mod form;
mod schema;
mod thing;

pub use form::{Form, Operation};
pub use schema::{DataSchema, DataType};
pub use thing::{SecurityScheme, Thing, ThingAction, ThingEvent, ThingProperty};
