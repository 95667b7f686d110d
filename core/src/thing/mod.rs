//! Runtime views of a Thing: server-side exposed state and client-side proxies.

mod consumed;
mod exposed;

pub use consumed::{ConsumedThing, ValueStream};
pub use exposed::{
    ActionHandler, ExposedAction, ExposedEvent, ExposedProperty, ExposedThing, InvokeOptions,
    PropertyReadHandler, PropertyWriteHandler,
};
