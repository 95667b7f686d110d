//! wot_servient: a Web of Things servient core in Rust.
//!
//! A Thing (an addressable entity with properties, actions and events) is
//! described once and reached via any transport without protocol-specific
//! application code. This crate provides the protocol-agnostic core:
//!
//! - **content**: the typed payload envelope ([`Content`]) and the pluggable
//!   codec registry mapping payloads to and from values.
//! - **types**: Forms (endpoint descriptors), data schemas and the
//!   serializable Thing Description model.
//! - **protocol**: the capability contract every transport binding implements
//!   (read/write/invoke/observe/discover) with uniform "not implemented"
//!   failure semantics, plus the refcounted shared-resource lifecycle.
//! - **thing**: server-side live state ([`ExposedThing`]) and client-side
//!   proxies ([`ConsumedThing`]).
//! - **mesh**: the in-process exposition protocol: a supervision tree of
//!   mailbox-driven tasks with a creation barrier, ask-pattern dispatch keyed
//!   by URI fragment, and per-subscription observer bridges.
//! - **servient**: the runtime tying bindings, codecs and Things together.
//!
//! Thin adapters for concrete wire protocols (HTTP, CoAP, MQTT, ...) live
//! outside this crate; they only need to satisfy the capability contract and
//! exchange [`Content`] values.

pub mod content;
pub mod error;
pub mod mesh;
pub mod protocol;
pub mod servient;
pub mod thing;
pub mod types;

pub use content::{CodecRegistry, Content, ContentCodec};
pub use error::{Result, ServientError};
pub use protocol::{
    ContentStream, ProtocolClient, ProtocolClientFactory, ProtocolServer, RefCountResource,
    ThingFilter, ThingStream,
};
pub use servient::{Servient, ServientBuilder};
pub use thing::{ConsumedThing, ExposedThing, InvokeOptions, ValueStream};
pub use types::{
    DataSchema, DataType, Form, Operation, SecurityScheme, Thing, ThingAction, ThingEvent,
    ThingProperty,
};
