//! Server-side live state of an exposed Thing.
//!
//! An [`ExposedThing`] wraps a Thing Description with runtime state per
//! interaction: the current property value, optional read/write/action
//! handlers, a push-notification subject and the Forms accumulated as bindings
//! register the interaction. It is owned exclusively by the exposing servient
//! and mutated only through `read()`/`write()`/`invoke()`/`emit()`.

use crate::error::{Result, ServientError};
use crate::types::{Form, Thing, ThingAction, ThingEvent, ThingProperty};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Async handler producing a property value on read.
pub type PropertyReadHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Async handler transforming a written value; its result becomes the stored
/// state.
pub type PropertyWriteHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Async handler backing an action invocation.
pub type ActionHandler = Arc<
    dyn Fn(Option<Value>, InvokeOptions) -> BoxFuture<'static, Result<Option<Value>>>
        + Send
        + Sync,
>;

/// Per-invocation options forwarded to an action handler.
#[derive(Clone, Debug, Default)]
pub struct InvokeOptions {
    /// Values bound to the interaction's URI variables.
    pub uri_variables: HashMap<String, Value>,
}

/// Multicast, replay-nothing notification channel.
///
/// Subscribers receive independent copies of notifications pushed after they
/// subscribed; nothing is replayed. Closed receivers are pruned on the next
/// push.
struct Subject {
    subscribers: Mutex<Vec<async_channel::Sender<Option<Value>>>>,
}

impl Subject {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn next(&self, item: Option<Value>) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.try_send(item.clone()).is_ok());
    }

    fn observe(&self) -> async_channel::Receiver<Option<Value>> {
        let (tx, rx) = async_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Live state of one exposed property.
pub struct ExposedProperty {
    name: String,
    description: ThingProperty,
    state: Mutex<Option<Value>>,
    read_handler: Mutex<Option<PropertyReadHandler>>,
    write_handler: Mutex<Option<PropertyWriteHandler>>,
    subject: Subject,
    forms: Mutex<Vec<Form>>,
}

impl ExposedProperty {
    fn new(name: String, description: ThingProperty) -> Self {
        Self {
            name,
            description,
            state: Mutex::new(None),
            read_handler: Mutex::new(None),
            write_handler: Mutex::new(None),
            subject: Subject::new(),
            forms: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &ThingProperty {
        &self.description
    }

    /// Install a read handler; subsequent reads go through it instead of the
    /// stored value.
    pub fn set_read_handler(&self, handler: PropertyReadHandler) {
        *self.read_handler.lock() = Some(handler);
    }

    /// Install a write handler; its result becomes the stored state.
    pub fn set_write_handler(&self, handler: PropertyWriteHandler) {
        *self.write_handler.lock() = Some(handler);
    }

    /// Read the property: through the handler when installed, otherwise the
    /// stored value (`null` before the first write).
    pub async fn read(&self) -> Result<Value> {
        let handler = self.read_handler.lock().clone();
        match handler {
            Some(handler) => handler().await,
            None => Ok(self.state.lock().clone().unwrap_or(Value::Null)),
        }
    }

    /// Write the property and push exactly one notification.
    ///
    /// With a write handler installed, the handler's result (not the raw
    /// input) is stored and notified. Returns the stored value.
    pub async fn write(&self, value: Value) -> Result<Value> {
        let handler = self.write_handler.lock().clone();
        let stored = match handler {
            Some(handler) => handler(value).await?,
            None => value,
        };
        *self.state.lock() = Some(stored.clone());
        self.subject.next(Some(stored.clone()));
        Ok(stored)
    }

    /// The stored value, bypassing any read handler.
    #[must_use]
    pub fn last_value(&self) -> Option<Value> {
        self.state.lock().clone()
    }

    /// Subscribe to change notifications pushed from now on.
    pub fn observer(&self) -> async_channel::Receiver<Option<Value>> {
        self.subject.observe()
    }

    /// Attach a Form registered by a binding.
    pub fn add_form(&self, form: Form) {
        self.forms.lock().push(form);
    }

    /// Forms accumulated so far.
    #[must_use]
    pub fn forms(&self) -> Vec<Form> {
        self.forms.lock().clone()
    }
}

/// Live state of one exposed action.
pub struct ExposedAction {
    name: String,
    description: ThingAction,
    handler: Mutex<Option<ActionHandler>>,
    forms: Mutex<Vec<Form>>,
}

impl ExposedAction {
    fn new(name: String, description: ThingAction) -> Self {
        Self {
            name,
            description,
            handler: Mutex::new(None),
            forms: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &ThingAction {
        &self.description
    }

    pub fn set_handler(&self, handler: ActionHandler) {
        *self.handler.lock() = Some(handler);
    }

    /// Invoke the action. A handler returning no value still completes
    /// successfully, carrying `None`.
    pub async fn invoke(&self, input: Option<Value>, options: InvokeOptions) -> Result<Option<Value>> {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler(input, options).await,
            None => Err(ServientError::HandlerMissing(self.name.clone())),
        }
    }

    pub fn add_form(&self, form: Form) {
        self.forms.lock().push(form);
    }

    #[must_use]
    pub fn forms(&self) -> Vec<Form> {
        self.forms.lock().clone()
    }
}

/// Live state of one exposed event.
pub struct ExposedEvent {
    name: String,
    description: ThingEvent,
    subject: Subject,
    forms: Mutex<Vec<Form>>,
}

impl ExposedEvent {
    fn new(name: String, description: ThingEvent) -> Self {
        Self {
            name,
            description,
            subject: Subject::new(),
            forms: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &ThingEvent {
        &self.description
    }

    /// Emit the event to every subscriber. `None` is a payload-less
    /// notification. Does not touch any property state.
    pub fn emit(&self, data: Option<Value>) {
        self.subject.next(data);
    }

    /// Subscribe to emissions pushed from now on.
    pub fn observer(&self) -> async_channel::Receiver<Option<Value>> {
        self.subject.observe()
    }

    pub fn add_form(&self, form: Form) {
        self.forms.lock().push(form);
    }

    #[must_use]
    pub fn forms(&self) -> Vec<Form> {
        self.forms.lock().clone()
    }
}

/// Server-side runtime state of a Thing being exposed.
pub struct ExposedThing {
    thing: Thing,
    id: String,
    properties: HashMap<String, Arc<ExposedProperty>>,
    actions: HashMap<String, Arc<ExposedAction>>,
    events: HashMap<String, Arc<ExposedEvent>>,
    forms: Mutex<Vec<Form>>,
}

impl ExposedThing {
    /// Build runtime state from a description. A missing id gets a generated
    /// `urn:uuid:` identifier.
    pub fn new(thing: Thing) -> Self {
        let id = thing
            .id
            .clone()
            .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));

        let properties = thing
            .properties
            .iter()
            .map(|(name, p)| {
                (
                    name.clone(),
                    Arc::new(ExposedProperty::new(name.clone(), p.clone())),
                )
            })
            .collect();
        let actions = thing
            .actions
            .iter()
            .map(|(name, a)| {
                (
                    name.clone(),
                    Arc::new(ExposedAction::new(name.clone(), a.clone())),
                )
            })
            .collect();
        let events = thing
            .events
            .iter()
            .map(|(name, e)| {
                (
                    name.clone(),
                    Arc::new(ExposedEvent::new(name.clone(), e.clone())),
                )
            })
            .collect();

        Self {
            thing,
            id,
            properties,
            actions,
            events,
            forms: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.thing.title
    }

    pub fn property(&self, name: &str) -> Option<&Arc<ExposedProperty>> {
        self.properties.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&Arc<ExposedAction>> {
        self.actions.get(name)
    }

    pub fn event(&self, name: &str) -> Option<&Arc<ExposedEvent>> {
        self.events.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&String, &Arc<ExposedProperty>)> {
        self.properties.iter()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&String, &Arc<ExposedAction>)> {
        self.actions.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = (&String, &Arc<ExposedEvent>)> {
        self.events.iter()
    }

    /// Read one property by name.
    pub async fn read_property(&self, name: &str) -> Result<Value> {
        match self.properties.get(name) {
            Some(property) => property.read().await,
            None => Err(ServientError::NotFound(format!("property {name}"))),
        }
    }

    /// Write one property by name.
    pub async fn write_property(&self, name: &str, value: Value) -> Result<Value> {
        match self.properties.get(name) {
            Some(property) => property.write(value).await,
            None => Err(ServientError::NotFound(format!("property {name}"))),
        }
    }

    /// Invoke one action by name.
    pub async fn invoke_action(
        &self,
        name: &str,
        input: Option<Value>,
        options: InvokeOptions,
    ) -> Result<Option<Value>> {
        match self.actions.get(name) {
            Some(action) => action.invoke(input, options).await,
            None => Err(ServientError::NotFound(format!("action {name}"))),
        }
    }

    /// Emit one event by name.
    pub fn emit_event(&self, name: &str, data: Option<Value>) -> Result<()> {
        match self.events.get(name) {
            Some(event) => {
                event.emit(data);
                Ok(())
            }
            None => Err(ServientError::NotFound(format!("event {name}"))),
        }
    }

    /// Read every readable property into a name→value map. Write-only
    /// properties are skipped.
    pub async fn read_all_properties(&self) -> Result<serde_json::Map<String, Value>> {
        let mut values = serde_json::Map::new();
        for (name, property) in &self.properties {
            if property.description().write_only {
                continue;
            }
            values.insert(name.clone(), property.read().await?);
        }
        Ok(values)
    }

    /// Attach a thing-level Form registered by a binding.
    pub fn add_form(&self, form: Form) {
        self.forms.lock().push(form);
    }

    /// Snapshot of the description with the Forms accumulated at runtime
    /// merged in, ready to hand to consumers.
    #[must_use]
    pub fn describe(&self) -> Thing {
        let mut thing = self.thing.clone();
        thing.id = Some(self.id.clone());
        thing.forms = self.forms.lock().clone();
        for (name, property) in &self.properties {
            if let Some(description) = thing.properties.get_mut(name) {
                description.forms = property.forms();
            }
        }
        for (name, action) in &self.actions {
            if let Some(description) = thing.actions.get_mut(name) {
                description.forms = action.forms();
            }
        }
        for (name, event) in &self.events {
            if let Some(description) = thing.events.get_mut(name) {
                description.forms = event.forms();
            }
        }
        thing
    }
}
