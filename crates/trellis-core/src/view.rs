//! Template handles - a resolved template identifier paired with its data
//!
//! A handle's identity is fixed at construction; its data context can be
//! augmented fluently before rendering. Actual evaluation is delegated to
//! the engine.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::Result;

pub struct View<'e> {
    engine: &'e Engine,
    name: String,
    data: Map<String, Value>,
}

impl<'e> View<'e> {
    pub(crate) fn new(engine: &'e Engine, name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            engine,
            name: name.into(),
            data,
        }
    }

    /// Add one datum to the context. Values convert via
    /// [`serde_json::Value::from`]; for whole structs use
    /// [`View::with_data`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge a serializable value's fields into the context. The value
    /// must serialize to an object.
    pub fn with_data(mut self, data: &impl Serialize) -> Result<Self> {
        if let Value::Object(map) = serde_json::to_value(data)? {
            self.data.extend(map);
        }
        Ok(self)
    }

    /// Render the template against the accumulated data context.
    pub fn render(&self) -> Result<String> {
        self.engine.render(&self.name, self.data.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}
