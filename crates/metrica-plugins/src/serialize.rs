//! Cycle-safe structured output of a finished context.

use metrica_core::Result;
use metrica_core::context::{PluginContext, Shared};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Placeholder written in place of an already serialized shared value.
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// Serializes a [`PluginContext`] into a plain JSON tree.
///
/// Shared slots are tracked by pointer identity: the first occurrence is
/// written out, every later one becomes [`CIRCULAR_MARKER`]. Ordered sets become
/// arrays and maps become objects.
#[derive(Debug, Default)]
pub struct ContextSerializer {
    seen: HashSet<usize>,
}

impl ContextSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize(mut self, ctx: &PluginContext) -> Result<Value> {
        let mut out = Map::new();
        out.insert("login".into(), Value::String(ctx.login.to_string()));
        out.insert("repository".into(), to_value(&ctx.repository)?);
        out.insert("template".into(), Value::String(ctx.template.clone()));
        out.insert("query".into(), to_value(&ctx.query)?);

        let account = match &ctx.account {
            Some(account) if self.first_visit(account) => to_value(account.as_ref())?,
            Some(_) => Value::String(CIRCULAR_MARKER.to_string()),
            None => Value::Null,
        };
        out.insert("account".into(), account);

        out.insert("config".into(), to_value(&ctx.config)?);
        out.insert(
            "sections".into(),
            Value::Array(ctx.sections.iter().cloned().map(Value::String).collect()),
        );
        out.insert("extras".into(), to_value(&ctx.extras)?);
        out.insert("errors".into(), to_value(ctx.errors())?);
        out.insert("warnings".into(), to_value(ctx.warnings())?);
        out.insert("postscripts".into(), to_value(ctx.postscripts())?);
        out.insert("plugins".into(), self.slots(ctx.plugins()));
        out.insert("computed".into(), self.slots(ctx.computed()));
        Ok(Value::Object(out))
    }

    fn slots(&mut self, slots: &BTreeMap<String, Shared>) -> Value {
        let mut map = Map::new();
        for (name, value) in slots {
            let value = if self.first_visit(value) {
                value.as_ref().clone()
            } else {
                Value::String(CIRCULAR_MARKER.to_string())
            };
            map.insert(name.clone(), value);
        }
        Value::Object(map)
    }

    fn first_visit<T>(&mut self, shared: &Arc<T>) -> bool {
        self.seen.insert(Arc::as_ptr(shared) as *const () as usize)
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
