use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client function that displays an alert dialog.
pub const ALERT_FUNCTION: &str = "fujion.alert";

/// A server to client instruction: call `function` on `target` with
/// positional `arguments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInvocation {
    #[serde(rename = "fcn")]
    function: String,
    #[serde(rename = "tgt", default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(rename = "arg", default)]
    arguments: Vec<Value>,
}

impl ClientInvocation {
    pub fn new(function: impl Into<String>, target: Option<String>, arguments: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            target,
            arguments,
        }
    }

    /// Invocation with no target, addressed to the client runtime itself.
    pub fn global(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::new(function, None, arguments)
    }

    pub fn alert(text: impl Into<String>, title: &str, flavor: &str) -> Self {
        Self::global(
            ALERT_FUNCTION,
            vec![
                Value::String(text.into()),
                Value::String(title.to_string()),
                Value::String(flavor.to_string()),
            ],
        )
    }

    pub fn with_argument(mut self, argument: impl Into<Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Wire map: `fcn`, optional `tgt`, and `arg`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("fcn".to_string(), Value::String(self.function.clone()));
        if let Some(target) = &self.target {
            map.insert("tgt".to_string(), Value::String(target.clone()));
        }
        map.insert("arg".to_string(), Value::Array(self.arguments.clone()));
        map
    }
}
