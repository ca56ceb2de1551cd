use serde_json::{json, Value};

use crate::{Error, Result};

/// Api id of the login api, always available before login.
pub const LOGIN_API: u64 = 1;

/// One remote procedure call: a method on one of the node's apis.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    api_id: u64,
    method: String,
    params: Value,
    idempotent: bool,
}

impl Call {
    pub fn new(api_id: u64, method: &str, params: Value) -> Call {
        Call {
            api_id,
            method: String::from(method),
            params,
            idempotent: false,
        }
    }

    /// Mark the call as safe to resend after a reconnect. Calls that are not
    /// idempotent fail with `Error::ConnectionLost` when the socket drops.
    pub fn idempotent(mut self) -> Call {
        self.idempotent = true;
        self
    }

    pub fn get_api_id(&self) -> u64 {
        self.api_id
    }

    pub fn get_method(&self) -> &str {
        &self.method
    }

    pub fn get_params(&self) -> &Value {
        &self.params
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// `{"id": id, "method": "call", "params": [api_id, method, params]}`
    pub fn to_frame(&self, id: u64) -> String {
        json!({
            "id": id,
            "method": "call",
            "params": [self.api_id, self.method, self.params],
        })
        .to_string()
    }
}

/// A message pushed by the node.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The answer to the call with this id.
    Response { id: u64, outcome: Result<Value> },
    /// Anything without a call id, handed to the subscription managers.
    Notification(Value),
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<InboundMessage> {
        let message: Value = serde_json::from_str(text)?;
        if !message.is_object() {
            return Err(Error::Decode(format!("unexpected frame {}", text)));
        }
        let id = match message.get("id").and_then(Value::as_u64) {
            Some(id) if message.get("method").is_none() => id,
            _ => return Ok(InboundMessage::Notification(message)),
        };
        let outcome = match message.get("error") {
            Some(error) => Err(protocol_error(error)),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        Ok(InboundMessage::Response { id, outcome })
    }
}

// prefer the detailed fc exception in `data` over the generic envelope fields
fn protocol_error(error: &Value) -> Error {
    let data = error.get("data");
    let code = data
        .and_then(|data| data.get("code"))
        .or_else(|| error.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let message = data
        .and_then(|data| data.get("message"))
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| error.to_string());
    Error::Protocol { code, message }
}
