use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{JsonRpcErrorObject, present};
use crate::types::{JsonRpcVersion, RequestId};

/// Exactly one of `result` or `error`
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Success payload (may be any JSON value, including `null`)
    Result(Value),
    /// Error payload
    Error(JsonRpcErrorObject),
}

impl ResponseOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ResponseOutcome::Error(_))
    }

    pub fn into_result(self) -> Result<Value, JsonRpcErrorObject> {
        match self {
            ResponseOutcome::Result(value) => Ok(value),
            ResponseOutcome::Error(error) => Err(error),
        }
    }
}

/// A JSON-RPC response, success or error
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub outcome: ResponseOutcome,
}

impl JsonRpcResponse {
    pub fn new(id: impl Into<RequestId>, outcome: ResponseOutcome) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id: id.into(),
            outcome,
        }
    }

    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self::new(id, ResponseOutcome::Result(result))
    }

    pub fn error(id: impl Into<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self::new(id, ResponseOutcome::Error(error))
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Result(value) => Some(value),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match &self.outcome {
            ResponseOutcome::Result(_) => None,
            ResponseOutcome::Error(error) => Some(error),
        }
    }
}

impl Serialize for JsonRpcResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("JsonRpcResponse", 3)?;
        state.serialize_field("jsonrpc", &self.version)?;
        state.serialize_field("id", &self.id)?;
        match &self.outcome {
            ResponseOutcome::Result(value) => state.serialize_field("result", value)?,
            ResponseOutcome::Error(error) => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResponse {
    jsonrpc: JsonRpcVersion,
    id: RequestId,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    error: Option<Value>,
}

impl<'de> Deserialize<'de> for JsonRpcResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawResponse::deserialize(deserializer)?;
        let outcome = match (raw.result, raw.error) {
            (Some(result), None) => ResponseOutcome::Result(result),
            (None, Some(Value::Null)) => {
                return Err(serde::de::Error::custom("response 'error' must not be null"));
            }
            (None, Some(error)) => ResponseOutcome::Error(
                JsonRpcErrorObject::deserialize(error).map_err(serde::de::Error::custom)?,
            ),
            (Some(_), Some(_)) => {
                return Err(serde::de::Error::custom(
                    "response carries both 'result' and 'error'",
                ));
            }
            (None, None) => {
                return Err(serde::de::Error::custom(
                    "response carries neither 'result' nor 'error'",
                ));
            }
        };
        Ok(Self {
            version: raw.jsonrpc,
            id: raw.id,
            outcome,
        })
    }
}
