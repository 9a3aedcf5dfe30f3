//! Batched multi-resource requests.
//!
//! The platform's batch endpoint accepts an ordered list of sub-requests in
//! one HTTP round trip and returns one slot per sub-request, same length and
//! order. A slot can fail independently of its siblings, so the parsed
//! result is a `Vec` of per-slot `Result`s.

use autoads_core::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify;

/// One sub-request inside a batch call.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub method: &'static str,
    pub relative_url: String,
}

impl BatchRequest {
    pub fn get(relative_url: impl Into<String>) -> Self {
        Self {
            method: "GET",
            relative_url: relative_url.into(),
        }
    }
}

/// One slot of the batch response: HTTP code plus the body as a JSON string.
/// A `null` slot means the platform never executed the sub-request.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSlot {
    pub code: u16,
    #[serde(default)]
    pub body: Option<String>,
}

/// Parse the raw batch response into per-slot results, preserving order.
/// The slot count must equal the request count.
pub fn parse_batch_response(
    raw: &Value,
    expected_slots: usize,
) -> Result<Vec<Result<Value, GatewayError>>, GatewayError> {
    let slots: Vec<Option<BatchSlot>> = serde_json::from_value(raw.clone()).map_err(|e| {
        GatewayError::transient(format!("malformed batch response: {e}"))
    })?;

    if slots.len() != expected_slots {
        return Err(GatewayError::transient(format!(
            "batch returned {} slots, expected {}",
            slots.len(),
            expected_slots
        )));
    }

    Ok(slots.into_iter().map(parse_slot).collect())
}

fn parse_slot(slot: Option<BatchSlot>) -> Result<Value, GatewayError> {
    let slot = match slot {
        Some(slot) => slot,
        None => return Err(GatewayError::transient("batch slot was not executed")),
    };

    let body: Value = match slot.body.as_deref() {
        Some(text) => serde_json::from_str(text).map_err(|e| {
            GatewayError::transient(format!("unparseable batch slot body: {e}"))
        })?,
        None => Value::Null,
    };

    match classify::classify_response(slot.code, &body) {
        None => Ok(body),
        Some(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(code: u16, body: Value) -> Value {
        json!({"code": code, "body": body.to_string()})
    }

    #[test]
    fn test_all_slots_succeed_in_order() {
        let raw = json!([
            slot(200, json!({"data": [{"id": "c1"}]})),
            slot(200, json!({"data": [{"id": "as1"}]})),
        ]);
        let parsed = parse_batch_response(&raw, 2).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_ref().unwrap()["data"][0]["id"], "c1");
        assert_eq!(parsed[1].as_ref().unwrap()["data"][0]["id"], "as1");
    }

    #[test]
    fn test_partial_failure_surfaced_per_slot() {
        let raw = json!([
            slot(200, json!({"data": []})),
            slot(400, json!({"error": {"code": 100, "message": "bad field"}})),
            slot(200, json!({"data": []})),
        ]);
        let parsed = parse_batch_response(&raw, 3).unwrap();
        assert!(parsed[0].is_ok());
        assert!(matches!(
            parsed[1].as_ref().unwrap_err(),
            GatewayError::Resource { code: 100, .. }
        ));
        assert!(parsed[2].is_ok());
    }

    #[test]
    fn test_null_slot_is_transient() {
        let raw = json!([slot(200, json!({"data": []})), Value::Null]);
        let parsed = parse_batch_response(&raw, 2).unwrap();
        assert!(matches!(
            parsed[1].as_ref().unwrap_err(),
            GatewayError::Transient { .. }
        ));
    }

    #[test]
    fn test_slot_count_mismatch_rejected() {
        let raw = json!([slot(200, json!({"data": []}))]);
        assert!(parse_batch_response(&raw, 4).is_err());
    }
}
