// Upstream response normalization. Upstream services format list, detail, and
// mutation responses inconsistently; everything leaving the gateway conforms
// to the canonical `{success, data, message?, error?}` envelope.

use axum::http::StatusCode;
use serde_json::{json, Value};

/// How to interpret the upstream payload, keyed by the route that asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteShape {
    /// GET on a collection path; `data` must come out as an array.
    List,
    /// GET on a single-entity path; `data` must come out as one object.
    Detail,
    /// POST/PUT/PATCH/DELETE; `success` must be trustworthy.
    Mutation,
}

/// Keys probed, in order, when hunting for the list array in a payload.
const ARRAY_KEYS: &[&str] = &["data", "items", "results", "result", "records", "rows"];

/// Keys probed, in order, for the entity object in a detail payload.
const OBJECT_KEYS: &[&str] = &["data", "item", "result", "entity", "payload"];

/// Upstream text bodies are truncated before being surfaced to callers.
const MAX_TEXT_LEN: usize = 512;

pub fn normalize_json(shape: RouteShape, status: StatusCode, payload: Value) -> Value {
    match shape {
        RouteShape::List => normalize_list(status, payload),
        RouteShape::Detail => normalize_detail(status, payload),
        RouteShape::Mutation => normalize_mutation(status, payload),
    }
}

/// Wrap a non-JSON upstream body. Success tracks the HTTP status; the text is
/// truncated so raw upstream error pages never reach end users whole.
pub fn normalize_text(status: StatusCode, body: &str) -> Value {
    let text: String = body.chars().take(MAX_TEXT_LEN).collect();
    if status.as_u16() < 400 {
        json!({ "success": true, "data": text })
    } else {
        json!({ "success": false, "error": text })
    }
}

fn normalize_list(status: StatusCode, payload: Value) -> Value {
    // Already canonical: an array under `data` passes through unchanged.
    if payload.get("data").map(Value::is_array).unwrap_or(false) {
        return payload;
    }

    if let Some(array) = find_array(&payload, 2) {
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(status.as_u16() < 400);
        return json!({ "success": success, "data": array });
    }

    tracing::warn!(status = status.as_u16(), "list response contained no recognizable array");
    json!({
        "success": false,
        "data": [],
        "error": "upstream response contained no recognizable list payload"
    })
}

/// Ordered, depth-limited probe for the first array in a payload. Covers the
/// flat candidates (`data`, `items`, `results`, `result`, `records`, `rows`)
/// and their one-level compositions such as `data.items` or `result.items`.
fn find_array(value: &Value, depth: u8) -> Option<&Vec<Value>> {
    match value {
        Value::Array(array) => Some(array),
        Value::Object(map) if depth > 0 => ARRAY_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| find_array(inner, depth - 1)),
        _ => None,
    }
}

fn normalize_detail(status: StatusCode, payload: Value) -> Value {
    // Already canonical: both `success` and `data` present.
    if let Value::Object(map) = &payload {
        if map.contains_key("success") && map.contains_key("data") {
            return payload;
        }
    }

    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(status.as_u16() < 400);

    let data = OBJECT_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find(|candidate| candidate.is_object())
        .cloned()
        .unwrap_or_else(|| payload.clone());

    let mut envelope = json!({ "success": success, "data": data });
    carry_message(&mut envelope, &payload);
    if !success {
        ensure_error(&mut envelope, &payload, status);
    }
    envelope
}

fn normalize_mutation(status: StatusCode, payload: Value) -> Value {
    let error_status = status.as_u16() >= 400;

    // The payload speaks for itself; its `success` claim is preserved. An
    // error status only forces a non-absent `error` field, so an upstream
    // that reports success without checking its own status cannot fool the
    // caller into treating the mutation as clean.
    if let Value::Object(map) = &payload {
        if map.contains_key("success") {
            let mut envelope = payload.clone();
            let claims_success = map.get("success").map(claimed_success).unwrap_or(false);
            if claims_success && error_status && map.get("error").is_none() {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!("upstream reported success with error status {}", status.as_u16())
                    });
                envelope["error"] = json!(message);
            }
            return envelope;
        }
    }

    let success = !error_status;
    let mut envelope = json!({ "success": success, "data": payload });
    carry_message(&mut envelope, &payload);
    if !success {
        ensure_error(&mut envelope, &payload, status);
    }
    envelope
}

/// A payload-level success claim. Some upstreams stringify the flag, so
/// anything other than an explicit `false` (boolean or stringified) counts
/// as claiming success; `null` claims nothing.
fn claimed_success(value: &Value) -> bool {
    match value {
        Value::Bool(claim) => *claim,
        Value::String(claim) => !claim.eq_ignore_ascii_case("false"),
        Value::Null => false,
        _ => true,
    }
}

fn carry_message(envelope: &mut Value, payload: &Value) {
    if let Some(message) = payload.get("message").and_then(Value::as_str) {
        envelope["message"] = json!(message);
    }
}

fn ensure_error(envelope: &mut Value, payload: &Value, status: StatusCode) {
    let error = payload
        .get("error")
        .and_then(Value::as_str)
        .or_else(|| payload.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("upstream request failed with status {}", status.as_u16()));
    envelope["error"] = json!(error);
}
