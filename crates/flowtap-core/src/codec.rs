//! Wire codec for HTTP messages
//!
//! Converts [`Request`]/[`Response`] to and from their transport-safe JSON
//! shapes. Two projections exist: the full form (headers plus base64 body)
//! sent in full-stage frames, and the cheap summary form used during
//! pre-flight negotiation. All shape validation of inbound message payloads
//! happens here, so malformed client data never reaches a flow.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};

use crate::error::{RelayError, Result};
use crate::message::{Headers, Request, Response};

/// Full wire form of a request: method, url, headers, base64 body
pub fn request_to_wire(request: &Request) -> Value {
    json!({
        "method": request.method,
        "url": request.url,
        "headers": headers_to_wire(&request.headers),
        "body": BASE64.encode(&request.body),
    })
}

/// Summary wire form of a request: method and url only
pub fn request_summary(request: &Request) -> Value {
    json!({
        "method": request.method,
        "url": request.url,
    })
}

/// Full wire form of a response: status, reason, headers, base64 body
pub fn response_to_wire(response: &Response) -> Value {
    json!({
        "status_code": response.status_code,
        "reason": response.reason,
        "headers": headers_to_wire(&response.headers),
        "body": BASE64.encode(&response.body),
    })
}

/// Summary wire form of a response: status and reason only
pub fn response_summary(response: &Response) -> Value {
    json!({
        "status_code": response.status_code,
        "reason": response.reason,
    })
}

/// Decode a full request payload received from a client
pub fn request_from_wire(value: &Value) -> Result<Request> {
    let method = str_field(value, "request", "method")?;
    let url = str_field(value, "request", "url")?;
    let headers = headers_from_wire(value.get("headers"), "request")?;
    let body = body_from_wire(value.get("body"), "request")?;
    Ok(Request::new(method, url, headers, body))
}

/// Decode a full response payload received from a client
///
/// `reason` is the one optional field: when present it overrides the default
/// phrase, when absent the canonical phrase for the status code stands.
pub fn response_from_wire(value: &Value) -> Result<Response> {
    let status_code = value
        .get("status_code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| malformed("response", "status_code", "a status code"))?;
    let headers = headers_from_wire(value.get("headers"), "response")?;
    let body = body_from_wire(value.get("body"), "response")?;

    let response = Response::new(status_code, headers, body);
    match value.get("reason") {
        None | Some(Value::Null) => Ok(response),
        Some(Value::String(reason)) => Ok(response.with_reason(reason.clone())),
        Some(_) => Err(malformed("response", "reason", "a string")),
    }
}

/// Headers serialize as a map from name to the ordered list of all values
/// under that name. Order across names is not significant.
fn headers_to_wire(headers: &Headers) -> Value {
    let mut map = Map::new();
    for name in headers.names() {
        let values: Vec<Value> = headers
            .get_all(name)
            .into_iter()
            .map(|v| Value::String(v.to_string()))
            .collect();
        map.insert(name.to_string(), Value::Array(values));
    }
    Value::Object(map)
}

fn headers_from_wire(value: Option<&Value>, context: &str) -> Result<Headers> {
    let map = value
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(context, "headers", "a map of name to value list"))?;

    let mut headers = Headers::new();
    for (name, values) in map {
        let values = values
            .as_array()
            .ok_or_else(|| malformed(context, "headers", "a map of name to value list"))?;
        for value in values {
            let value = value
                .as_str()
                .ok_or_else(|| malformed(context, "headers", "string header values"))?;
            headers.append(name.clone(), value);
        }
    }
    Ok(headers)
}

fn body_from_wire(value: Option<&Value>, context: &str) -> Result<Vec<u8>> {
    let encoded = value
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(context, "body", "a base64 string"))?;
    BASE64
        .decode(encoded)
        .map_err(|_| malformed(context, "body", "valid base64"))
}

fn str_field(value: &Value, context: &str, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(context, field, "a string"))
}

fn malformed(context: &str, field: &str, expected: &str) -> RelayError {
    RelayError::MalformedPayload(format!("{context}.{field} missing or not {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Request {
        let headers = Headers::from_pairs([
            ("Host", "example.com"),
            ("Set-Cookie", "a=1"),
            ("set-cookie", "b=2"),
        ]);
        Request::new("POST", "http://example.com/api", headers, vec![0xff, 0x00, 0x01])
    }

    #[test]
    fn test_request_round_trip_with_repeated_headers_and_binary_body() {
        let request = sample_request();
        let decoded = request_from_wire(&request_to_wire(&request)).unwrap();
        assert_eq!(decoded.method, request.method);
        assert_eq!(decoded.url, request.url);
        assert_eq!(decoded.body, request.body);
        assert_eq!(decoded.headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(decoded.headers.get("host"), Some("example.com"));
    }

    #[test]
    fn test_empty_body_encodes_as_empty_string() {
        let request = Request::new("GET", "http://example.com/", Headers::new(), Vec::new());
        let wire = request_to_wire(&request);
        assert_eq!(wire["body"], "");
        assert!(request_from_wire(&wire).unwrap().body.is_empty());
    }

    #[test]
    fn test_response_round_trip() {
        let response = Response::new(
            500,
            Headers::from_pairs([("x", "1")]),
            b"err".to_vec(),
        )
        .with_reason("Error");
        let decoded = response_from_wire(&response_to_wire(&response)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_response_reason_defaults_when_absent() {
        let wire = json!({
            "status_code": 403,
            "headers": {},
            "body": "",
        });
        let decoded = response_from_wire(&wire).unwrap();
        assert_eq!(decoded.reason, "Forbidden");

        let wire = json!({
            "status_code": 403,
            "reason": "Nope",
            "headers": {},
            "body": "",
        });
        assert_eq!(response_from_wire(&wire).unwrap().reason, "Nope");
    }

    #[test]
    fn test_summaries_carry_only_cheap_fields() {
        let request = sample_request();
        let summary = request_summary(&request);
        assert_eq!(summary, json!({"method": "POST", "url": "http://example.com/api"}));

        let response = Response::new(200, Headers::new(), Vec::new());
        assert_eq!(
            response_summary(&response),
            json!({"status_code": 200, "reason": "OK"})
        );
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let wire = json!({"url": "http://example.com/", "headers": {}, "body": ""});
        assert!(matches!(
            request_from_wire(&wire),
            Err(RelayError::MalformedPayload(_))
        ));

        let wire = json!({"headers": {}, "body": ""});
        assert!(matches!(
            response_from_wire(&wire),
            Err(RelayError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let wire = json!({
            "method": "GET",
            "url": "http://example.com/",
            "headers": {},
            "body": "not-base64!!!",
        });
        assert!(matches!(
            request_from_wire(&wire),
            Err(RelayError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_misshapen_headers_are_malformed() {
        let wire = json!({
            "method": "GET",
            "url": "http://example.com/",
            "headers": {"Host": "example.com"},
            "body": "",
        });
        assert!(matches!(
            request_from_wire(&wire),
            Err(RelayError::MalformedPayload(_))
        ));

        let wire = json!({
            "method": "GET",
            "url": "http://example.com/",
            "headers": {"Host": [42]},
            "body": "",
        });
        assert!(matches!(
            request_from_wire(&wire),
            Err(RelayError::MalformedPayload(_))
        ));
    }
}
