//! Wire codec shared by the gateway and the serving runtime.
//!
//! Request bodies come in as `text/csv` or `application/json`; both sides of
//! the network boundary decode them with the same rules so a payload the
//! gateway emits is always one the runtime accepts.

use crate::{CodecError, FeatureVector, Payload, Predictions};
use serde_json::Value;
use std::fmt;

pub const CSV: &str = "text/csv";
pub const JSON: &str = "application/json";
pub const TEXT: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Csv,
    Json,
}

impl ContentType {
    /// Parses a `Content-Type` header value. Parameters such as `charset`
    /// are ignored.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        match essence(raw).as_str() {
            CSV => Ok(ContentType::Csv),
            JSON => Ok(ContentType::Json),
            _ => Err(CodecError::UnsupportedMediaType(raw.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Csv => CSV,
            ContentType::Json => JSON,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptType {
    Json,
    Csv,
    Text,
}

impl AcceptType {
    /// Missing or wildcard accept headers get JSON; unknown types fall back
    /// to plain text.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return AcceptType::Json;
        };
        match essence(raw).as_str() {
            "" | "*/*" | JSON => AcceptType::Json,
            CSV => AcceptType::Csv,
            _ => AcceptType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptType::Json => JSON,
            AcceptType::Csv => CSV,
            AcceptType::Text => TEXT,
        }
    }
}

fn essence(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn decode(body: &[u8], content_type: ContentType) -> Result<Payload, CodecError> {
    match content_type {
        ContentType::Csv => decode_csv(body),
        ContentType::Json => decode_json(body),
    }
}

fn decode_csv(body: &[u8]) -> Result<Payload, CodecError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| CodecError::MalformedInput(format!("body is not UTF-8: {}", e)))?;

    let mut rows = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_csv_row)
        .collect::<Result<Vec<_>, _>>()?;

    match rows.len() {
        0 => Err(CodecError::MalformedInput("empty CSV body".to_string())),
        1 => Ok(Payload::Single(rows.remove(0))),
        _ => Ok(Payload::Batch(rows)),
    }
}

fn parse_csv_row(line: &str) -> Result<FeatureVector, CodecError> {
    line.split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| {
                    CodecError::MalformedInput(format!("could not parse '{}' as a number", token))
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureVector::new)
}

fn decode_json(body: &[u8]) -> Result<Payload, CodecError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| CodecError::MalformedInput(format!("invalid JSON: {}", e)))?;
    decode_json_value(&value)
}

/// JSON decode for a body the caller has already parsed. Shapes are tried
/// in order: `{"instances": ...}`, a bare array, then `{"features": [...]}`.
/// Anything else is rejected.
pub fn decode_json_value(value: &Value) -> Result<Payload, CodecError> {
    if let Some(instances) = value.get("instances") {
        return match instances {
            Value::Array(items) => decode_array(items),
            _ => Err(CodecError::MalformedInput(
                "`instances` must be an array".to_string(),
            )),
        };
    }

    match value {
        Value::Array(items) => decode_array(items),
        Value::Object(map) => match map.get("features") {
            Some(features) => vector_from_value(features).map(Payload::Single),
            None => Err(CodecError::MalformedInput(
                "expected `instances`, `features` or a bare array".to_string(),
            )),
        },
        _ => Err(CodecError::MalformedInput(
            "expected `instances`, `features` or a bare array".to_string(),
        )),
    }
}

fn decode_array(items: &[Value]) -> Result<Payload, CodecError> {
    if items.iter().all(Value::is_array) && !items.is_empty() {
        let rows = items
            .iter()
            .map(vector_from_value)
            .collect::<Result<Vec<_>, _>>()?;
        let width = rows[0].len();
        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(CodecError::MalformedInput(format!(
                "ragged batch: rows of length {} and {}",
                width,
                bad.len()
            )));
        }
        return Ok(Payload::Batch(rows));
    }

    numbers(items).map(Payload::Single)
}

fn vector_from_value(value: &Value) -> Result<FeatureVector, CodecError> {
    match value {
        Value::Array(items) => numbers(items),
        other => Err(CodecError::MalformedInput(format!(
            "expected an array of numbers, got {}",
            other
        ))),
    }
}

fn numbers(items: &[Value]) -> Result<FeatureVector, CodecError> {
    items
        .iter()
        .map(|item| {
            item.as_f64().filter(|value| value.is_finite()).ok_or_else(|| {
                CodecError::MalformedInput(format!("expected a number, got {}", item))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureVector::new)
}

/// Serializes a single vector for the model endpoint. Non-finite values have
/// no encoding in either format and are refused.
pub fn encode_request(
    vector: &FeatureVector,
    content_type: ContentType,
) -> Result<Vec<u8>, CodecError> {
    if let Some(bad) = vector.values().iter().find(|v| !v.is_finite()) {
        return Err(CodecError::Encode(format!("cannot encode non-finite value {}", bad)));
    }
    match content_type {
        ContentType::Csv => Ok(join_row(vector.values()).into_bytes()),
        ContentType::Json => serde_json::to_vec(&serde_json::json!({ "instances": [vector] }))
            .map_err(|e| CodecError::Encode(e.to_string())),
    }
}

/// Serializes model output. JSON is compact; a single-output model yields a
/// flat array. CSV and text put one row per line.
pub fn encode_predictions(
    predictions: &Predictions,
    accept: AcceptType,
) -> Result<(Vec<u8>, &'static str), CodecError> {
    let body = match accept {
        AcceptType::Json => {
            let encoded = if predictions.width() == 1 {
                let flat: Vec<f64> = predictions.rows().iter().map(|row| row[0]).collect();
                serde_json::to_vec(&flat)
            } else {
                serde_json::to_vec(predictions.rows())
            };
            encoded.map_err(|e| CodecError::Encode(e.to_string()))?
        }
        AcceptType::Csv | AcceptType::Text => predictions
            .rows()
            .iter()
            .map(|row| join_row(row))
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes(),
    };
    Ok((body, accept.as_str()))
}

fn join_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(values: &[f64]) -> Payload {
        Payload::Single(FeatureVector::new(values.to_vec()))
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!(ContentType::parse("text/csv").unwrap(), ContentType::Csv);
        assert_eq!(
            ContentType::parse("Application/JSON; charset=utf-8").unwrap(),
            ContentType::Json
        );
        assert_eq!(
            ContentType::parse("application/xml"),
            Err(CodecError::UnsupportedMediaType("application/xml".to_string()))
        );
    }

    #[test]
    fn test_accept_type_parse() {
        assert_eq!(AcceptType::parse(None), AcceptType::Json);
        assert_eq!(AcceptType::parse(Some("*/*")), AcceptType::Json);
        assert_eq!(AcceptType::parse(Some("text/csv")), AcceptType::Csv);
        assert_eq!(AcceptType::parse(Some("text/html")), AcceptType::Text);
    }

    #[test]
    fn test_decode_csv() {
        let payload = decode(b" 0.5,-1.2, 3.3,0\n", ContentType::Csv).unwrap();
        assert_eq!(payload, single(&[0.5, -1.2, 3.3, 0.0]));
    }

    #[test]
    fn test_decode_csv_multiple_lines_is_batch() {
        let payload = decode(b"1,2\n3,4", ContentType::Csv).unwrap();
        assert_eq!(
            payload,
            Payload::Batch(vec![
                FeatureVector::new(vec![1.0, 2.0]),
                FeatureVector::new(vec![3.0, 4.0]),
            ])
        );
    }

    #[test]
    fn test_decode_csv_rejects_bad_token() {
        let err = decode(b"1.0,abc,3", ContentType::Csv).unwrap_err();
        assert!(matches!(err, CodecError::MalformedInput(msg) if msg.contains("abc")));
        assert!(decode(b"   ", ContentType::Csv).is_err());
        assert!(decode(b"1,,2", ContentType::Csv).is_err());
    }

    #[test]
    fn test_decode_csv_rejects_non_finite() {
        for body in ["nan,1,1", "1,inf,1", "1,1,-infinity", "NaN", "1,+Inf"] {
            let err = decode(body.as_bytes(), ContentType::Csv).unwrap_err();
            assert!(
                matches!(&err, CodecError::MalformedInput(_)),
                "{:?} gave {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_decode_json_instances() {
        let payload = decode(br#"{"instances": [[1, 2.5], [3, 4]]}"#, ContentType::Json).unwrap();
        assert_eq!(
            payload,
            Payload::Batch(vec![
                FeatureVector::new(vec![1.0, 2.5]),
                FeatureVector::new(vec![3.0, 4.0]),
            ])
        );
    }

    #[test]
    fn test_decode_json_instances_wins_over_features() {
        let payload = decode(
            br#"{"features": [9, 9], "instances": [[1, 2]]}"#,
            ContentType::Json,
        )
        .unwrap();
        assert_eq!(payload, Payload::Batch(vec![FeatureVector::new(vec![1.0, 2.0])]));
    }

    #[test]
    fn test_decode_json_bare_array() {
        assert_eq!(decode(b"[1, 2, 3]", ContentType::Json).unwrap(), single(&[1.0, 2.0, 3.0]));
        assert_eq!(decode(b"[[1], [2]]", ContentType::Json).unwrap().row_count(), 2);
    }

    #[test]
    fn test_decode_json_features() {
        let payload = decode(br#"{"features": [0.5, -1.2]}"#, ContentType::Json).unwrap();
        assert_eq!(payload, single(&[0.5, -1.2]));
    }

    #[test]
    fn test_decode_json_rejects_unknown_shape() {
        let bodies: [&[u8]; 6] = [
            br#"{"values": [1]}"#,
            b"42",
            b"{not json",
            br#"{"features": ["a"]}"#,
            br#"{"instances": [[1, 2], [3]]}"#,
            br#"{"instances": 5}"#,
        ];
        for body in bodies {
            let err = decode(body, ContentType::Json).unwrap_err();
            assert!(matches!(err, CodecError::MalformedInput(_)), "{:?}", body);
        }
    }

    #[test]
    fn test_encode_request() {
        let vector = FeatureVector::new(vec![0.5, -1.2, 0.0]);
        assert_eq!(encode_request(&vector, ContentType::Csv).unwrap(), b"0.5,-1.2,0");
        assert_eq!(
            encode_request(&vector, ContentType::Json).unwrap(),
            br#"{"instances":[[0.5,-1.2,0.0]]}"#
        );

        let vector = FeatureVector::new(vec![1.0, f64::NAN]);
        for content_type in [ContentType::Csv, ContentType::Json] {
            let err = encode_request(&vector, content_type).unwrap_err();
            assert!(matches!(err, CodecError::Encode(_)));
        }
    }

    #[test]
    fn test_encode_predictions_json_is_compact() {
        let preds = Predictions::new(vec![vec![1.5], vec![2.0]]);
        let (body, content_type) = encode_predictions(&preds, AcceptType::Json).unwrap();
        assert_eq!(body, b"[1.5,2.0]");
        assert_eq!(content_type, JSON);

        let preds = Predictions::new(vec![vec![1.0, 2.0]]);
        let (body, _) = encode_predictions(&preds, AcceptType::Json).unwrap();
        assert_eq!(body, b"[[1.0,2.0]]");
    }

    #[test]
    fn test_encode_predictions_text() {
        let preds = Predictions::new(vec![vec![1.5, 2.0], vec![3.0, 4.0]]);
        let (body, content_type) = encode_predictions(&preds, AcceptType::Csv).unwrap();
        assert_eq!(body, b"1.5,2\n3,4");
        assert_eq!(content_type, CSV);

        let (_, content_type) = encode_predictions(&preds, AcceptType::Text).unwrap();
        assert_eq!(content_type, TEXT);
    }

    #[test]
    fn test_csv_values_survive_encode_decode() {
        let vector = FeatureVector::new(vec![0.1, -7.25, 1e-9, 123456.789]);
        for content_type in [ContentType::Csv, ContentType::Json] {
            let body = encode_request(&vector, content_type).unwrap();
            let rows = decode(&body, content_type).unwrap().into_rows();
            assert_eq!(rows, vec![vector.clone()]);
        }
    }
}
