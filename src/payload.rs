use std::fmt;

use serde_json::Value;

/// Content of a single document.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A JSON document.
    Json(Value),

    /// Opaque bytes, stored without any JSON transcoding.
    Binary(Vec<u8>),
}

impl Payload {
    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Binary(_) => None,
        }
    }

    /// Encodes the payload the way it is stored.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Json(v) => v.to_string().into_bytes(),
            Payload::Binary(b) => b.clone(),
        }
    }

    /// Decodes a stored payload. JSON payloads must be objects or arrays.
    pub fn from_bytes(bytes: Vec<u8>, is_binary: bool) -> serde_json::Result<Self> {
        if is_binary {
            return Ok(Payload::Binary(bytes));
        }
        serde_json::from_slice(&bytes).map(Payload::Json)
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Payload::Json(v) => v.to_string().len(),
            Payload::Binary(b) => b.len(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(v) => write!(f, "{v}"),
            Payload::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_stored_form() {
        let p = Payload::Json(json!({"a": 1}));
        assert_eq!(p.to_bytes(), br#"{"a":1}"#.to_vec());
        assert_eq!(Payload::from_bytes(p.to_bytes(), false).unwrap(), p);

        // Binary payloads are kept as they are, even if they look like JSON
        let b = Payload::from_bytes(br#"{"a":1}"#.to_vec(), true).unwrap();
        assert!(b.is_binary());
        assert_eq!(b.encoded_len(), 7);

        assert!(Payload::from_bytes(b"not json".to_vec(), false).is_err());
    }
}
