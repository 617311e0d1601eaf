use serde::{Deserialize, Serialize};

/// Uniform `{"message": ..., "data": ...}` body returned by every endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn new(message: impl Into<String>, data: Option<T>) -> Envelope<T> {
        Envelope {
            message: message.into(),
            data,
        }
    }

    pub fn ok(data: T) -> Envelope<T> {
        Envelope::new("ok", Some(data))
    }

    pub fn empty() -> Envelope<T> {
        Envelope::new("ok", None)
    }
}
