//! Response envelope returned by the persistence collaborator.

use serde::{Deserialize, Serialize};

/// `{ success, data, message }` as produced by the storage backend.
///
/// `success == false` is a backend-level rejection; transport failures are
/// reported out of band as errors, never through this envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// The payload, only when the call succeeded.
    pub fn into_data(self) -> Option<T> {
        if self.success { self.data } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_response_hides_data() {
        let mut resp: Response<u32> = Response::rejected("disk full");
        resp.data = Some(3);
        assert_eq!(resp.into_data(), None);
        assert_eq!(Response::ok(5).into_data(), Some(5));
    }

    #[test]
    fn test_missing_data_deserializes_as_none() {
        let resp: Response<String> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.data, None);
    }
}
