//! Persisted request/response pair

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::Request;
use crate::response::Response;
use crate::Result;

/// One recorded interaction, kept in its plain record form.
///
/// Storage hands these back untouched; they are only rebuilt into a
/// [`Request`] and [`Response`] when the cassette needs them, so a corrupt
/// entry is reported at the point it is played instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Request record
    pub request: Value,
    /// Response record
    pub response: Value,
}

impl Recording {
    /// Serialize a request/response pair
    #[must_use]
    pub fn new(request: &Request, response: &Response) -> Self {
        Self {
            request: request.to_record(),
            response: response.to_record(),
        }
    }

    /// Rebuild the stored request
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the request record is invalid
    pub fn request(&self) -> Result<Request> {
        Request::from_record(&self.request)
    }

    /// Rebuild the stored response
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the response record is invalid
    pub fn response(&self) -> Result<Response> {
        Response::from_record(&self.response)
    }
}
