//! Response envelope used by the portal endpoints.
//!
//! The client itself does not know about envelopes: `ApiClient::get::<T>`
//! decodes whatever `T` is. Endpoints that wrap their payload as
//! `{ "code": 200, "message": "...", "data": ... }` ask for `Envelope<T>`
//! and unwrap it; endpoints returning a raw body ask for the payload type
//! directly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}
