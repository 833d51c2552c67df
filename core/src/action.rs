//! Uniform result shape returned by every server-side action.
//!
//! Serializes to `{ ok, error?, ...data }`; the UI binds page alerts and
//! per-field messages from `error`.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::normalize::ActionError;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult<D = NoData> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
    #[serde(flatten)]
    pub data: D,
}

/// Extra data for results that carry none. Serializes as an empty map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoData;

impl Serialize for NoData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

pub fn ok<D>(data: D) -> ActionResult<D> {
    ActionResult {
        ok: true,
        error: None,
        data,
    }
}

pub fn fail<D>(error: ActionError, data: D) -> ActionResult<D> {
    ActionResult {
        ok: false,
        error: Some(error),
        data,
    }
}

pub fn unauthorized<D>(data: D) -> ActionResult<D> {
    fail(ActionError::form(UNAUTHORIZED_MESSAGE), data)
}
