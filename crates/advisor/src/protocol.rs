//! Wire format: one JSON object per line in each direction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request<'a> {
    Infer { obs: &'a [f64] },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Action { action: i64 },
    Status { status: String },
    Error { error: String },
}
