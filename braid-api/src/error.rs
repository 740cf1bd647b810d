use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::{NodeId, StoryId};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Story {0:?} not found")]
    StoryNotFound(StoryId),

    #[error("Node {0:?} not found")]
    NodeNotFound(NodeId),

    #[error("Parent node {0:?} not found")]
    ParentNotFound(NodeId),

    #[error("Uuid already used {0}")]
    UuidAlreadyUsed(Uuid),

    #[error("Empty or blank content is not allowed")]
    EmptyContent,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Vote could not be recorded after {attempts} attempts, try again")]
    VoteFailed { attempts: u32 },

    #[error("Write could not be applied after {attempts} attempts, try again")]
    WriteFailed { attempts: u32 },
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::StoryNotFound(_) => StatusCode::NOT_FOUND,
            Error::NodeNotFound(_) => StatusCode::NOT_FOUND,
            Error::ParentNotFound(_) => StatusCode::NOT_FOUND,
            Error::UuidAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::VoteFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::WriteFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::StoryNotFound(s) => json!({
                "message": "story not found",
                "type": "story-not-found",
                "story": s.0,
            }),
            Error::NodeNotFound(n) => json!({
                "message": "node not found",
                "type": "node-not-found",
                "node": n.0,
            }),
            Error::ParentNotFound(n) => json!({
                "message": "parent node not found",
                "type": "parent-not-found",
                "node": n.0,
            }),
            Error::UuidAlreadyUsed(u) => json!({
                "message": "uuid conflict",
                "type": "conflict-uuid",
                "uuid": u,
            }),
            Error::EmptyContent => json!({
                "message": "empty or blank content",
                "type": "empty-content",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::VoteFailed { attempts } => json!({
                "message": "vote could not be recorded, try again",
                "type": "vote-failed",
                "attempts": attempts,
            }),
            Error::WriteFailed { attempts } => json!({
                "message": "write could not be applied, try again",
                "type": "write-failed",
                "attempts": attempts,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        fn uuid_field(data: &serde_json::Value, field: &str) -> anyhow::Result<Uuid> {
            data.get(field)
                .and_then(|u| u.as_str())
                .and_then(|u| Uuid::from_str(u).ok())
                .ok_or_else(|| anyhow!("error contents has no proper {field} uuid"))
        }
        fn attempts_field(data: &serde_json::Value) -> anyhow::Result<u32> {
            data.get("attempts")
                .and_then(|a| a.as_u64())
                .and_then(|a| u32::try_from(a).ok())
                .ok_or_else(|| anyhow!("error contents has no proper attempts count"))
        }
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "story-not-found" => Error::StoryNotFound(StoryId(uuid_field(&data, "story")?)),
                "node-not-found" => Error::NodeNotFound(NodeId(uuid_field(&data, "node")?)),
                "parent-not-found" => Error::ParentNotFound(NodeId(uuid_field(&data, "node")?)),
                "conflict-uuid" => Error::UuidAlreadyUsed(uuid_field(&data, "uuid")?),
                "empty-content" => Error::EmptyContent,
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "vote-failed" => Error::VoteFailed {
                    attempts: attempts_field(&data)?,
                },
                "write-failed" => Error::WriteFailed {
                    attempts: attempts_field(&data)?,
                },
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
