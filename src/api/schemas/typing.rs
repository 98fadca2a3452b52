use crate::domain::typing::Typer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub conversation_id: Uuid,
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingQuery {
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TyperResponse {
    pub user_id: Uuid,
    pub user_name: String,
}

impl From<Typer> for TyperResponse {
    fn from(typer: Typer) -> Self {
        Self { user_id: typer.user_id, user_name: typer.user_name }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypersResponse {
    pub typers: Vec<TyperResponse>,
}
