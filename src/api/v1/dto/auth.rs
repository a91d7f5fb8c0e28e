/*
 * Responsibility
 * - ValidateToken の request/response DTO
 * - 無効なトークンは is_valid=false のみ返す (理由は返さない)
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValidateTokenResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl ValidateTokenResponse {
    pub fn invalid() -> Self {
        Self::default()
    }
}
