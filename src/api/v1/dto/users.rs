/*
 * Responsibility
 * - WhoAmI の response DTO
 */
use serde::{Deserialize, Serialize};

use crate::services::identity::Identity;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhoAmIResponse {
    pub user_id: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub request_id: String,
}

impl WhoAmIResponse {
    pub fn new(identity: &Identity, request_id: &str) -> Self {
        Self {
            user_id: identity.id.clone(),
            subject: identity.subject.clone(),
            email: identity.email.clone(),
            roles: identity.role_names(),
            request_id: request_id.to_owned(),
        }
    }
}
