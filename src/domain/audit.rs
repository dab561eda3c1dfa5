use uuid::Uuid;

pub struct NewAuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor: String,
    pub detail: serde_json::Value,
}

impl NewAuditEntry {
    pub fn service(service_id: Uuid, user_id: Uuid, action: &str, detail: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: Some(user_id),
            entity_type: "service".to_string(),
            entity_id: service_id,
            action: action.to_string(),
            actor: "system".to_string(),
            detail,
        }
    }
}
