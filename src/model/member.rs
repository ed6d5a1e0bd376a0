use serde::{Deserialize, Serialize};

use super::{tenant_record, Id, Lifecycle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Id,
    pub name: String,
    pub currency_id: Id,
    pub gln_prefix: String,
    /// One-way: once true it stays true.
    pub self_managed: bool,
    /// Never true together with `self_managed`.
    pub secret: bool,
    pub api_key: String,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(Member);

/// Legacy directed edge between Members. Still consulted by Member permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLink {
    pub id: Id,
    pub member_id: Id,
    pub contra_member_id: Id,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(MemberLink);

/// Opaque 64-hex credential scoping token issuance to a Member.
pub fn generate_api_key() -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(uuid::Uuid::new_v4().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
