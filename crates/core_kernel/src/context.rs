//! Request-scoped context carried through every operation
//!
//! Every command and query executes on behalf of one organization and
//! one actor. Keeping both in a single context value means storage
//! adapters can scope queries by org and stamp audit columns without
//! each call site threading two extra parameters.

use crate::identifiers::{ActorId, OrgId};
use serde::{Deserialize, Serialize};

/// Identifies who is acting and within which organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Organization whose data the request may touch
    pub org_id: OrgId,
    /// Authenticated principal performing the request
    pub actor_id: ActorId,
}

impl RequestContext {
    pub fn new(org_id: OrgId, actor_id: ActorId) -> Self {
        Self { org_id, actor_id }
    }
}
