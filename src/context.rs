use crate::{egress_pool::EgressPool, settings::Settings, upstream::Upstream};

/// Process-wide state shared by every session.
pub struct RelayContext<U> {
    /// The user id clients must present, in canonical form.
    pub user_id: String,
    pub settings: Settings,
    pub upstream: U,
    pub egress_pool: EgressPool,
}

impl<U: Upstream> RelayContext<U> {
    pub fn new(user_id: String, settings: Settings, upstream: U) -> Self {
        Self {
            user_id,
            settings,
            upstream,
            egress_pool: EgressPool::new(),
        }
    }
}
