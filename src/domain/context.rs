use super::order::UserId;

/// Identity of the caller, passed explicitly into every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
}

impl RequestContext {
    pub fn for_user(user_id: UserId) -> Self {
        Self { user_id }
    }
}
