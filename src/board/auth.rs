use super::models::UserStamp;

/// Source of the signed-in user for stamping and save authorisation.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<UserStamp>;
}

/// A fixed identity, typically taken from configuration.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    user: UserStamp,
}

impl StaticAuth {
    pub fn new(user: UserStamp) -> Self {
        Self { user }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<UserStamp> {
        Some(self.user.clone())
    }
}

/// No user is signed in. Local edits are stamped anonymously and saves are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOut;

impl AuthProvider for SignedOut {
    fn current_user(&self) -> Option<UserStamp> {
        None
    }
}
