//! Identity collaborator contract

use weekwise_core::UserId;

/// Who is signed in; `None` means task changes are not permitted
pub trait Session: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Session backed by the user id from the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSession {
    user: Option<UserId>,
}

impl ConfiguredSession {
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// Blank ids count as signed out
    pub fn from_config(user_id: Option<&str>) -> Self {
        Self {
            user: user_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(UserId::new),
        }
    }
}

impl Session for ConfiguredSession {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert!(ConfiguredSession::from_config(None).current_user_id().is_none());
        assert!(ConfiguredSession::from_config(Some("  ")).current_user_id().is_none());
        assert_eq!(
            ConfiguredSession::from_config(Some(" me ")).current_user_id(),
            Some(UserId::new("me"))
        );
    }
}
