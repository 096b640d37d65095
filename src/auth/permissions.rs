use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};

/// Capability a handler requires before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Reads: anyone, signed in or not.
    AllowAny,
    Authenticated,
    /// Staff or superuser.
    AdminOnly,
    /// The caller must be the author of the target record.
    AuthorOnly,
}

impl Policy {
    /// `author_id` is the owner of the record being acted on; only `AuthorOnly` reads it.
    pub fn check<'a>(
        self,
        caller: Option<&'a AuthenticatedUser>,
        author_id: Option<i32>,
    ) -> AppResult<Option<&'a AuthenticatedUser>> {
        if self == Policy::AllowAny {
            return Ok(caller);
        }

        let caller = caller.ok_or_else(|| {
            AppError::authentication("Authentication credentials were not provided")
        })?;

        match self {
            Policy::AllowAny | Policy::Authenticated => {}
            Policy::AdminOnly => {
                if !caller.is_admin() {
                    return Err(AppError::permission(
                        "You do not have permission to perform this action",
                    ));
                }
            }
            Policy::AuthorOnly => {
                if author_id != Some(caller.user_id) {
                    return Err(AppError::permission("Only the author can modify this record"));
                }
            }
        }

        Ok(Some(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(user_id: i32, is_staff: bool) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id,
            email: format!("user{}@example.com", user_id),
            session_id: "s".to_string(),
            is_staff,
            is_superuser: false,
        }
    }

    #[test]
    fn test_allow_any_accepts_anonymous() {
        assert!(Policy::AllowAny.check(None, None).is_ok());
    }

    #[test]
    fn test_anonymous_rejected_with_authentication_error() {
        for policy in [Policy::Authenticated, Policy::AdminOnly, Policy::AuthorOnly] {
            assert!(matches!(
                policy.check(None, Some(1)),
                Err(AppError::Authentication(_))
            ));
        }
    }

    #[test]
    fn test_admin_only() {
        let staff = caller(1, true);
        let plain = caller(2, false);
        assert!(Policy::AdminOnly.check(Some(&staff), None).is_ok());
        assert!(matches!(
            Policy::AdminOnly.check(Some(&plain), None),
            Err(AppError::Permission(_))
        ));
    }

    #[test]
    fn test_author_only() {
        let owner = caller(1, false);
        let other = caller(2, true);
        assert!(Policy::AuthorOnly.check(Some(&owner), Some(1)).is_ok());
        assert!(matches!(
            Policy::AuthorOnly.check(Some(&other), Some(1)),
            Err(AppError::Permission(_))
        ));
    }
}
