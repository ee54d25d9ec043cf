use crate::{
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::Operation,
};

/// Gate for the admin surface: only staff accounts pass.
pub fn require_staff(user: &CurrentUser, action: Operation) -> Result<()> {
    if user.is_staff {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            action,
            resource: "users".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn user(is_staff: bool) -> CurrentUser {
        CurrentUser {
            id: 1,
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            is_staff,
        }
    }

    #[test]
    fn test_staff_passes() {
        assert!(require_staff(&user(true), Operation::Read).is_ok());
    }

    #[test]
    fn test_regular_user_is_forbidden() {
        let error = require_staff(&user(false), Operation::Update).unwrap_err();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert!(matches!(
            error,
            Error::InsufficientPermissions {
                action: Operation::Update,
                ..
            }
        ));
    }
}
