//! Ownership-based authorization for mutations

use crate::data::{Post, UserId};
use crate::error::AppError;

/// A resource with a recorded owner
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

impl Owned for Post {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

/// Outcome of an ownership check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Forbidden,
    NotFound,
}

impl Authorization {
    /// `Allowed` becomes `Ok(())`; rejections become the matching `AppError`.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Authorization::Allowed => Ok(()),
            Authorization::Forbidden => Err(AppError::Forbidden),
            Authorization::NotFound => Err(AppError::NotFound),
        }
    }
}

/// Decide whether `actor` may update or delete `resource`.
///
/// A missing resource is `NotFound` before ownership is considered.
pub fn authorize_mutation<R: Owned>(actor: UserId, resource: Option<&R>) -> Authorization {
    match resource {
        None => Authorization::NotFound,
        Some(resource) if resource.owner_id() != actor => Authorization::Forbidden,
        Some(_) => Authorization::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Owner(UserId);

    impl Owned for Owner {
        fn owner_id(&self) -> UserId {
            self.0
        }
    }

    #[test]
    fn owner_is_allowed() {
        let resource = Owner(UserId(1));
        assert_eq!(
            authorize_mutation(UserId(1), Some(&resource)),
            Authorization::Allowed
        );
    }

    #[test]
    fn other_user_is_forbidden() {
        let resource = Owner(UserId(1));
        assert_eq!(
            authorize_mutation(UserId(2), Some(&resource)),
            Authorization::Forbidden
        );
    }

    #[test]
    fn missing_resource_is_not_found_for_everyone() {
        for actor in [UserId(1), UserId(2)] {
            assert_eq!(
                authorize_mutation::<Owner>(actor, None),
                Authorization::NotFound
            );
        }
    }

    #[test]
    fn rejections_map_to_errors() {
        assert!(Authorization::Allowed.into_result().is_ok());
        assert!(matches!(
            Authorization::Forbidden.into_result(),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            Authorization::NotFound.into_result(),
            Err(AppError::NotFound)
        ));
    }
}
