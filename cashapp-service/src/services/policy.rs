//! Access policy for the application modules.
//!
//! Authorization is an explicit check at the top of each handler, not a
//! property of the route table. Admins implicitly hold every module grant.

use crate::models::SessionUser;
use cashapp_core::error::AppError;

/// A protected part of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Bai,
    Recon,
    Admin,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bai => "bai",
            Self::Recon => "recon",
            Self::Admin => "admin",
        }
    }
}

/// Check whether a user may access a resource.
///
/// Returns Ok(()) when access is granted, Forbidden otherwise.
pub fn authorize(user: &SessionUser, resource: Resource) -> Result<(), AppError> {
    let granted = match resource {
        Resource::Admin => user.is_admin,
        Resource::Bai => user.is_admin || user.has_bai_access,
        Resource::Recon => user.is_admin || user.has_recon_access,
    };

    if granted {
        Ok(())
    } else {
        Err(AppError::Forbidden(anyhow::anyhow!(
            "User '{}' has no access to {}",
            user.username,
            resource.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool, bai: bool, recon: bool) -> SessionUser {
        SessionUser {
            user_id: 1,
            username: "test".to_string(),
            full_name: None,
            is_admin,
            has_bai_access: bai,
            has_recon_access: recon,
        }
    }

    #[test]
    fn admin_holds_every_grant() {
        let admin = user(true, false, false);
        assert!(authorize(&admin, Resource::Bai).is_ok());
        assert!(authorize(&admin, Resource::Recon).is_ok());
        assert!(authorize(&admin, Resource::Admin).is_ok());
    }

    #[test]
    fn module_grants_are_independent() {
        let bai_only = user(false, true, false);
        assert!(authorize(&bai_only, Resource::Bai).is_ok());
        assert!(authorize(&bai_only, Resource::Recon).is_err());
        assert!(authorize(&bai_only, Resource::Admin).is_err());

        let recon_only = user(false, false, true);
        assert!(authorize(&recon_only, Resource::Recon).is_ok());
        assert!(authorize(&recon_only, Resource::Bai).is_err());
    }

    #[test]
    fn no_grants_means_no_access() {
        let nobody = user(false, false, false);
        assert!(authorize(&nobody, Resource::Bai).is_err());
        assert!(authorize(&nobody, Resource::Recon).is_err());
        assert!(authorize(&nobody, Resource::Admin).is_err());
    }
}
