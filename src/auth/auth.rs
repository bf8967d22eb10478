use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Builds the caller from access-token claims; refresh tokens and
    /// unknown roles yield `None`.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.token_type != TokenType::Access {
            return None;
        }
        let role = Role::from_id(claims.role)?;
        Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> AppResult<()> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    /// Admin, HR or a line manager.
    pub fn require_approver(&self) -> AppResult<()> {
        if self.is_hr_or_admin() || self.is_manager() {
            Ok(())
        } else {
            Err(AppError::forbidden("Approver role required"))
        }
    }

    /// Back-office roles that run rentals, equipment and billing.
    pub fn require_staff(&self) -> AppResult<()> {
        if matches!(self.role, Role::Admin | Role::Hr | Role::Manager | Role::System) {
            Ok(())
        } else {
            Err(AppError::forbidden("Staff only"))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// Returns true if the user is an employee
    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }

    /// Employee record of the caller, required for self-service endpoints.
    pub fn own_employee_id(&self) -> AppResult<u64> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("No employee profile"))
    }

    pub fn owns(&self, employee_id: u64) -> bool {
        self.employee_id == Some(employee_id)
    }
}

fn bearer_user(req: &HttpRequest) -> AppResult<AuthUser> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::internal("Config missing"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    AuthUser::from_claims(claims).ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // The middleware has usually done the work already.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(bearer_user(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: u8, token_type: TokenType) -> Claims {
        Claims {
            user_id: 1,
            sub: "u".to_string(),
            role,
            exp: usize::MAX,
            jti: "j".to_string(),
            token_type,
            employee_id: Some(5),
        }
    }

    #[test]
    fn refresh_claims_are_not_an_identity() {
        assert!(AuthUser::from_claims(claims(1, TokenType::Refresh)).is_none());
        assert!(AuthUser::from_claims(claims(99, TokenType::Access)).is_none());
        let user = AuthUser::from_claims(claims(6, TokenType::Access)).unwrap();
        assert!(user.is_manager());
        assert!(user.owns(5));
    }

    #[test]
    fn role_gates() {
        let hr = AuthUser::from_claims(claims(2, TokenType::Access)).unwrap();
        assert!(hr.require_hr_or_admin().is_ok());
        assert!(hr.require_admin().is_err());
        assert!(hr.require_approver().is_ok());

        let employee = AuthUser::from_claims(claims(3, TokenType::Access)).unwrap();
        assert!(employee.require_approver().is_err());
        assert!(employee.require_staff().is_err());
        assert!(hr.require_staff().is_ok());
        assert_eq!(employee.own_employee_id().unwrap(), 5);
    }
}
