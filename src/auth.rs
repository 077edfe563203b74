use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_TENANT_ID: &str = "x-tenant-id";
pub const HEADER_USER_EMAIL: &str = "x-user-email";
pub const HEADER_USER_ROLE: &str = "x-user-role";

/// Identity forwarded by the authenticating edge proxy.
///
/// Every handler that touches tenant data extracts this and passes the
/// tenant id down explicitly; services never read ambient tenant state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role == "staff" || self.role == "admin"
    }

    /// Rejects customers from operator-only endpoints.
    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "staff role required".to_string(),
            ))
        }
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ServiceError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", name)))
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, ServiceError> {
    let raw = header_str(parts, name)?;
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::Unauthorized(format!("invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_uuid(parts, HEADER_USER_ID)?;
        let tenant_id = header_uuid(parts, HEADER_TENANT_ID)?;
        let email = header_str(parts, HEADER_USER_EMAIL)?.to_string();
        let role = header_str(parts, HEADER_USER_ROLE)?.to_string();

        Ok(AuthUser {
            user_id,
            tenant_id,
            email,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn extracts_full_identity() {
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let mut parts = parts_with(&[
            (HEADER_USER_ID, &user.to_string()),
            (HEADER_TENANT_ID, &tenant.to_string()),
            (HEADER_USER_EMAIL, "ana@example.com"),
            (HEADER_USER_ROLE, "customer"),
        ]);
        let auth = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.user_id, user);
        assert_eq!(auth.tenant_id, tenant);
        assert!(!auth.is_staff());
    }

    #[tokio::test]
    async fn missing_tenant_is_unauthorized() {
        let mut parts = parts_with(&[
            (HEADER_USER_ID, &Uuid::new_v4().to_string()),
            (HEADER_USER_EMAIL, "ana@example.com"),
            (HEADER_USER_ROLE, "customer"),
        ]);
        let err = AuthUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn staff_guard() {
        let auth = AuthUser {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "ops@example.com".into(),
            role: "staff".into(),
        };
        assert!(auth.require_staff().is_ok());
    }
}
