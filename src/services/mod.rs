//! Domain services. Each holds the shared connection pool and runs its
//! multi-step operations as single transactions.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::entities::tenant;
use crate::errors::ServiceError;

pub mod bookings;
pub mod catalog;
pub mod gateway;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod shipping;

/// Loads the tenant row, rejecting suspended tenants. Mutating
/// tenant-scoped operations pass through this gate before touching
/// any other row.
pub(crate) async fn require_active_tenant<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
) -> Result<tenant::Model, ServiceError> {
    let row = tenant::Entity::find_by_id(tenant_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("tenant {tenant_id} not found")))?;
    if !row.active {
        return Err(ServiceError::Forbidden("tenant is suspended".to_string()));
    }
    Ok(row)
}
