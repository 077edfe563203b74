use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::product;
use crate::errors::ServiceError;

/// One physical-product order line, as far as stock is concerned.
#[derive(Debug, Clone)]
pub struct StockLine {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i32,
}

/// Stock ledger for physical products. Mutating methods take the
/// caller's connection so reservation and release always ride inside
/// the checkout or cancellation transaction.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Validates every line before anything is decremented, so a
    /// multi-line checkout fails as a whole instead of half-applied.
    pub async fn check_available<C: ConnectionTrait>(
        conn: &C,
        lines: &[StockLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            let row = product::Entity::find_by_id(line.item_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("product row for item {} not found", line.item_id))
                })?;

            if row.stock < line.quantity {
                return Err(ServiceError::InsufficientStock {
                    item: line.item_name.clone(),
                    available: row.stock,
                    requested: line.quantity,
                });
            }
        }
        Ok(())
    }

    /// Guarded decrement. The `stock >= qty` filter makes concurrent
    /// reservations race at the database: the loser matches zero rows
    /// and aborts its transaction with `InsufficientStock`.
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        line: &StockLine,
    ) -> Result<(), ServiceError> {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .filter(product::Column::ItemId.eq(line.item_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let available = product::Entity::find_by_id(line.item_id)
                .one(conn)
                .await?
                .map(|row| row.stock)
                .unwrap_or(0);
            return Err(ServiceError::InsufficientStock {
                item: line.item_name.clone(),
                available,
                requested: line.quantity,
            });
        }

        info!(
            item_id = %line.item_id,
            quantity = line.quantity,
            "Stock reserved"
        );
        Ok(())
    }

    /// Unconditional increment, the exact inverse of `reserve`.
    pub async fn release<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(quantity),
            )
            .filter(product::Column::ItemId.eq(item_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "product row for item {} not found",
                item_id
            )));
        }

        info!(%item_id, quantity, "Stock released");
        Ok(())
    }

    /// Current stock level, for staff views.
    #[instrument(skip(self))]
    pub async fn get_stock(&self, item_id: Uuid) -> Result<i32, ServiceError> {
        let row = product::Entity::find_by_id(item_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("product row for item {} not found", item_id))
            })?;
        Ok(row.stock)
    }
}
