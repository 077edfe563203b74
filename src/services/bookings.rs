use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{booking, service_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{parse_status, BookingStatus, CatalogItem, CatalogKind};
use crate::services::catalog::CatalogService;

/// A bookable window on a service's calendar.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available_capacity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub service_item_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
}

/// The scheduling settings of a service item, pulled out of its
/// `CatalogKind::Service` variant.
struct ServiceSchedule {
    duration_minutes: i32,
    max_capacity: i32,
    available_days: Vec<chrono::Weekday>,
    work_start: NaiveTime,
    work_end: NaiveTime,
    slot_interval_minutes: Option<i32>,
}

impl ServiceSchedule {
    fn from_catalog(item: &CatalogItem) -> Result<Self, ServiceError> {
        match &item.kind {
            CatalogKind::Service {
                duration_minutes,
                max_capacity,
                available_days,
                work_start,
                work_end,
                slot_interval_minutes,
                ..
            } => Ok(Self {
                duration_minutes: *duration_minutes,
                max_capacity: *max_capacity,
                available_days: available_days.clone(),
                work_start: *work_start,
                work_end: *work_end,
                slot_interval_minutes: *slot_interval_minutes,
            }),
            CatalogKind::Product { .. } => Err(ServiceError::InvalidOperation(format!(
                "item {} is not a bookable service",
                item.id
            ))),
        }
    }

    fn step_minutes(&self) -> i32 {
        self.slot_interval_minutes.unwrap_or(self.duration_minutes)
    }

    /// End time for a booking starting at `start`; `None` when the
    /// window would wrap past midnight.
    fn end_of(&self, start: NaiveTime) -> Option<NaiveTime> {
        let (end, wrapped) =
            start.overflowing_add_signed(Duration::minutes(self.duration_minutes as i64));
        if wrapped != 0 {
            None
        } else {
            Some(end)
        }
    }

    /// Weekday and working-hours gate for an explicit start time.
    fn validate_window(&self, date: NaiveDate, start: NaiveTime) -> Result<NaiveTime, ServiceError> {
        if !self.available_days.contains(&date.weekday()) {
            return Err(ServiceError::Validation(format!(
                "service is not available on {}",
                date.weekday()
            )));
        }
        let end = self
            .end_of(start)
            .ok_or_else(|| ServiceError::Validation("booking is outside working hours".into()))?;
        if start < self.work_start || end > self.work_end {
            return Err(ServiceError::Validation(
                "booking is outside working hours".to_string(),
            ));
        }
        Ok(end)
    }
}

/// Booking calendar: slot discovery, capacity-checked reservation, and
/// the lifecycle operations on individual bookings.
#[derive(Clone)]
pub struct BookingService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl BookingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Locks the service row for the rest of the transaction so a
    /// concurrent reservation cannot read the same overlap count before
    /// either insert lands. Postgres takes a FOR UPDATE lock; SQLite's
    /// single-writer model already serializes and ignores the clause.
    async fn lock_service_row<C: ConnectionTrait>(
        conn: &C,
        service_item_id: Uuid,
    ) -> Result<(), ServiceError> {
        service_item::Entity::find_by_id(service_item_id)
            .lock_exclusive()
            .one(conn)
            .await?;
        Ok(())
    }

    /// Active bookings overlapping `[start, end)` on the given day.
    /// Half-open comparison, so back-to-back bookings never collide.
    async fn count_overlapping<C: ConnectionTrait>(
        conn: &C,
        service_item_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<i32, ServiceError> {
        let mut query = booking::Entity::find()
            .filter(booking::Column::ServiceItemId.eq(service_item_id))
            .filter(booking::Column::BookingDate.eq(date))
            .filter(
                booking::Column::Status.is_in([
                    BookingStatus::Pending.to_string(),
                    BookingStatus::Confirmed.to_string(),
                ]),
            )
            .filter(booking::Column::StartTime.lt(end))
            .filter(booking::Column::EndTime.gt(start));

        if let Some(id) = exclude {
            query = query.filter(booking::Column::Id.ne(id));
        }

        let count = query.count(conn).await?;
        Ok(count as i32)
    }

    /// Walks the working window and reports every slot with remaining
    /// capacity. A day outside the service's weekday set has no slots.
    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        tenant_id: Uuid,
        service_item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, ServiceError> {
        let item = CatalogService::resolve(&*self.db_pool, tenant_id, service_item_id).await?;
        let schedule = ServiceSchedule::from_catalog(&item)?;

        if !schedule.available_days.contains(&date.weekday()) {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        let step = Duration::minutes(schedule.step_minutes() as i64);
        let mut start = schedule.work_start;

        loop {
            let end = match schedule.end_of(start) {
                Some(end) if end <= schedule.work_end => end,
                _ => break,
            };

            let taken = Self::count_overlapping(
                &*self.db_pool,
                service_item_id,
                date,
                start,
                end,
                None,
            )
            .await?;
            let available = schedule.max_capacity - taken;
            if available > 0 {
                slots.push(Slot {
                    start_time: start,
                    end_time: end,
                    available_capacity: available,
                });
            }

            let (next, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || next <= start {
                break;
            }
            start = next;
        }

        Ok(slots)
    }

    /// Weekday and working-hours pre-validation for checkout, before any
    /// stock is touched. Returns the booking's end time.
    pub fn validate_booking_window(
        item: &CatalogItem,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<NaiveTime, ServiceError> {
        ServiceSchedule::from_catalog(item)?.validate_window(date, start)
    }

    /// Inserts a Pending booking after re-checking capacity on the
    /// caller's connection. Inside a transaction this is the authoritative
    /// check; the slot listing is only advisory.
    #[allow(clippy::too_many_arguments)]
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        user_id: Uuid,
        customer_name: &str,
        customer_email: &str,
        item: &CatalogItem,
        date: NaiveDate,
        start: NaiveTime,
        order_id: Option<Uuid>,
        order_item_id: Option<Uuid>,
        notes: Option<String>,
    ) -> Result<booking::Model, ServiceError> {
        let schedule = ServiceSchedule::from_catalog(item)?;
        let end = schedule.validate_window(date, start)?;

        Self::lock_service_row(conn, item.id).await?;
        let taken = Self::count_overlapping(conn, item.id, date, start, end, None).await?;
        if taken >= schedule.max_capacity {
            return Err(ServiceError::Conflict(format!(
                "no capacity left for {} at {} on {}",
                item.name, start, date
            )));
        }

        let model = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            service_item_id: Set(item.id),
            order_id: Set(order_id),
            order_item_id: Set(order_item_id),
            user_id: Set(user_id),
            booking_date: Set(date),
            start_time: Set(start),
            end_time: Set(end),
            status: Set(BookingStatus::Pending.to_string()),
            customer_name: Set(customer_name.to_string()),
            customer_email: Set(customer_email.to_string()),
            notes: Set(notes),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(conn)
        .await?;

        Ok(model)
    }

    /// Standalone booking flow, outside any order.
    #[instrument(skip(self, auth, req))]
    pub async fn create_booking(
        &self,
        auth: &AuthUser,
        req: CreateBookingRequest,
    ) -> Result<booking::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        crate::services::require_active_tenant(&txn, auth.tenant_id).await?;
        let item = CatalogService::resolve(&txn, auth.tenant_id, req.service_item_id).await?;
        let customer_name = crate::entities::user::Entity::find_by_id(auth.user_id)
            .one(&txn)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| auth.email.clone());
        let model = Self::reserve(
            &txn,
            auth.tenant_id,
            auth.user_id,
            &customer_name,
            &auth.email,
            &item,
            req.booking_date,
            req.start_time,
            None,
            None,
            req.notes,
        )
        .await?;
        txn.commit().await?;

        self.event_sender.send(Event::BookingCreated(model.id)).await;
        Ok(model)
    }

    async fn load_booking<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        booking_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let model = booking::Entity::find_by_id(booking_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("booking {} not found", booking_id)))?;
        if model.tenant_id != tenant_id {
            return Err(ServiceError::Forbidden(
                "booking belongs to another tenant".to_string(),
            ));
        }
        Ok(model)
    }

    /// Cancels an active booking, recording the reason on its notes.
    #[instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<booking::Model, ServiceError> {
        let model = Self::load_booking(&*self.db_pool, tenant_id, booking_id).await?;
        let status: BookingStatus = parse_status(&model.status, "booking")?;
        if !status.is_active() {
            return Err(ServiceError::InvalidStatus(format!(
                "booking {} is {} and cannot be cancelled",
                booking_id, status
            )));
        }

        let mut active: booking::ActiveModel = model.into();
        active.status = Set(BookingStatus::Cancelled.to_string());
        active.notes = Set(Some(append_note(
            active.notes.take().flatten(),
            &format!("Cancellation: {}", reason),
        )));
        let updated = active.update(&*self.db_pool).await?;

        self.event_sender
            .send(Event::BookingCancelled(updated.id))
            .await;
        Ok(updated)
    }

    /// Staff confirmation of an individual booking.
    #[instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let model = Self::load_booking(&*self.db_pool, tenant_id, booking_id).await?;
        let status: BookingStatus = parse_status(&model.status, "booking")?;
        if status != BookingStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "booking {} is {} and cannot be confirmed",
                booking_id, status
            )));
        }

        let mut active: booking::ActiveModel = model.into();
        active.status = Set(BookingStatus::Confirmed.to_string());
        let updated = active.update(&*self.db_pool).await?;

        self.event_sender
            .send(Event::BookingConfirmed(updated.id))
            .await;
        Ok(updated)
    }

    /// Moves a booking in place; the original row keeps its identity and
    /// links. The conflict check excludes the booking itself.
    #[instrument(skip(self, req))]
    pub async fn reschedule_booking(
        &self,
        tenant_id: Uuid,
        booking_id: Uuid,
        req: RescheduleRequest,
    ) -> Result<booking::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        crate::services::require_active_tenant(&txn, tenant_id).await?;

        let model = Self::load_booking(&txn, tenant_id, booking_id).await?;
        let status: BookingStatus = parse_status(&model.status, "booking")?;
        if !status.is_active() {
            return Err(ServiceError::InvalidStatus(format!(
                "booking {} is {} and cannot be rescheduled",
                booking_id, status
            )));
        }

        let item = CatalogService::resolve(&txn, tenant_id, model.service_item_id).await?;
        let schedule = ServiceSchedule::from_catalog(&item)?;
        let end = schedule.validate_window(req.booking_date, req.start_time)?;

        Self::lock_service_row(&txn, model.service_item_id).await?;
        let taken = Self::count_overlapping(
            &txn,
            model.service_item_id,
            req.booking_date,
            req.start_time,
            end,
            Some(booking_id),
        )
        .await?;
        if taken >= schedule.max_capacity {
            return Err(ServiceError::Conflict(format!(
                "no capacity left for {} at {} on {}",
                item.name, req.start_time, req.booking_date
            )));
        }

        let mut active: booking::ActiveModel = model.into();
        active.booking_date = Set(req.booking_date);
        active.start_time = Set(req.start_time);
        active.end_time = Set(end);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send(Event::BookingRescheduled(updated.id))
            .await;
        Ok(updated)
    }

    /// Confirms every Pending booking attached to an order. Called from
    /// the payment-approval cascade, inside its transaction.
    pub async fn confirm_for_order<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let pending = booking::Entity::find()
            .filter(booking::Column::OrderId.eq(order_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.to_string()))
            .all(conn)
            .await?;

        for model in pending {
            let mut active: booking::ActiveModel = model.into();
            active.status = Set(BookingStatus::Confirmed.to_string());
            active.update(conn).await?;
        }
        Ok(())
    }

    /// Cancels every active booking attached to an order so a dead order
    /// stops holding calendar capacity.
    pub async fn cancel_for_order<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        reason: &str,
    ) -> Result<(), ServiceError> {
        let active_bookings = booking::Entity::find()
            .filter(booking::Column::OrderId.eq(order_id))
            .filter(
                booking::Column::Status.is_in([
                    BookingStatus::Pending.to_string(),
                    BookingStatus::Confirmed.to_string(),
                ]),
            )
            .all(conn)
            .await?;

        for model in active_bookings {
            info!(booking_id = %model.id, %order_id, "Cancelling booking with its order");
            let mut active: booking::ActiveModel = model.into();
            active.status = Set(BookingStatus::Cancelled.to_string());
            active.notes = Set(Some(append_note(
                active.notes.take().flatten(),
                &format!("Cancellation: {}", reason),
            )));
            active.update(conn).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn my_bookings(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        let models = booking::Entity::find()
            .filter(booking::Column::TenantId.eq(tenant_id))
            .filter(booking::Column::UserId.eq(user_id))
            .order_by_desc(booking::Column::BookingDate)
            .order_by_desc(booking::Column::StartTime)
            .all(&*self.db_pool)
            .await?;
        Ok(models)
    }

    /// Staff calendar view over a date range (inclusive).
    #[instrument(skip(self))]
    pub async fn service_bookings(
        &self,
        tenant_id: Uuid,
        service_item_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        // Tenant check rides on the item lookup
        CatalogService::resolve(&*self.db_pool, tenant_id, service_item_id).await?;

        let models = booking::Entity::find()
            .filter(booking::Column::ServiceItemId.eq(service_item_id))
            .filter(booking::Column::BookingDate.gte(from))
            .filter(booking::Column::BookingDate.lte(to))
            .order_by_asc(booking::Column::BookingDate)
            .order_by_asc(booking::Column::StartTime)
            .all(&*self.db_pool)
            .await?;
        Ok(models)
    }
}

fn append_note(existing: Option<String>, line: &str) -> String {
    match existing {
        Some(notes) if !notes.is_empty() => format!("{}\n{}", notes, line),
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogKind;
    use chrono::Weekday;
    use rust_decimal_macros::dec;

    fn service_item(duration: i32, capacity: i32, interval: Option<i32>) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Haircut".into(),
            price: dec!(25),
            kind: CatalogKind::Service {
                duration_minutes: duration,
                max_capacity: capacity,
                requires_booking: true,
                available_days: vec![Weekday::Mon, Weekday::Tue],
                work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                slot_interval_minutes: interval,
            },
        }
    }

    #[test]
    fn window_validation_rejects_off_days() {
        let schedule = ServiceSchedule::from_catalog(&service_item(30, 1, None)).unwrap();
        // 2026-09-02 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        let start = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(schedule.validate_window(date, start).is_err());
    }

    #[test]
    fn window_validation_rejects_late_starts() {
        let schedule = ServiceSchedule::from_catalog(&service_item(60, 1, None)).unwrap();
        // Monday, but the hour-long booking would end at 17:30
        let date = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        let start = NaiveTime::from_hms_opt(16, 30, 0).unwrap();
        assert!(schedule.validate_window(date, start).is_err());
    }

    #[test]
    fn window_validation_accepts_closing_fit() {
        let schedule = ServiceSchedule::from_catalog(&service_item(60, 1, None)).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        let start = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        let end = schedule.validate_window(date, start).unwrap();
        assert_eq!(end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn midnight_wrap_is_outside_working_hours() {
        let item = CatalogItem {
            kind: CatalogKind::Service {
                duration_minutes: 120,
                max_capacity: 1,
                requires_booking: true,
                available_days: vec![Weekday::Mon],
                work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                work_end: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
                slot_interval_minutes: None,
            },
            ..service_item(120, 1, None)
        };
        let schedule = ServiceSchedule::from_catalog(&item).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        let start = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert!(schedule.validate_window(date, start).is_err());
    }

    #[test]
    fn slot_step_defaults_to_duration() {
        let schedule = ServiceSchedule::from_catalog(&service_item(45, 1, None)).unwrap();
        assert_eq!(schedule.step_minutes(), 45);
        let with_interval = ServiceSchedule::from_catalog(&service_item(45, 1, Some(15))).unwrap();
        assert_eq!(with_interval.step_minutes(), 15);
    }

    #[test]
    fn products_are_not_bookable() {
        let item = CatalogItem {
            kind: CatalogKind::Product {
                product_type: crate::models::ProductType::Physical,
                stock: 3,
            },
            ..service_item(30, 1, None)
        };
        assert!(ServiceSchedule::from_catalog(&item).is_err());
    }

    #[test]
    fn append_note_preserves_history() {
        assert_eq!(append_note(None, "Cancellation: no-show"), "Cancellation: no-show");
        assert_eq!(
            append_note(Some("first".into()), "second"),
            "first\nsecond"
        );
    }
}
