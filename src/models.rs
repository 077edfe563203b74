//! Domain types shared by services and handlers: status state machines,
//! payment methods, and the resolved catalog item variant.

use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Legal order transitions. Cancelled and Completed are terminal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Ready)
                | (Ready, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Approval and rejection are only reachable from the open states;
    /// Cancelled/Refunded are administrative and reachable from anywhere.
    pub fn is_open(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    MercadoPago,
}

impl PaymentMethod {
    /// Gateway methods require an external payment intent before the
    /// payment row may be persisted; manual methods await a receipt upload.
    pub fn is_gateway(self) -> bool {
        matches!(self, PaymentMethod::MercadoPago)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Only active bookings hold calendar capacity.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Physical,
    Digital,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    Service,
}

/// A catalog item resolved together with its subtype row. Stock and booking
/// applicability are dispatched by pattern match on `kind`.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub kind: CatalogKind,
}

#[derive(Debug, Clone)]
pub enum CatalogKind {
    Product {
        product_type: ProductType,
        stock: i32,
    },
    Service {
        duration_minutes: i32,
        max_capacity: i32,
        requires_booking: bool,
        available_days: Vec<Weekday>,
        work_start: NaiveTime,
        work_end: NaiveTime,
        slot_interval_minutes: Option<i32>,
    },
}

impl CatalogItem {
    pub fn item_kind(&self) -> ItemKind {
        match self.kind {
            CatalogKind::Product { .. } => ItemKind::Product,
            CatalogKind::Service { .. } => ItemKind::Service,
        }
    }

    /// Whether checkout must decrement stock for this item.
    pub fn consumes_stock(&self) -> bool {
        matches!(
            self.kind,
            CatalogKind::Product {
                product_type: ProductType::Physical,
                ..
            }
        )
    }
}

/// Parses a status column, treating unparseable stored values as data
/// corruption rather than caller error.
pub fn parse_status<T: FromStr>(raw: &str, what: &str) -> Result<T, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::Internal(format!("unrecognized {what} status '{raw}'")))
}

/// Parses the CSV weekday set stored on service items ("mon,tue,wed").
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>, ServiceError> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .map(|d| match d.as_str() {
            "mon" | "monday" => Ok(Weekday::Mon),
            "tue" | "tuesday" => Ok(Weekday::Tue),
            "wed" | "wednesday" => Ok(Weekday::Wed),
            "thu" | "thursday" => Ok(Weekday::Thu),
            "fri" | "friday" => Ok(Weekday::Fri),
            "sat" | "saturday" => Ok(Weekday::Sat),
            "sun" | "sunday" => Ok(Weekday::Sun),
            other => Err(ServiceError::Internal(format!(
                "unrecognized weekday '{other}' in availability set"
            ))),
        })
        .collect()
}

pub fn weekdays_to_csv(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| match d {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        })
        .collect::<Vec<_>>()
        .join(",")
}
