use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Ongoing,
    Unpaid,
    Paid,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Ongoing => "ONGOING",
            ReservationStatus::Unpaid => "UNPAID",
            ReservationStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ONGOING" => Some(ReservationStatus::Ongoing),
            "UNPAID" => Some(ReservationStatus::Unpaid),
            "PAID" => Some(ReservationStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::events)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::ticket_tiers)]
pub struct TicketTier {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::clients)]
pub struct Client {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Uuid,
    pub client_id: Option<Uuid>,
    pub status: String,
    pub booked_time: DateTime<Utc>,
}

impl Reservation {
    pub fn is_paid(&self) -> bool {
        self.status == ReservationStatus::Paid.as_str()
    }

    pub fn is_unpaid(&self) -> bool {
        self.status == ReservationStatus::Unpaid.as_str()
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == ReservationStatus::Ongoing.as_str()
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub seat_identifier: String,
    pub reservation_id: Option<Uuid>,
}

impl Ticket {
    pub fn is_free(&self) -> bool {
        self.reservation_id.is_none()
    }
}
