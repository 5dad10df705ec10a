pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Client, Event, Reservation, Ticket, TicketTier};

/// Inventory definition for a new event: tiers with their seat identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEventData {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub description: String,
    pub tiers: Vec<NewTierData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTierData {
    pub name: String,
    pub price: BigDecimal,
    pub seats: Vec<String>,
}

/// One held ticket as presented to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedSeat {
    pub seat_identifier: String,
    pub tier: String,
    pub price: BigDecimal,
}

/// Result of the atomic claim: either every requested seat was linked to a
/// freshly created reservation, or none were.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(Reservation),
    Unavailable(Vec<String>),
}

/// Storage operations behind the reservation lifecycle.
///
/// `claim_seats`, `delete_reservation` and `sweep_expired` are the only
/// operations that mutate a ticket's reservation link, and each one is a
/// single atomic unit in every implementation.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Creates an event together with its tiers and tickets.
    async fn create_event(&self, data: NewEventData) -> Result<Event, StoreError>;

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Tiers of an event ordered by descending price, each with its tickets
    /// in seat-identifier order.
    async fn event_seating(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<(TicketTier, Vec<Ticket>)>, StoreError>;

    /// Advisory availability check: the subset of `seats` that is not
    /// currently claimable (held by another reservation, or unknown).
    async fn taken_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Atomically creates an ONGOING reservation and links exactly the
    /// requested free tickets to it. Rolls back and reports the unavailable
    /// identifiers when any requested seat is not claimable.
    async fn claim_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
        booked_time: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Removes every non-PAID reservation booked at or before `cutoff`,
    /// releasing its tickets in the same atomic unit. Returns how many
    /// reservations were purged.
    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn find_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError>;

    /// Tickets held by a reservation, in seat-identifier order, with tier
    /// name and price attached.
    async fn reservation_seats(&self, id: Uuid) -> Result<Vec<ReservedSeat>, StoreError>;

    /// Releases all tickets of a reservation and deletes it, atomically.
    async fn delete_reservation(&self, id: Uuid) -> Result<(), StoreError>;

    /// Looks up a client by exact email, creating it when absent; name
    /// fields are updated in place either way.
    async fn upsert_client(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Client, StoreError>;

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>, StoreError>;

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError>;

    /// Attaches a client to a reservation and moves it to UNPAID. Returns
    /// `None` when the reservation no longer exists.
    async fn attach_client(
        &self,
        reservation_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Moves a reservation to PAID. Returns `None` when it no longer exists.
    async fn mark_paid(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError>;

    /// All reservations of a client, paired with their events.
    async fn client_reservations(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<(Reservation, Event)>, StoreError>;
}
