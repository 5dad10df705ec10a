use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use num_traits::Zero;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{self, TierSeating};
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::models::{Event, Reservation};
use crate::store::{ClaimOutcome, NewEventData, ReservationStore, ReservedSeat};

/// How long a reservation may stay unpaid before it is reclaimed.
pub const HOLD_MINUTES: i64 = 15;

#[derive(Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    AlreadyPaid,
}

/// Where a reservation-or-client lookup should send the caller.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum LookupTarget {
    Reservation { id: Uuid },
    Client { id: Uuid },
}

/// One row of a client's reservation history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub reservation_id: Uuid,
    pub status: String,
    pub event_name: String,
    pub event_starts_at: DateTime<Utc>,
    pub active: bool,
}

/// The reservation lifecycle manager.
///
/// Owns the ONGOING → UNPAID → PAID state machine and the lazy expiry sweep;
/// every claim or release goes through the store's atomic operations. The
/// clock is injected so expiry can be tested deterministically.
pub struct ReservationService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: ReservationStore> ReservationService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn hold_expired(&self, reservation: &Reservation) -> bool {
        self.clock.now() - reservation.booked_time >= Duration::minutes(HOLD_MINUTES)
    }

    /// Purges every abandoned hold. Runs inline before any operation that
    /// reads or claims seat availability; staleness only matters at those
    /// moments, so no background timer is needed.
    async fn sweep(&self) -> Result<(), ServiceError> {
        let cutoff = self.clock.now() - Duration::minutes(HOLD_MINUTES);
        let purged = self.store.sweep_expired(cutoff).await?;
        if purged > 0 {
            info!(purged, "removed expired reservations");
        }
        Ok(())
    }

    pub async fn create_event(&self, data: NewEventData) -> Result<Event, ServiceError> {
        let event = self.store.create_event(data).await?;
        info!(event_id = %event.id, name = %event.name, "event created");
        Ok(event)
    }

    /// Seat layout for the selection screen: tiers by descending price, seats
    /// chunked into rows, with per-tier free counts. Read-only apart from the
    /// sweep.
    pub async fn seating_plan(&self, event_id: Uuid) -> Result<Vec<TierSeating>, ServiceError> {
        self.sweep().await?;
        self.store
            .find_event(event_id)
            .await?
            .ok_or(ServiceError::EventNotFound)?;
        let seating = self.store.event_seating(event_id).await?;
        Ok(catalog::seating_plan(seating))
    }

    /// Claims the requested seats for a new ONGOING reservation.
    ///
    /// The availability check ahead of the claim narrows the window between
    /// seat selection and submission; the store's conditional update is the
    /// guarantee that no overlapping claim can succeed.
    pub async fn select_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
    ) -> Result<Reservation, ServiceError> {
        if seats.is_empty() {
            return Err(ServiceError::EmptySeatSelection);
        }

        self.sweep().await?;
        self.store
            .find_event(event_id)
            .await?
            .ok_or(ServiceError::EventNotFound)?;

        let taken = self.store.taken_seats(event_id, seats).await?;
        if !taken.is_empty() {
            return Err(ServiceError::SeatsUnavailable { seats: taken });
        }

        match self
            .store
            .claim_seats(event_id, seats, self.clock.now())
            .await?
        {
            ClaimOutcome::Claimed(reservation) => {
                info!(
                    reservation_id = %reservation.id,
                    event_id = %event_id,
                    seats = seats.len(),
                    "seats held"
                );
                Ok(reservation)
            }
            ClaimOutcome::Unavailable(seats) => Err(ServiceError::SeatsUnavailable { seats }),
        }
    }

    /// Time left on the hold, `None` once the full hold duration has elapsed.
    /// Callers that get `None` on an unpaid reservation must treat it as
    /// expired.
    pub async fn remaining_hold_time(&self, id: Uuid) -> Result<Option<Duration>, ServiceError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        let elapsed = self.clock.now() - reservation.booked_time;
        if elapsed >= Duration::minutes(HOLD_MINUTES) {
            return Ok(None);
        }
        Ok(Some(Duration::minutes(HOLD_MINUTES) - elapsed))
    }

    /// Attaches contact details, moving the reservation to UNPAID. On an
    /// expired hold the reservation is deleted (tickets released) and the
    /// caller is told to start over. Idempotent for repeated valid calls;
    /// a PAID reservation is returned untouched.
    pub async fn attach_contact(
        &self,
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Reservation, ServiceError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        if reservation.is_paid() {
            return Ok(reservation);
        }

        if self.hold_expired(&reservation) {
            self.store.delete_reservation(reservation.id).await?;
            warn!(reservation_id = %id, "hold expired before contact details arrived");
            return Err(ServiceError::ReservationExpired);
        }

        let client = self.store.upsert_client(email, first_name, last_name).await?;
        let reservation = self
            .store
            .attach_client(id, client.id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        info!(reservation_id = %id, client_id = %client.id, "contact attached, awaiting payment");
        Ok(reservation)
    }

    /// Success signal from the payment gateway. No expiry check applies once
    /// payment is in progress; idempotent when already PAID.
    pub async fn confirm_payment(&self, id: Uuid) -> Result<Reservation, ServiceError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        if reservation.is_paid() {
            return Ok(reservation);
        }

        let reservation = self
            .store
            .mark_paid(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;
        info!(reservation_id = %id, "payment confirmed");
        Ok(reservation)
    }

    /// Deletes the reservation and frees its seats. PAID is terminal: the
    /// reservation is left intact and the caller is told so.
    pub async fn cancel(&self, id: Uuid) -> Result<CancelOutcome, ServiceError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        if reservation.is_paid() {
            return Ok(CancelOutcome::AlreadyPaid);
        }

        self.store.delete_reservation(id).await?;
        info!(reservation_id = %id, "reservation canceled, seats released");
        Ok(CancelOutcome::Canceled)
    }

    /// The reservation with its held seats (tier and price) and the summed
    /// total.
    pub async fn reservation_details(
        &self,
        id: Uuid,
    ) -> Result<(Reservation, Vec<ReservedSeat>, BigDecimal), ServiceError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ServiceError::ReservationNotFound)?;

        let seats = self.store.reservation_seats(id).await?;
        let total = seats
            .iter()
            .fold(BigDecimal::zero(), |acc, seat| acc + &seat.price);
        Ok((reservation, seats, total))
    }

    /// Resolves the "find my booking" form: a reservation id wins when given,
    /// otherwise the client behind the email. A miss on the email is a
    /// user-input error, surfaced directly.
    pub async fn find_reservation_or_client(
        &self,
        reservation_id: Option<Uuid>,
        email: &str,
    ) -> Result<LookupTarget, ServiceError> {
        if let Some(id) = reservation_id {
            self.store
                .find_reservation(id)
                .await?
                .ok_or(ServiceError::ReservationNotFound)?;
            return Ok(LookupTarget::Reservation { id });
        }

        let client = self
            .store
            .find_client_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::UnknownClientEmail(email.to_string()))?;
        Ok(LookupTarget::Client { id: client.id })
    }

    /// Reservation history of a client, most recent event first (ties broken
    /// by reservation id), each entry flagged active while its event is still
    /// ahead.
    pub async fn list_client_reservations(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.store
            .find_client(client_id)
            .await?
            .ok_or(ServiceError::ClientNotFound)?;

        let mut history = self.store.client_reservations(client_id).await?;
        history.sort_by(|(ra, ea), (rb, eb)| {
            eb.starts_at
                .cmp(&ea.starts_at)
                .then(ra.id.cmp(&rb.id))
        });

        let now = self.clock.now();
        Ok(history
            .into_iter()
            .map(|(reservation, event)| HistoryEntry {
                reservation_id: reservation.id,
                status: reservation.status,
                event_name: event.name,
                event_starts_at: event.starts_at,
                active: event.starts_at >= now,
            })
            .collect())
    }
}

/// Formats a remaining hold duration as `MM:SS` for display.
pub fn format_remaining(remaining: Duration) -> String {
    let seconds = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_renders_as_minutes_and_seconds() {
        assert_eq!(format_remaining(Duration::minutes(15)), "15:00");
        assert_eq!(format_remaining(Duration::seconds(61)), "01:01");
        assert_eq!(format_remaining(Duration::seconds(9)), "00:09");
        assert_eq!(format_remaining(Duration::zero()), "00:00");
        assert_eq!(format_remaining(Duration::seconds(-5)), "00:00");
    }
}
