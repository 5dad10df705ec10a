use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Client, Event, Reservation, ReservationStatus, Ticket, TicketTier};
use crate::store::{ClaimOutcome, NewEventData, ReservationStore, ReservedSeat};

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    tiers: HashMap<Uuid, TicketTier>,
    tickets: HashMap<Uuid, Ticket>,
    reservations: HashMap<Uuid, Reservation>,
    clients: HashMap<Uuid, Client>,
}

/// In-memory store with the same claim/release semantics as the postgres
/// store: every mutating operation runs to completion under one lock, so a
/// ticket can never be linked to two reservations here either. Backs the
/// deterministic lifecycle tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn free_seats(&self, event_id: Uuid, seats: &[String]) -> Vec<String> {
        self.tickets
            .values()
            .filter(|t| t.event_id == event_id && t.is_free() && seats.contains(&t.seat_identifier))
            .map(|t| t.seat_identifier.clone())
            .collect()
    }

    fn release_and_remove(&mut self, reservation_id: Uuid) {
        for ticket in self.tickets.values_mut() {
            if ticket.reservation_id == Some(reservation_id) {
                ticket.reservation_id = None;
            }
        }
        self.reservations.remove(&reservation_id);
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create_event(&self, data: NewEventData) -> Result<Event, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let event = Event {
            id: Uuid::new_v4(),
            name: data.name,
            starts_at: data.starts_at,
            description: data.description,
            created_at: None,
        };

        for tier in data.tiers {
            let tier_id = Uuid::new_v4();
            inner.tiers.insert(
                tier_id,
                TicketTier {
                    id: tier_id,
                    event_id: event.id,
                    name: tier.name,
                    price: tier.price,
                },
            );
            for seat_identifier in tier.seats {
                let ticket_id = Uuid::new_v4();
                inner.tickets.insert(
                    ticket_id,
                    Ticket {
                        id: ticket_id,
                        event_id: event.id,
                        tier_id,
                        seat_identifier,
                        reservation_id: None,
                    },
                );
            }
        }

        inner.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.events.get(&event_id).cloned())
    }

    async fn event_seating(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<(TicketTier, Vec<Ticket>)>, StoreError> {
        let inner = self.inner.lock().unwrap();

        let mut tiers: Vec<TicketTier> = inner
            .tiers
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        tiers.sort_by(|a, b| b.price.cmp(&a.price));

        Ok(tiers
            .into_iter()
            .map(|tier| {
                let mut tier_tickets: Vec<Ticket> = inner
                    .tickets
                    .values()
                    .filter(|t| t.tier_id == tier.id)
                    .cloned()
                    .collect();
                tier_tickets.sort_by(|a, b| a.seat_identifier.cmp(&b.seat_identifier));
                (tier, tier_tickets)
            })
            .collect())
    }

    async fn taken_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let free = inner.free_seats(event_id, seats);
        Ok(seats
            .iter()
            .filter(|s| !free.contains(s))
            .cloned()
            .collect())
    }

    async fn claim_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
        booked_time: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let free = inner.free_seats(event_id, seats);
        if free.len() != seats.len() {
            let unavailable = seats
                .iter()
                .filter(|s| !free.contains(s))
                .cloned()
                .collect();
            return Ok(ClaimOutcome::Unavailable(unavailable));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            event_id,
            client_id: None,
            status: ReservationStatus::Ongoing.as_str().to_string(),
            booked_time,
        };
        for ticket in inner.tickets.values_mut() {
            if ticket.event_id == event_id
                && ticket.is_free()
                && seats.contains(&ticket.seat_identifier)
            {
                ticket.reservation_id = Some(reservation.id);
            }
        }
        inner
            .reservations
            .insert(reservation.id, reservation.clone());

        Ok(ClaimOutcome::Claimed(reservation))
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let expired: Vec<Uuid> = inner
            .reservations
            .values()
            .filter(|r| !r.is_paid() && r.booked_time <= cutoff)
            .map(|r| r.id)
            .collect();

        for id in &expired {
            inner.release_and_remove(*id);
        }
        Ok(expired.len())
    }

    async fn find_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.reservations.get(&id).cloned())
    }

    async fn reservation_seats(&self, id: Uuid) -> Result<Vec<ReservedSeat>, StoreError> {
        let inner = self.inner.lock().unwrap();

        let mut held: Vec<&Ticket> = inner
            .tickets
            .values()
            .filter(|t| t.reservation_id == Some(id))
            .collect();
        held.sort_by(|a, b| a.seat_identifier.cmp(&b.seat_identifier));

        held.into_iter()
            .map(|ticket| {
                let tier = inner
                    .tiers
                    .get(&ticket.tier_id)
                    .ok_or_else(|| StoreError::Inconsistent("ticket without tier".into()))?;
                Ok(ReservedSeat {
                    seat_identifier: ticket.seat_identifier.clone(),
                    tier: tier.name.clone(),
                    price: tier.price.clone(),
                })
            })
            .collect()
    }

    async fn delete_reservation(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.release_and_remove(id);
        Ok(())
    }

    async fn upsert_client(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Client, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(client) = inner.clients.values_mut().find(|c| c.email == email) {
            client.first_name = first_name.to_string();
            client.last_name = last_name.to_string();
            return Ok(client.clone());
        }

        let client = Client {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        inner.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.clients.get(&id).cloned())
    }

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.clients.values().find(|c| c.email == email).cloned())
    }

    async fn attach_client(
        &self,
        reservation_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.reservations.get_mut(&reservation_id).map(|r| {
            r.client_id = Some(client_id);
            r.status = ReservationStatus::Unpaid.as_str().to_string();
            r.clone()
        }))
    }

    async fn mark_paid(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.reservations.get_mut(&reservation_id).map(|r| {
            r.status = ReservationStatus::Paid.as_str().to_string();
            r.clone()
        }))
    }

    async fn client_reservations(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<(Reservation, Event)>, StoreError> {
        let inner = self.inner.lock().unwrap();

        inner
            .reservations
            .values()
            .filter(|r| r.client_id == Some(client_id))
            .map(|reservation| {
                let event = inner
                    .events
                    .get(&reservation.event_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Inconsistent("reservation without event".into()))?;
                Ok((reservation.clone(), event))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewTierData;
    use bigdecimal::BigDecimal;
    use chrono::TimeZone;

    fn event_data() -> NewEventData {
        NewEventData {
            name: "Expo".to_string(),
            starts_at: Utc.with_ymd_and_hms(2025, 9, 1, 19, 0, 0).unwrap(),
            description: "trade fair".to_string(),
            tiers: vec![NewTierData {
                name: "Standard".to_string(),
                price: BigDecimal::from(40),
                seats: vec!["A1".to_string(), "A2".to_string()],
            }],
        }
    }

    #[tokio::test]
    async fn second_claim_on_held_seat_reports_it() {
        let store = MemoryStore::new();
        let event = store.create_event(event_data()).await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();

        let first = store
            .claim_seats(event.id, &["A1".to_string()], now)
            .await
            .unwrap();
        assert!(matches!(first, ClaimOutcome::Claimed(_)));

        let second = store
            .claim_seats(event.id, &["A1".to_string(), "A2".to_string()], now)
            .await
            .unwrap();
        match second {
            ClaimOutcome::Unavailable(seats) => assert_eq!(seats, vec!["A1".to_string()]),
            ClaimOutcome::Claimed(_) => panic!("overlapping claim must not succeed"),
        }
    }

    #[tokio::test]
    async fn delete_releases_every_held_ticket() {
        let store = MemoryStore::new();
        let event = store.create_event(event_data()).await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        let seats = vec!["A1".to_string(), "A2".to_string()];

        let reservation = match store.claim_seats(event.id, &seats, now).await.unwrap() {
            ClaimOutcome::Claimed(r) => r,
            ClaimOutcome::Unavailable(_) => panic!("seats were free"),
        };

        store.delete_reservation(reservation.id).await.unwrap();
        assert!(store.taken_seats(event.id, &seats).await.unwrap().is_empty());
        assert!(store.find_reservation(reservation.id).await.unwrap().is_none());
    }
}
