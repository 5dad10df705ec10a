use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Client, Event, Reservation, ReservationStatus, Ticket, TicketTier};
use crate::schema::*;
use crate::store::{ClaimOutcome, NewEventData, ReservationStore, ReservedSeat};

type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed store. The claim and release paths run as transactions;
/// the conditional ticket update inside `claim_seats` is what guarantees a
/// ticket is never linked to two reservations.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, StoreError>
    {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn create_event(&self, data: NewEventData) -> Result<Event, StoreError> {
        let mut conn = self.conn().await?;

        let event = Event {
            id: Uuid::new_v4(),
            name: data.name,
            starts_at: data.starts_at,
            description: data.description,
            created_at: None,
        };

        let mut tiers = Vec::new();
        let mut seats = Vec::new();
        for tier in data.tiers {
            let tier_id = Uuid::new_v4();
            tiers.push(TicketTier {
                id: tier_id,
                event_id: event.id,
                name: tier.name,
                price: tier.price,
            });
            for seat_identifier in tier.seats {
                seats.push(Ticket {
                    id: Uuid::new_v4(),
                    event_id: event.id,
                    tier_id,
                    seat_identifier,
                    reservation_id: None,
                });
            }
        }

        let created = event.clone();
        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                diesel::insert_into(events::table)
                    .values(&event)
                    .execute(conn)
                    .await?;
                diesel::insert_into(ticket_tiers::table)
                    .values(&tiers)
                    .execute(conn)
                    .await?;
                diesel::insert_into(tickets::table)
                    .values(&seats)
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await?;

        Ok(created)
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        let mut conn = self.conn().await?;
        let event = events::table
            .find(event_id)
            .first::<Event>(&mut conn)
            .await
            .optional()?;
        Ok(event)
    }

    async fn event_seating(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<(TicketTier, Vec<Ticket>)>, StoreError> {
        let mut conn = self.conn().await?;

        let tiers = ticket_tiers::table
            .filter(ticket_tiers::event_id.eq(event_id))
            .order(ticket_tiers::price.desc())
            .load::<TicketTier>(&mut conn)
            .await?;

        let event_tickets = tickets::table
            .filter(tickets::event_id.eq(event_id))
            .order(tickets::seat_identifier.asc())
            .load::<Ticket>(&mut conn)
            .await?;

        Ok(tiers
            .into_iter()
            .map(|tier| {
                let tier_tickets = event_tickets
                    .iter()
                    .filter(|t| t.tier_id == tier.id)
                    .cloned()
                    .collect();
                (tier, tier_tickets)
            })
            .collect())
    }

    async fn taken_seats(
        &self,
        event_id: Uuid,
        seats: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;

        let free = tickets::table
            .filter(tickets::event_id.eq(event_id))
            .filter(tickets::seat_identifier.eq_any(seats))
            .filter(tickets::reservation_id.is_null())
            .select(tickets::seat_identifier)
            .load::<String>(&mut conn)
            .await?;

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
        let mut conn = self.conn().await?;
        let requested = seats.to_vec();

        let outcome = conn
            .transaction::<ClaimOutcome, StoreError, _>(|conn| {
                Box::pin(async move {
                    // Lock the candidate rows so the freedom check below stays
                    // valid until the update commits.
                    let free = tickets::table
                        .filter(tickets::event_id.eq(event_id))
                        .filter(tickets::seat_identifier.eq_any(&requested))
                        .filter(tickets::reservation_id.is_null())
                        .select(tickets::seat_identifier)
                        .for_update()
                        .load::<String>(conn)
                        .await?;

                    if free.len() != requested.len() {
                        let unavailable = requested
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
                    diesel::insert_into(reservations::table)
                        .values(&reservation)
                        .execute(conn)
                        .await?;

                    let updated = diesel::update(
                        tickets::table
                            .filter(tickets::event_id.eq(event_id))
                            .filter(tickets::seat_identifier.eq_any(&requested))
                            .filter(tickets::reservation_id.is_null()),
                    )
                    .set(tickets::reservation_id.eq(reservation.id))
                    .execute(conn)
                    .await?;

                    if updated != requested.len() {
                        return Err(StoreError::ClaimConflict);
                    }

                    Ok(ClaimOutcome::Claimed(reservation))
                })
            })
            .await;

        match outcome {
            Err(StoreError::ClaimConflict) => {
                let unavailable = self.taken_seats(event_id, seats).await?;
                Ok(ClaimOutcome::Unavailable(unavailable))
            }
            other => other,
        }
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut conn = self.conn().await?;

        conn.transaction::<usize, StoreError, _>(|conn| {
            Box::pin(async move {
                let expired: Vec<Uuid> = reservations::table
                    .filter(reservations::status.ne(ReservationStatus::Paid.as_str()))
                    .filter(reservations::booked_time.le(cutoff))
                    .select(reservations::id)
                    .load(conn)
                    .await?;

                if expired.is_empty() {
                    return Ok(0);
                }

                diesel::update(
                    tickets::table.filter(tickets::reservation_id.eq_any(&expired)),
                )
                .set(tickets::reservation_id.eq(Option::<Uuid>::None))
                .execute(conn)
                .await?;

                let purged = diesel::delete(
                    reservations::table.filter(reservations::id.eq_any(&expired)),
                )
                .execute(conn)
                .await?;

                Ok(purged)
            })
        })
        .await
    }

    async fn find_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        let reservation = reservations::table
            .find(id)
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(reservation)
    }

    async fn reservation_seats(&self, id: Uuid) -> Result<Vec<ReservedSeat>, StoreError> {
        let mut conn = self.conn().await?;

        let held = tickets::table
            .filter(tickets::reservation_id.eq(id))
            .order(tickets::seat_identifier.asc())
            .load::<Ticket>(&mut conn)
            .await?;

        let tier_ids: Vec<Uuid> = held.iter().map(|t| t.tier_id).collect();
        let tiers = ticket_tiers::table
            .filter(ticket_tiers::id.eq_any(&tier_ids))
            .load::<TicketTier>(&mut conn)
            .await?;

        held.into_iter()
            .map(|ticket| {
                let tier = tiers
                    .iter()
                    .find(|t| t.id == ticket.tier_id)
                    .ok_or_else(|| StoreError::Inconsistent("ticket without tier".into()))?;
                Ok(ReservedSeat {
                    seat_identifier: ticket.seat_identifier,
                    tier: tier.name.clone(),
                    price: tier.price.clone(),
                })
            })
            .collect()
    }

    async fn delete_reservation(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                diesel::update(tickets::table.filter(tickets::reservation_id.eq(id)))
                    .set(tickets::reservation_id.eq(Option::<Uuid>::None))
                    .execute(conn)
                    .await?;
                diesel::delete(reservations::table.find(id))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
    }

    async fn upsert_client(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Client, StoreError> {
        let mut conn = self.conn().await?;

        let client = Client {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };

        let client = diesel::insert_into(clients::table)
            .values(&client)
            .on_conflict(clients::email)
            .do_update()
            .set((
                clients::first_name.eq(first_name),
                clients::last_name.eq(last_name),
            ))
            .get_result::<Client>(&mut conn)
            .await?;

        Ok(client)
    }

    async fn find_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        let mut conn = self.conn().await?;
        let client = clients::table
            .find(id)
            .first::<Client>(&mut conn)
            .await
            .optional()?;
        Ok(client)
    }

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError> {
        let mut conn = self.conn().await?;
        let client = clients::table
            .filter(clients::email.eq(email))
            .first::<Client>(&mut conn)
            .await
            .optional()?;
        Ok(client)
    }

    async fn attach_client(
        &self,
        reservation_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        let reservation = diesel::update(reservations::table.find(reservation_id))
            .set((
                reservations::client_id.eq(client_id),
                reservations::status.eq(ReservationStatus::Unpaid.as_str()),
            ))
            .get_result::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(reservation)
    }

    async fn mark_paid(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        let reservation = diesel::update(reservations::table.find(reservation_id))
            .set(reservations::status.eq(ReservationStatus::Paid.as_str()))
            .get_result::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(reservation)
    }

    async fn client_reservations(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<(Reservation, Event)>, StoreError> {
        let mut conn = self.conn().await?;

        let history = reservations::table
            .filter(reservations::client_id.eq(client_id))
            .load::<Reservation>(&mut conn)
            .await?;

        let event_ids: Vec<Uuid> = history.iter().map(|r| r.event_id).collect();
        let history_events = events::table
            .filter(events::id.eq_any(&event_ids))
            .load::<Event>(&mut conn)
            .await?;

        history
            .into_iter()
            .map(|reservation| {
                let event = history_events
                    .iter()
                    .find(|e| e.id == reservation.event_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Inconsistent("reservation without event".into()))?;
                Ok((reservation, event))
            })
            .collect()
    }
}
