use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, TimeZone, Utc};

use reservation_service::clock::ManualClock;
use reservation_service::error::ServiceError;
use reservation_service::models::Event;
use reservation_service::service::{CancelOutcome, LookupTarget, ReservationService};
use reservation_service::store::memory::MemoryStore;
use reservation_service::store::{NewEventData, NewTierData, ReservationStore};

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap()
}

fn service() -> (ReservationService<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = ReservationService::new(MemoryStore::new(), clock.clone());
    (service, clock)
}

fn seats(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

async fn seed_event(
    service: &ReservationService<MemoryStore>,
    starts_at: DateTime<Utc>,
) -> Event {
    service
        .create_event(NewEventData {
            name: "Expo".to_string(),
            starts_at,
            description: "annual trade fair".to_string(),
            tiers: vec![
                NewTierData {
                    name: "VIP".to_string(),
                    price: BigDecimal::from(100),
                    seats: (1..=12).map(|i| format!("V{i:02}")).collect(),
                },
                NewTierData {
                    name: "Standard".to_string(),
                    price: BigDecimal::from(40),
                    seats: (1..=5).map(|i| format!("A{i:02}")).collect(),
                },
            ],
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_overlapping_claims_cannot_both_succeed() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let wanted = seats(&["A01", "A02"]);

    let (first, second) = tokio::join!(
        service.select_seats(event.id, &wanted),
        service.select_seats(event.id, &wanted),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two overlapping claims may win");

    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(
        loser,
        Err(ServiceError::SeatsUnavailable { .. })
    ));
}

#[tokio::test]
async fn held_seats_never_overlap_between_reservations() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;

    let first = service
        .select_seats(event.id, &seats(&["A01", "A02"]))
        .await
        .unwrap();
    assert!(first.is_ongoing());

    let err = service
        .select_seats(event.id, &seats(&["A02", "A03"]))
        .await
        .unwrap_err();
    match err {
        ServiceError::SeatsUnavailable { seats } => assert_eq!(seats, vec!["A02".to_string()]),
        other => panic!("expected SeatsUnavailable, got {other:?}"),
    }

    let second = service
        .select_seats(event.id, &seats(&["A03"]))
        .await
        .unwrap();

    let (_, first_seats, _) = service.reservation_details(first.id).await.unwrap();
    let (_, second_seats, _) = service.reservation_details(second.id).await.unwrap();
    for seat in &second_seats {
        assert!(first_seats
            .iter()
            .all(|s| s.seat_identifier != seat.seat_identifier));
    }
}

#[tokio::test]
async fn remaining_hold_time_decreases_until_it_lapses() {
    let (service, clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let reservation = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();

    let full = service
        .remaining_hold_time(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(full, Duration::minutes(15));

    clock.advance(Duration::minutes(5));
    let later = service
        .remaining_hold_time(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(later, Duration::minutes(10));
    assert!(later < full);

    clock.advance(Duration::minutes(9) + Duration::seconds(59));
    let nearly = service
        .remaining_hold_time(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nearly, Duration::seconds(1));

    // Exactly fifteen minutes elapsed: the hold has lapsed.
    clock.advance(Duration::seconds(1));
    assert!(service
        .remaining_hold_time(reservation.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn expired_hold_is_reclaimed_on_next_selection() {
    let (service, clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;

    let first = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();

    assert!(matches!(
        service.select_seats(event.id, &seats(&["A01"])).await,
        Err(ServiceError::SeatsUnavailable { .. })
    ));

    clock.advance(Duration::minutes(16));

    let second = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();
    assert_ne!(second.id, first.id);

    // The stale reservation was purged by the sweep, not just unlinked.
    assert!(matches!(
        service.remaining_hold_time(first.id).await,
        Err(ServiceError::ReservationNotFound)
    ));
}

#[tokio::test]
async fn attaching_contact_after_expiry_deletes_the_hold() {
    let (service, clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let wanted = seats(&["A01", "A02"]);
    let reservation = service.select_seats(event.id, &wanted).await.unwrap();

    clock.advance(Duration::minutes(16));

    assert!(matches!(
        service
            .attach_contact(reservation.id, "ada@example.com", "Ada", "Lovelace")
            .await,
        Err(ServiceError::ReservationExpired)
    ));

    // Every seat the expired hold had is claimable again.
    service.select_seats(event.id, &wanted).await.unwrap();
}

#[tokio::test]
async fn attach_contact_is_idempotent_and_never_duplicates_clients() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let reservation = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();

    let first = service
        .attach_contact(reservation.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();
    assert!(first.is_unpaid());
    let client_id = first.client_id.unwrap();

    let second = service
        .attach_contact(reservation.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();
    assert!(second.is_unpaid());
    assert_eq!(second.client_id, Some(client_id));

    let client = service
        .store()
        .find_client_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.id, client_id);

    // Name fields are mutable and update in place under the same email.
    service
        .attach_contact(reservation.id, "ada@example.com", "Augusta Ada", "King")
        .await
        .unwrap();
    let client = service
        .store()
        .find_client_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.id, client_id);
    assert_eq!(client.first_name, "Augusta Ada");
}

#[tokio::test]
async fn paid_reservation_is_terminal() {
    let (service, clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let reservation = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();

    service
        .attach_contact(reservation.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();
    let paid = service.confirm_payment(reservation.id).await.unwrap();
    assert!(paid.is_paid());

    // Paying twice is harmless.
    assert!(service.confirm_payment(reservation.id).await.unwrap().is_paid());

    // Cancellation is refused and the seats stay linked.
    assert_eq!(
        service.cancel(reservation.id).await.unwrap(),
        CancelOutcome::AlreadyPaid
    );

    // The sweep never touches a paid reservation.
    clock.advance(Duration::minutes(20));
    assert!(matches!(
        service.select_seats(event.id, &seats(&["A01"])).await,
        Err(ServiceError::SeatsUnavailable { .. })
    ));
}

#[tokio::test]
async fn cancel_releases_every_seat() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let wanted = seats(&["A01", "A02"]);
    let reservation = service.select_seats(event.id, &wanted).await.unwrap();

    assert_eq!(
        service.cancel(reservation.id).await.unwrap(),
        CancelOutcome::Canceled
    );
    service.select_seats(event.id, &wanted).await.unwrap();
}

#[tokio::test]
async fn details_list_seats_with_prices_and_total() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let reservation = service
        .select_seats(event.id, &seats(&["V01", "A01"]))
        .await
        .unwrap();

    let (found, held, total) = service.reservation_details(reservation.id).await.unwrap();
    assert_eq!(found.id, reservation.id);
    assert_eq!(total, BigDecimal::from(140));

    let identifiers: Vec<&str> = held.iter().map(|s| s.seat_identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["A01", "V01"]);
    assert_eq!(held[0].tier, "Standard");
    assert_eq!(held[1].tier, "VIP");
}

#[tokio::test]
async fn lookup_prefers_reservation_and_falls_back_to_email() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;
    let reservation = service
        .select_seats(event.id, &seats(&["A01"]))
        .await
        .unwrap();
    let reservation = service
        .attach_contact(reservation.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();

    assert_eq!(
        service
            .find_reservation_or_client(Some(reservation.id), "ignored@example.com")
            .await
            .unwrap(),
        LookupTarget::Reservation { id: reservation.id }
    );

    assert_eq!(
        service
            .find_reservation_or_client(None, "ada@example.com")
            .await
            .unwrap(),
        LookupTarget::Client {
            id: reservation.client_id.unwrap()
        }
    );

    assert!(matches!(
        service
            .find_reservation_or_client(None, "nobody@example.com")
            .await,
        Err(ServiceError::UnknownClientEmail(_))
    ));

    assert!(matches!(
        service
            .find_reservation_or_client(Some(uuid::Uuid::new_v4()), "ada@example.com")
            .await,
        Err(ServiceError::ReservationNotFound)
    ));
}

#[tokio::test]
async fn client_history_is_ordered_and_flags_active_events() {
    let (service, _clock) = service();
    let past_event = seed_event(&service, start_time() - Duration::days(1)).await;
    let future_event = seed_event(&service, start_time() + Duration::days(30)).await;

    let past = service
        .select_seats(past_event.id, &seats(&["A01"]))
        .await
        .unwrap();
    let past = service
        .attach_contact(past.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();
    service.confirm_payment(past.id).await.unwrap();

    let upcoming = service
        .select_seats(future_event.id, &seats(&["A01"]))
        .await
        .unwrap();
    let upcoming = service
        .attach_contact(upcoming.id, "ada@example.com", "Ada", "Lovelace")
        .await
        .unwrap();

    let client_id = upcoming.client_id.unwrap();
    let history = service.list_client_reservations(client_id).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reservation_id, upcoming.id);
    assert!(history[0].active);
    assert_eq!(history[1].reservation_id, past.id);
    assert!(!history[1].active);
}

#[tokio::test]
async fn seating_plan_groups_tiers_and_tracks_free_seats() {
    let (service, clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;

    let plan = service.seating_plan(event.id).await.unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].tier, "VIP");
    assert_eq!(plan[0].free, 12);
    assert_eq!(plan[0].rows.len(), 2);
    assert_eq!(plan[0].rows[0].len(), 10);
    assert_eq!(plan[0].rows[1].len(), 2);
    assert_eq!(plan[1].tier, "Standard");
    assert_eq!(plan[1].free, 5);

    service
        .select_seats(event.id, &seats(&["V01"]))
        .await
        .unwrap();
    let plan = service.seating_plan(event.id).await.unwrap();
    assert_eq!(plan[0].free, 11);
    assert!(!plan[0].rows[0][0].free);

    // An abandoned hold shows up as free again once the plan is re-read
    // after the hold duration.
    clock.advance(Duration::minutes(16));
    let plan = service.seating_plan(event.id).await.unwrap();
    assert_eq!(plan[0].free, 12);
}

#[tokio::test]
async fn selection_rejects_bad_input() {
    let (service, _clock) = service();
    let event = seed_event(&service, start_time() + Duration::days(30)).await;

    assert!(matches!(
        service.select_seats(event.id, &[]).await,
        Err(ServiceError::EmptySeatSelection)
    ));

    assert!(matches!(
        service.select_seats(uuid::Uuid::new_v4(), &seats(&["A01"])).await,
        Err(ServiceError::EventNotFound)
    ));

    match service
        .select_seats(event.id, &seats(&["A01", "Z99"]))
        .await
        .unwrap_err()
    {
        ServiceError::SeatsUnavailable { seats } => {
            assert_eq!(seats, vec!["Z99".to_string()]);
        }
        other => panic!("expected SeatsUnavailable, got {other:?}"),
    }
}
