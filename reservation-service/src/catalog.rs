use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::models::{Ticket, TicketTier};

/// Seats per presentation row on the selection screen.
pub const ROW_LENGTH: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SeatView {
    pub seat_identifier: String,
    pub free: bool,
}

/// One price tier of an event, seats chunked into rows for display.
#[derive(Debug, Serialize)]
pub struct TierSeating {
    pub tier: String,
    pub price: BigDecimal,
    pub free: usize,
    pub rows: Vec<Vec<SeatView>>,
}

/// Presentation grouping only; nothing here mutates state. Tiers arrive from
/// the store ordered by descending price with seats in identifier order.
pub fn seating_plan(seating: Vec<(TicketTier, Vec<Ticket>)>) -> Vec<TierSeating> {
    seating
        .into_iter()
        .map(|(tier, tickets)| {
            let free = tickets.iter().filter(|t| t.is_free()).count();
            TierSeating {
                tier: tier.name,
                price: tier.price,
                free,
                rows: chunk_rows(&tickets),
            }
        })
        .collect()
}

fn chunk_rows(tickets: &[Ticket]) -> Vec<Vec<SeatView>> {
    tickets
        .chunks(ROW_LENGTH)
        .map(|row| {
            row.iter()
                .map(|t| SeatView {
                    seat_identifier: t.seat_identifier.clone(),
                    free: t.is_free(),
                })
                .collect()
        })
        .collect()
}
