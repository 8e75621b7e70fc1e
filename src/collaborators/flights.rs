//! Flight search request, offer model and chat formatting.
//!
//! The offer model mirrors the provider's JSON (camelCase keys, prices as
//! decimal strings) so a real client can deserialize responses directly.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::FlightSearchService;
use crate::error::CollaboratorError;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?$").expect("valid duration regex")
});

/// A flight search extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightQuery {
    /// Upper-case IATA code.
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl FlightQuery {
    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    pub price: OfferPrice,
    pub itineraries: Vec<Itinerary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPrice {
    pub total: Decimal,
    pub currency: String,
}

/// One direction of travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    /// ISO-8601 duration, e.g. `PT2H30M`.
    pub duration: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub departure: Endpoint,
    pub arrival: Endpoint,
    pub carrier_code: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub iata_code: String,
    /// Local time, `YYYY-MM-DDTHH:MM:SS`.
    pub at: String,
}

/// Render an offer for chat: price, then each itinerary with its segments.
pub fn format_offer(offer: &FlightOffer) -> String {
    let mut out = format!(
        "*Vuelo encontrado*\n\n💰 *Precio:* {} {}\n",
        offer.price.total, offer.price.currency
    );

    for (i, itinerary) in offer.itineraries.iter().enumerate() {
        let label = if i == 0 { "Vuelo de ida" } else { "Vuelo de regreso" };
        out.push_str(&format!(
            "\n*{label}* ✈️\n⏱️ *Duración:* {}\n",
            format_duration(&itinerary.duration)
        ));
        for (n, segment) in itinerary.segments.iter().enumerate() {
            out.push_str(&format!(
                "\n*Segmento {}:*\n🛫 Salida: {} - {}\n🛬 Llegada: {} - {}\n✈️ Vuelo: {} {}\n",
                n + 1,
                segment.departure.iata_code,
                format_datetime(&segment.departure.at),
                segment.arrival.iata_code,
                format_datetime(&segment.arrival.at),
                segment.carrier_code,
                segment.number,
            ));
        }
    }
    out.push_str("\nPara reservar este vuelo, por favor contacta a nuestro equipo de ventas.");
    out
}

/// `PT2H30M` → `2h 30m`. Unrecognized input is returned unchanged.
pub fn format_duration(iso: &str) -> String {
    let Some(caps) = ISO_DURATION.captures(iso) else {
        return iso.to_string();
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    format!("{}h {}m", part(1), part(2))
}

/// `2025-05-15T08:30:00` → `15/05/2025 08:30`. Unrecognized input is
/// returned unchanged.
pub fn format_datetime(at: &str) -> String {
    NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| DateTime::parse_from_rfc3339(at).map(|dt| dt.naive_local()))
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|_| at.to_string())
}

/// Flight search with no provider behind it. Every lookup fails, so the
/// dispatcher always serves the deep-link fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredFlightSearch;

#[async_trait]
impl FlightSearchService for UnconfiguredFlightSearch {
    async fn search(&self, _query: &FlightQuery) -> Result<Vec<FlightOffer>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "flight search".into(),
        })
    }
}
