//! Interfaces to the systems the engine consults but does not own.
//!
//! - [`CatalogService`]: the searchable set of tour packages
//! - [`FlightSearchService`]: the flight-offer provider
//! - [`OutboundSender`]: delivery of replies over a channel

pub mod catalog;
pub mod flights;

use async_trait::async_trait;

use crate::conversation::model::SenderId;
use crate::error::{ChannelError, CollaboratorError};

pub use catalog::{InMemoryCatalog, Tour};
pub use flights::{FlightOffer, FlightQuery, UnconfiguredFlightSearch};

/// Read access to the tour catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Every tour in the catalog.
    async fn list_all(&self) -> Result<Vec<Tour>, CollaboratorError>;

    /// Tours matching a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<Tour>, CollaboratorError>;

    /// Look up one tour by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Tour>, CollaboratorError>;

    /// Detail view of a tour.
    fn format(&self, tour: &Tour) -> String {
        catalog::format_tour(tour)
    }
}

/// Flight-offer lookup.
#[async_trait]
pub trait FlightSearchService: Send + Sync {
    /// Offers for the query, best first. May fail with a provider error.
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, CollaboratorError>;

    /// Chat-ready rendering of one offer.
    fn format_offer(&self, offer: &FlightOffer) -> String {
        flights::format_offer(offer)
    }
}

/// Delivers a reply to a sender. The engine does not wait on delivery.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, sender: &SenderId, text: &str) -> Result<(), ChannelError>;
}
