//! Intent dispatch: turns a message into a reply text.
//!
//! Suppression is not decided here. The processor consults abuse control
//! first and only calls [`IntentDispatcher::respond`] when a reply may be sent.
//! Collaborator failures never escape: each becomes a fallback reply and a
//! warning in the log. Every collaborator call is bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::collaborators::{CatalogService, FlightSearchService, Tour};
use crate::config::DispatcherConfig;
use crate::conversation::model::{MessageKind, SenderId};
use crate::error::CollaboratorError;
use crate::pipeline::extract::{self, CatalogRequest};
use crate::pipeline::replies;
use crate::pipeline::rules::{Intent, IntentRules};

pub struct IntentDispatcher {
    rules: IntentRules,
    catalog: Arc<dyn CatalogService>,
    flights: Arc<dyn FlightSearchService>,
    config: DispatcherConfig,
}

impl IntentDispatcher {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        flights: Arc<dyn FlightSearchService>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            rules: IntentRules::default_rules(),
            catalog,
            flights,
            config,
        }
    }

    /// Replace the rule list.
    pub fn with_rules(mut self, rules: IntentRules) -> Self {
        self.rules = rules;
        self
    }

    /// Compute the reply for one message.
    pub async fn respond(&self, sender: &SenderId, kind: MessageKind, content: &str) -> String {
        if kind != MessageKind::Text {
            return replies::non_text_ack(kind);
        }

        let lowered = content.to_lowercase();
        let intent = self.rules.classify(&lowered);
        debug!(sender = %sender, ?intent, "Dispatching message");

        match intent {
            Some(Intent::Greeting) => replies::GREETING.to_string(),
            Some(Intent::Help) => replies::HELP.to_string(),
            Some(Intent::CatalogListing) => self.list_catalog().await,
            Some(Intent::CatalogQuery) => self.query_catalog(&lowered).await,
            Some(Intent::FlightQuery) => self.query_flights(sender, &lowered).await,
            Some(Intent::Thanks) => replies::THANKS.to_string(),
            Some(Intent::Info) => replies::INFO.to_string(),
            Some(Intent::Contact) => replies::CONTACT.to_string(),
            None => replies::echo(content),
        }
    }

    // ── Catalog ─────────────────────────────────────────────────────

    async fn list_catalog(&self) -> String {
        match bounded(CATALOG, self.config.catalog_timeout, self.catalog.list_all()).await {
            Ok(tours) if tours.is_empty() => replies::CATALOG_EMPTY.to_string(),
            Ok(tours) => replies::tour_listing("Estos son nuestros paquetes disponibles:", &tours),
            Err(e) => catalog_failure("list_all", e),
        }
    }

    async fn query_catalog(&self, lowered: &str) -> String {
        match extract::parse_catalog_request(lowered) {
            CatalogRequest::Prompt => replies::CATALOG_PROMPT.to_string(),
            CatalogRequest::Detail(None) => replies::DETAIL_NEEDS_ID.to_string(),
            CatalogRequest::Detail(Some(id)) => match bounded(
                CATALOG,
                self.config.catalog_timeout,
                self.catalog.get_by_id(&id),
            )
            .await
            {
                Ok(Some(tour)) => self.catalog.format(&tour),
                Ok(None) => replies::tour_not_found(&id),
                Err(e) => catalog_failure("get_by_id", e),
            },
            CatalogRequest::Search(query) => match bounded(
                CATALOG,
                self.config.catalog_timeout,
                self.catalog.search(&query),
            )
            .await
            {
                Ok(tours) if tours.is_empty() => replies::search_not_found(&query),
                Ok(tours) => search_results(&query, &tours),
                Err(e) => catalog_failure("search", e),
            },
        }
    }

    // ── Flights ─────────────────────────────────────────────────────

    async fn query_flights(&self, sender: &SenderId, lowered: &str) -> String {
        let base = &self.config.flight_search_url;
        let Some(query) = extract::extract_flight_query(lowered) else {
            return replies::flight_usage(base);
        };
        let link = extract::deep_link(base, &query);

        let result = bounded(FLIGHTS, self.config.flight_timeout, self.flights.search(&query)).await;
        match result {
            Ok(offers) => match offers.first() {
                Some(offer) => replies::flight_found(&self.flights.format_offer(offer), &link),
                None => {
                    debug!(sender = %sender, origin = %query.origin, destination = %query.destination, "No flight offers");
                    replies::flight_fallback(&link)
                }
            },
            Err(e) => {
                warn!(sender = %sender, error = %e, "Flight search failed, serving deep link");
                replies::flight_fallback(&link)
            }
        }
    }
}

const CATALOG: &str = "catalog";
const FLIGHTS: &str = "flight search";

/// Run a collaborator call, turning an elapsed `limit` into `Timeout`.
async fn bounded<T>(
    service: &str,
    limit: Duration,
    call: impl Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, CollaboratorError> {
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(CollaboratorError::Timeout {
            service: service.to_string(),
            timeout: limit,
        })
    })
}

fn search_results(query: &str, tours: &[Tour]) -> String {
    let header = format!("Encontré {} paquete(s) para \"{query}\":", tours.len());
    replies::tour_listing(&header, tours)
}

fn catalog_failure(operation: &str, error: CollaboratorError) -> String {
    warn!(operation, error = %error, "Catalog lookup failed");
    replies::CATALOG_UNAVAILABLE.to_string()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::collaborators::flights::{Endpoint, Itinerary, OfferPrice, Segment};
    use crate::collaborators::{FlightOffer, FlightQuery, InMemoryCatalog, UnconfiguredFlightSearch};
    use crate::pipeline::rules::{IntentRule, Trigger};

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogService for BrokenCatalog {
        async fn list_all(&self) -> Result<Vec<Tour>, CollaboratorError> {
            Err(CollaboratorError::Unavailable { service: "catalog".into() })
        }
        async fn search(&self, _query: &str) -> Result<Vec<Tour>, CollaboratorError> {
            Err(CollaboratorError::Unavailable { service: "catalog".into() })
        }
        async fn get_by_id(&self, _id: &str) -> Result<Option<Tour>, CollaboratorError> {
            Err(CollaboratorError::Unavailable { service: "catalog".into() })
        }
    }

    struct StalledCatalog;

    #[async_trait]
    impl CatalogService for StalledCatalog {
        async fn list_all(&self) -> Result<Vec<Tour>, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![])
        }
        async fn search(&self, _query: &str) -> Result<Vec<Tour>, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![])
        }
        async fn get_by_id(&self, _id: &str) -> Result<Option<Tour>, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(None)
        }
    }

    /// Returns one fixed offer and records the query it saw.
    #[derive(Default)]
    struct FixedFlights {
        seen: std::sync::Mutex<Vec<FlightQuery>>,
    }

    #[async_trait]
    impl FlightSearchService for FixedFlights {
        async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, CollaboratorError> {
            self.seen.lock().unwrap().push(query.clone());
            let endpoint = |code: &str, at: &str| Endpoint { iata_code: code.into(), at: at.into() };
            Ok(vec![FlightOffer {
                price: OfferPrice { total: dec!(2150.00), currency: "MXN".into() },
                itineraries: vec![Itinerary {
                    duration: "PT2H10M".into(),
                    segments: vec![Segment {
                        departure: endpoint("MEX", "2025-05-15T07:00:00"),
                        arrival: endpoint("CUN", "2025-05-15T09:10:00"),
                        carrier_code: "Y4".into(),
                        number: "310".into(),
                    }],
                }],
            }])
        }
    }

    struct EmptyFlights;

    #[async_trait]
    impl FlightSearchService for EmptyFlights {
        async fn search(&self, _query: &FlightQuery) -> Result<Vec<FlightOffer>, CollaboratorError> {
            Ok(vec![])
        }
    }

    struct StalledFlights;

    #[async_trait]
    impl FlightSearchService for StalledFlights {
        async fn search(&self, _query: &FlightQuery) -> Result<Vec<FlightOffer>, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![])
        }
    }

    fn dispatcher(flights: Arc<dyn FlightSearchService>) -> IntentDispatcher {
        IntentDispatcher::new(Arc::new(InMemoryCatalog::seeded()), flights, DispatcherConfig::default())
    }

    async fn reply(dispatcher: &IntentDispatcher, text: &str) -> String {
        dispatcher.respond(&SenderId::new("5215512345678"), MessageKind::Text, text).await
    }

    const ONE_WAY_LINK: &str =
        "https://vuelos.ejemplo.com/buscar?origin=MEX&destination=CUN&departure=2025-05-15&roundtrip=false";

    #[tokio::test]
    async fn non_text_is_acknowledged_without_dispatch() {
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch));
        let text = d.respond(&SenderId::new("1"), MessageKind::Audio, "media-id-hola").await;
        assert_eq!(text, replies::non_text_ack(MessageKind::Audio));
    }

    #[tokio::test]
    async fn static_replies_and_default_echo() {
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch));
        assert_eq!(reply(&d, "Buenas tardes").await, replies::GREETING);
        assert_eq!(reply(&d, "hola, ayuda").await, replies::GREETING);
        assert_eq!(reply(&d, "comandos").await, replies::HELP);
        assert_eq!(reply(&d, "Gracias!").await, replies::THANKS);
        assert_eq!(reply(&d, "contacto").await, replies::CONTACT);
        assert_eq!(reply(&d, "Quiero Reservar").await, replies::echo("Quiero Reservar"));
    }

    #[tokio::test]
    async fn catalog_listing_and_search() {
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch));

        let listing = reply(&d, "tours").await;
        for id in ["T001", "T002", "T003", "T004", "T005"] {
            assert!(listing.contains(id), "listing should include {id}");
        }

        let search = reply(&d, "tour oaxaca").await;
        assert!(search.contains("Maravillas de Oaxaca"));
        assert!(!search.contains("T001"));

        assert_eq!(reply(&d, "paquetes en marte").await, replies::search_not_found("en marte"));
        assert_eq!(reply(&d, "paquete").await, replies::CATALOG_PROMPT);
    }

    #[tokio::test]
    async fn catalog_detail_by_id() {
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch));
        let detail = reply(&d, "tour detalle t003").await;
        assert!(detail.starts_with("*Ciudad de México Cultural*"));
        assert_eq!(reply(&d, "tour detalle t999").await, replies::tour_not_found("T999"));
        assert_eq!(reply(&d, "tour detalle").await, replies::DETAIL_NEEDS_ID);
    }

    #[tokio::test]
    async fn catalog_failure_becomes_fallback() {
        let d = IntentDispatcher::new(
            Arc::new(BrokenCatalog),
            Arc::new(UnconfiguredFlightSearch),
            DispatcherConfig::default(),
        );
        assert_eq!(reply(&d, "tours").await, replies::CATALOG_UNAVAILABLE);
        assert_eq!(reply(&d, "tour cancún").await, replies::CATALOG_UNAVAILABLE);
        assert_eq!(reply(&d, "tour detalle t001").await, replies::CATALOG_UNAVAILABLE);
    }

    #[tokio::test]
    async fn flight_offer_comes_with_deep_link() {
        let flights = Arc::new(FixedFlights::default());
        let d = dispatcher(flights.clone());

        let text = reply(&d, "vuelos MEX a CUN 2025-05-15").await;
        assert!(text.contains("*Vuelo encontrado*"));
        assert!(text.contains("✈️ Vuelo: Y4 310"));
        assert!(text.ends_with(ONE_WAY_LINK));

        let seen = flights.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].origin, "MEX");
    }

    #[tokio::test]
    async fn flight_fallbacks_keep_the_deep_link() {
        let empty = dispatcher(Arc::new(EmptyFlights));
        assert_eq!(
            reply(&empty, "vuelos MEX a CUN 2025-05-15").await,
            replies::flight_fallback(ONE_WAY_LINK)
        );

        let failing = dispatcher(Arc::new(UnconfiguredFlightSearch));
        let text = reply(&failing, "vuelos de MEX a CUN del 2025-05-15 al 2025-05-22").await;
        assert!(text.contains("&return=2025-05-22&roundtrip=true"));
    }

    #[tokio::test]
    async fn stalled_flight_search_times_out() {
        let config = DispatcherConfig {
            flight_timeout: Duration::from_millis(50),
            ..DispatcherConfig::default()
        };
        let d = IntentDispatcher::new(
            Arc::new(InMemoryCatalog::seeded()),
            Arc::new(StalledFlights),
            config,
        );

        let started = std::time::Instant::now();
        let text = reply(&d, "vuelos MEX a CUN 2025-05-15").await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(text, replies::flight_fallback(ONE_WAY_LINK));
    }

    #[tokio::test]
    async fn stalled_catalog_times_out_into_fallback() {
        let config = DispatcherConfig {
            catalog_timeout: Duration::from_millis(50),
            ..DispatcherConfig::default()
        };
        let d = IntentDispatcher::new(Arc::new(StalledCatalog), Arc::new(UnconfiguredFlightSearch), config);

        for text in ["tours", "tour cancún", "tour detalle t001"] {
            let started = std::time::Instant::now();
            let answer = tokio::time::timeout(Duration::from_secs(2), reply(&d, text))
                .await
                .unwrap_or_else(|_| panic!("{text:?} was not bounded"));
            assert!(started.elapsed() < Duration::from_secs(2));
            assert_eq!(answer, replies::CATALOG_UNAVAILABLE, "{text:?}");
        }
    }

    #[tokio::test]
    async fn bounded_reports_the_service_and_limit() {
        let limit = Duration::from_millis(10);
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, CollaboratorError>(())
        };
        match bounded(CATALOG, limit, slow).await {
            Err(CollaboratorError::Timeout { service, timeout }) => {
                assert_eq!(service, "catalog");
                assert_eq!(timeout, limit);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(bounded(CATALOG, limit, async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn custom_rules_replace_the_defaults() {
        static GRACIAS: &[&str] = &["gracias"];
        let rules = IntentRules::new(vec![
            IntentRule { intent: Intent::Contact, trigger: Trigger::Exact("asesor") },
            IntentRule { intent: Intent::Thanks, trigger: Trigger::Contains(GRACIAS) },
        ]);
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch)).with_rules(rules);

        assert_eq!(reply(&d, "Asesor").await, replies::CONTACT);
        assert_eq!(reply(&d, "muchas gracias").await, replies::THANKS);
        // Greeting is no longer a rule, so it falls through to the echo
        assert_eq!(reply(&d, "hola").await, replies::echo("hola"));
    }

    #[tokio::test]
    async fn unparseable_flight_request_gets_usage() {
        let d = dispatcher(Arc::new(UnconfiguredFlightSearch));
        assert_eq!(
            reply(&d, "quiero un boleto barato").await,
            replies::flight_usage("https://vuelos.ejemplo.com/buscar")
        );
    }
}
