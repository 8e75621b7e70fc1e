//! Tour catalog model and an in-memory catalog.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::CatalogService;
use crate::error::CollaboratorError;

/// A bookable tour package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration: String,
    pub price: Decimal,
    pub currency: String,
    pub includes: Vec<String>,
    pub location: String,
    pub availability: String,
    pub tags: Vec<String>,
}

impl Tour {
    /// Case-insensitive match against name, description, location and tags.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [&self.name, &self.description, &self.location]
            .into_iter()
            .chain(self.tags.iter())
            .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Detail view of a tour, as sent in chat.
pub fn format_tour(tour: &Tour) -> String {
    let includes = tour
        .includes
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "*{name}*\n\n\
         {description}\n\n\
         📅 *Duración:* {duration}\n\
         📍 *Ubicación:* {location}\n\
         💰 *Precio:* ${price} {currency}\n\
         📅 *Disponibilidad:* {availability}\n\n\
         ✅ *Incluye:*\n{includes}\n\n\
         🔍 *ID del tour:* {id}\n\n\
         Para reservar este tour, responde con 'reservar {id}'",
        name = tour.name,
        description = tour.description,
        duration = tour.duration,
        location = tour.location,
        price = tour.price,
        currency = tour.currency,
        availability = tour.availability,
        includes = includes,
        id = tour.id,
    )
}

/// Catalog held in memory, for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tours: Vec<Tour>,
}

impl InMemoryCatalog {
    pub fn new(tours: Vec<Tour>) -> Self {
        Self { tours }
    }

    /// The five packages the service launched with.
    pub fn seeded() -> Self {
        Self::new(vec![
            tour(
                "T001",
                "Tour por Cancún",
                "Disfruta de las hermosas playas de Cancún con este paquete todo incluido.",
                "7 días / 6 noches",
                dec!(12500),
                &["Hotel 5 estrellas", "Desayunos", "Traslados", "Tour a Chichen Itzá"],
                "Cancún, México",
                &["playa", "caribe", "méxico", "cancún", "todo incluido"],
            ),
            tour(
                "T002",
                "Aventura en Los Cabos",
                "Experimenta la emoción de Los Cabos con actividades acuáticas y paisajes impresionantes.",
                "5 días / 4 noches",
                dec!(9800),
                &["Hotel 4 estrellas", "Desayunos", "Tour en catamarán", "Snorkel"],
                "Los Cabos, México",
                &["playa", "pacífico", "méxico", "los cabos", "aventura"],
            ),
            tour(
                "T003",
                "Ciudad de México Cultural",
                "Conoce la riqueza cultural e histórica de la Ciudad de México.",
                "4 días / 3 noches",
                dec!(5600),
                &["Hotel céntrico", "Desayunos", "Tour por el Centro Histórico", "Visita a Teotihuacán"],
                "Ciudad de México, México",
                &["ciudad", "cultura", "méxico", "cdmx", "historia", "arqueología"],
            ),
            tour(
                "T004",
                "Maravillas de Oaxaca",
                "Descubre la magia, tradiciones y gastronomía de Oaxaca.",
                "6 días / 5 noches",
                dec!(7800),
                &["Hotel boutique", "Desayunos", "Tour gastronómico", "Visita a Monte Albán"],
                "Oaxaca, México",
                &["cultura", "gastronomía", "méxico", "oaxaca", "artesanías"],
            ),
            tour(
                "T005",
                "Riviera Maya Todo Incluido",
                "Relájate en las paradisíacas playas de la Riviera Maya con todo incluido.",
                "7 días / 6 noches",
                dec!(15200),
                &["Resort 5 estrellas", "Todo incluido", "Acceso a parques Xcaret", "Cenotes"],
                "Riviera Maya, México",
                &["playa", "caribe", "méxico", "riviera maya", "todo incluido", "xcaret"],
            ),
        ])
    }
}

#[allow(clippy::too_many_arguments)]
fn tour(
    id: &str,
    name: &str,
    description: &str,
    duration: &str,
    price: Decimal,
    includes: &[&str],
    location: &str,
    tags: &[&str],
) -> Tour {
    Tour {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        duration: duration.into(),
        price,
        currency: "MXN".into(),
        includes: includes.iter().map(|s| s.to_string()).collect(),
        location: location.into(),
        availability: "Todo el año".into(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn list_all(&self) -> Result<Vec<Tour>, CollaboratorError> {
        Ok(self.tours.clone())
    }

    async fn search(&self, query: &str) -> Result<Vec<Tour>, CollaboratorError> {
        Ok(self.tours.iter().filter(|t| t.matches(query)).cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Tour>, CollaboratorError> {
        Ok(self.tours.iter().find(|t| t.id.eq_ignore_ascii_case(id)).cloned())
    }
}
