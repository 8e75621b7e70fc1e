//! Keyword rules that classify a text message into an intent.
//!
//! Rules are evaluated in order and the first match wins. Matching is plain
//! substring containment on the lowercased body, with no word boundaries:
//! `"hola"` matches inside `"cholado"` and a bare `?` anywhere means help.

use tracing::debug;

/// What a text message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Help,
    CatalogListing,
    CatalogQuery,
    FlightQuery,
    Thanks,
    Info,
    Contact,
}

/// How a rule matches the lowercased body.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Any keyword appears anywhere in the body.
    Contains(&'static [&'static str]),
    /// The trimmed body equals the keyword.
    Exact(&'static str),
}

impl Trigger {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Trigger::Contains(keywords) => keywords.iter().any(|k| lowered.contains(k)),
            Trigger::Exact(keyword) => lowered.trim() == *keyword,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub trigger: Trigger,
}

pub const GREETING_KEYWORDS: &[&str] =
    &["hola", "buenos días", "buenas tardes", "buenas noches", "saludos"];
pub const HELP_KEYWORDS: &[&str] = &["ayuda", "help", "opciones", "comandos", "?"];
pub const CATALOG_KEYWORDS: &[&str] = &["tours", "tour", "paquetes", "paquete"];
pub const FLIGHT_KEYWORDS: &[&str] = &["vuelo", "volar", "boleto", "avión"];
pub const THANKS_KEYWORDS: &[&str] = &["gracias", "thanks", "thank you", "thx"];

/// Ordered rule list.
#[derive(Debug, Clone)]
pub struct IntentRules {
    rules: Vec<IntentRule>,
}

impl IntentRules {
    pub fn default_rules() -> Self {
        let rule = |intent, trigger| IntentRule { intent, trigger };
        Self {
            rules: vec![
                rule(Intent::Greeting, Trigger::Contains(GREETING_KEYWORDS)),
                rule(Intent::Help, Trigger::Contains(HELP_KEYWORDS)),
                rule(Intent::CatalogListing, Trigger::Exact("tours")),
                rule(Intent::CatalogQuery, Trigger::Contains(CATALOG_KEYWORDS)),
                rule(Intent::FlightQuery, Trigger::Contains(FLIGHT_KEYWORDS)),
                rule(Intent::Thanks, Trigger::Contains(THANKS_KEYWORDS)),
                rule(Intent::Info, Trigger::Contains(&["info"])),
                rule(Intent::Contact, Trigger::Contains(&["contacto"])),
            ],
        }
    }

    /// Custom rule list, evaluated in the given order.
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// First intent whose trigger matches, or `None` for the default reply.
    pub fn classify(&self, lowered: &str) -> Option<Intent> {
        let intent = self
            .rules
            .iter()
            .find(|r| r.trigger.matches(lowered))
            .map(|r| r.intent);
        debug!(?intent, "Classified message");
        intent
    }
}

impl Default for IntentRules {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<Intent> {
        IntentRules::default_rules().classify(&text.to_lowercase())
    }

    #[test]
    fn greeting_beats_help() {
        assert_eq!(classify("Hola, necesito ayuda"), Some(Intent::Greeting));
        assert_eq!(classify("ayuda por favor"), Some(Intent::Help));
    }

    #[test]
    fn bare_tours_lists_the_catalog() {
        assert_eq!(classify("tours"), Some(Intent::CatalogListing));
        assert_eq!(classify("  TOURS "), Some(Intent::CatalogListing));
        assert_eq!(classify("tours en oaxaca"), Some(Intent::CatalogQuery));
        assert_eq!(classify("paquete detalle t001"), Some(Intent::CatalogQuery));
    }

    #[test]
    fn question_mark_means_help() {
        assert_eq!(classify("tours?"), Some(Intent::Help));
        assert_eq!(classify("¿vuelos a cancún?"), Some(Intent::Help));
    }

    #[test]
    fn catalog_outranks_flights() {
        assert_eq!(classify("tour con vuelo incluido"), Some(Intent::CatalogQuery));
        assert_eq!(classify("vuelos MEX a CUN 2025-05-15"), Some(Intent::FlightQuery));
        assert_eq!(classify("quiero volar"), Some(Intent::FlightQuery));
    }

    #[test]
    fn matching_ignores_word_boundaries() {
        // "cholado" contains "hola"
        assert_eq!(classify("un cholado grande"), Some(Intent::Greeting));
        assert_eq!(classify("informes"), Some(Intent::Info));
    }

    #[test]
    fn tail_rules_and_default() {
        assert_eq!(classify("Muchas gracias"), Some(Intent::Thanks));
        assert_eq!(classify("thank you!"), Some(Intent::Thanks));
        assert_eq!(classify("info"), Some(Intent::Info));
        assert_eq!(classify("contacto"), Some(Intent::Contact));
        assert_eq!(classify("quiero reservar"), None);
    }
}
