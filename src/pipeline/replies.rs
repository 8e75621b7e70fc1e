//! Reply texts sent back to the sender.

use crate::collaborators::Tour;
use crate::conversation::model::MessageKind;

pub const GREETING: &str = "¡Hola! Gracias por contactarnos. Soy tu asistente de viajes y puedo ayudarte con:\n\
    - *tours*: ver todos nuestros paquetes\n\
    - *tour <destino>*: buscar paquetes por destino\n\
    - *vuelos*: buscar vuelos (ej. vuelos MEX a CUN 2025-05-15)\n\
    - *ayuda*: ver todos los comandos\n\
    ¿En qué puedo ayudarte hoy?";

pub const HELP: &str = "Estos son los comandos disponibles:\n\
    - *ayuda*: Muestra este mensaje\n\
    - *tours*: Lista todos los paquetes\n\
    - *tour <destino>*: Busca paquetes por destino o tema\n\
    - *tour detalle <ID>*: Muestra el detalle de un paquete\n\
    - *vuelos <ORIGEN> a <DESTINO> <AAAA-MM-DD>*: Busca vuelos\n\
    - *info*: Información sobre este servicio\n\
    - *contacto*: Datos de contacto";

pub const THANKS: &str = "¡De nada! Estamos para servirte. ¿Hay algo más en lo que pueda ayudarte?";

pub const INFO: &str = "Este es un servicio de mensajería automatizado.\n\
    Estamos en fase de desarrollo y pronto tendremos más funcionalidades.";

pub const CONTACT: &str = "Puedes contactarnos en:\n\
    - Email: contacto@ejemplo.com\n\
    - Teléfono: +1234567890\n\
    - Sitio web: www.ejemplo.com";

pub const CATALOG_PROMPT: &str = "¿Qué destino te interesa? Escribe por ejemplo *tour cancún* \
    o *tours* para ver todos nuestros paquetes.";

pub const CATALOG_EMPTY: &str = "Por el momento no tenemos paquetes disponibles.";

pub const CATALOG_UNAVAILABLE: &str = "No pude consultar nuestro catálogo en este momento. \
    Por favor intenta de nuevo más tarde.";

pub const DETAIL_NEEDS_ID: &str = "Indica el ID del tour, por ejemplo: *tour detalle T001*";

pub fn non_text_ack(kind: MessageKind) -> String {
    format!("Gracias por enviar un {kind}. Actualmente solo puedo procesar mensajes de texto.")
}

/// Default reply. Echoes the body as received, not lowercased.
pub fn echo(content: &str) -> String {
    format!("Recibí tu mensaje: '{content}'. ¿En qué más puedo ayudarte? Escribe *ayuda* para ver las opciones.")
}

/// One-paragraph summary used in listings and search results.
pub fn tour_summary(tour: &Tour) -> String {
    format!(
        "*{}*\n📍 {}\n💰 ${} {}\n🔍 ID: {}",
        tour.name, tour.location, tour.price, tour.currency, tour.id
    )
}

pub fn tour_listing(header: &str, tours: &[Tour]) -> String {
    let body = tours.iter().map(tour_summary).collect::<Vec<_>>().join("\n\n");
    format!("{header}\n\n{body}\n\nPara ver el detalle escribe *tour detalle <ID>*")
}

pub fn tour_not_found(id: &str) -> String {
    format!("No encontré ningún tour con el ID {id}. Escribe *tours* para ver la lista completa.")
}

pub fn search_not_found(query: &str) -> String {
    format!("No encontré paquetes para \"{query}\". Escribe *tours* para ver todos los disponibles.")
}

pub fn flight_usage(generic_link: &str) -> String {
    format!(
        "Para buscar vuelos escribe el origen, el destino y la fecha, por ejemplo:\n\
         - vuelos MEX a CUN 2025-05-15\n\
         - vuelos de MEX a CUN del 2025-05-15 al 2025-05-22\n\n\
         También puedes buscar directamente en: {generic_link}"
    )
}

pub fn flight_found(offer: &str, link: &str) -> String {
    format!("{offer}\nVer más opciones y reservar: {link}")
}

pub fn flight_fallback(link: &str) -> String {
    format!(
        "No pude consultar vuelos disponibles en este momento. \
         Puedes ver las opciones y reservar aquí: {link}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_names_the_kind() {
        assert_eq!(
            non_text_ack(MessageKind::Image),
            "Gracias por enviar un image. Actualmente solo puedo procesar mensajes de texto."
        );
    }

    #[test]
    fn echo_keeps_original_case() {
        assert!(echo("Quiero Reservar").starts_with("Recibí tu mensaje: 'Quiero Reservar'."));
    }
}
