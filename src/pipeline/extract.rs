//! Structured parameters pulled out of free text.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::collaborators::FlightQuery;
use crate::pipeline::rules::CATALOG_KEYWORDS;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Flight shapes, round trips first. Groups: origin, destination,
/// departure, optional return.
static FLIGHT_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    const CODE: &str = r"\b([a-z]{3})\b";
    const DATE: &str = r"(\d{4}-\d{2}-\d{2})";
    [
        format!(r"\bde\s+{CODE}\s+a\s+{CODE}\s+del\s+{DATE}\s+al\s+{DATE}"),
        format!(r"{CODE}\s+a\s+{CODE}\s+{DATE}\s+al\s+{DATE}"),
        format!(r"\bde\s+{CODE}\s+a\s+{CODE}\s+(?:(?:el|del)\s+)?{DATE}"),
        format!(r"{CODE}\s+a\s+{CODE}\s+{DATE}"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid flight regex"))
    .collect()
});

/// Try each flight shape against the lowercased body.
///
/// A shape whose dates are not real calendar dates does not count as a
/// match and the next shape is tried.
pub fn extract_flight_query(lowered: &str) -> Option<FlightQuery> {
    FLIGHT_SHAPES
        .iter()
        .filter_map(|shape| shape.captures(lowered))
        .find_map(|caps| flight_from_captures(&caps))
}

fn flight_from_captures(caps: &Captures<'_>) -> Option<FlightQuery> {
    let departure = NaiveDate::parse_from_str(&caps[3], DATE_FORMAT).ok()?;
    let return_date = match caps.get(4) {
        Some(m) => Some(NaiveDate::parse_from_str(m.as_str(), DATE_FORMAT).ok()?),
        None => None,
    };
    Some(FlightQuery {
        origin: caps[1].to_uppercase(),
        destination: caps[2].to_uppercase(),
        departure,
        return_date,
    })
}

/// Search URL pre-filled with the query's parameters.
pub fn deep_link(base: &str, query: &FlightQuery) -> String {
    let mut url = format!(
        "{base}?origin={}&destination={}&departure={}",
        query.origin,
        query.destination,
        query.departure.format(DATE_FORMAT),
    );
    if let Some(ret) = query.return_date {
        url.push_str(&format!("&return={}", ret.format(DATE_FORMAT)));
    }
    url.push_str(&format!("&roundtrip={}", query.is_round_trip()));
    url
}

/// What a catalog message asks for once the catalog keywords are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRequest {
    /// `detalle <id>`; `None` when no id followed.
    Detail(Option<String>),
    Search(String),
    /// Nothing left to search for.
    Prompt,
}

/// Strip catalog keywords from a lowercased body and interpret the rest.
pub fn parse_catalog_request(lowered: &str) -> CatalogRequest {
    let mut keywords = CATALOG_KEYWORDS.to_vec();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut remainder = lowered.to_string();
    for keyword in keywords {
        remainder = remainder.replace(keyword, " ");
    }
    let tokens: Vec<&str> = remainder.split_whitespace().collect();

    match tokens.as_slice() {
        [] => CatalogRequest::Prompt,
        [first, ..] if first.starts_with("detalle") => {
            let id = (tokens.len() > 1).then(|| tokens[tokens.len() - 1].to_uppercase());
            CatalogRequest::Detail(id)
        }
        _ => CatalogRequest::Search(tokens.join(" ")),
    }
}
