use std::collections::HashMap;

// Source: GET /v1/cryptocurrency/listings/latest
#[derive(Debug, serde::Deserialize)]
pub struct ListingsResponse {
    pub data: Vec<Listing>,
}

#[derive(Debug, serde::Deserialize)]
pub struct Listing {
    pub symbol: String, // e.g. "BTC"
    pub name: String,   // e.g. "Bitcoin"
    pub quote: HashMap<String, Quote>, // keyed by convert currency, "USD"
    // we ignore the other fields for now
}

#[derive(Debug, serde::Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub price: Option<f64>,
}
