// Source: GET /data/top/totalvolfull
#[derive(Debug, serde::Deserialize)]
pub struct TopVolumeResponse {
    // "Error" when the API key or parameters are refused; Data is then empty
    #[serde(rename = "Response", default)]
    pub response: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: Vec<TopVolumeItem>,
}

#[derive(Debug, serde::Deserialize)]
pub struct TopVolumeItem {
    #[serde(rename = "CoinInfo")]
    pub coin_info: CoinInfo,
    // RAW/DISPLAY market blocks are ignored
}

#[derive(Debug, serde::Deserialize)]
pub struct CoinInfo {
    #[serde(rename = "Name")]
    pub name: String, // ticker, e.g. "BTC"
    #[serde(rename = "FullName", default)]
    pub full_name: String, // e.g. "Bitcoin"
}
