// src/market.rs
//! Market classification for a ticker symbol.
//!
//! - six digits, all numeric (`600519`) -> domestic A-share, CNY
//! - `.HK` suffix or four/five numeric digits (`0700.HK`, `00700`) -> Hong Kong, HKD
//! - anything else -> US listing, USD

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Market {
    Domestic,
    AltMarket,
    PrimaryMarket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
}

impl Market {
    pub fn classify(symbol: &str) -> Market {
        let s = symbol.trim().to_ascii_uppercase();
        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            return Market::Domestic;
        }
        if s.ends_with(".HK") {
            return Market::AltMarket;
        }
        if (4..=5).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit()) {
            return Market::AltMarket;
        }
        Market::PrimaryMarket
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Market::Domestic => "China A-share",
            Market::AltMarket => "Hong Kong",
            Market::PrimaryMarket => "US",
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            Market::Domestic => Currency {
                code: "CNY",
                symbol: "¥",
            },
            Market::AltMarket => Currency {
                code: "HKD",
                symbol: "HK$",
            },
            Market::PrimaryMarket => Currency {
                code: "USD",
                symbol: "$",
            },
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
