/// Gold, silver, platinum and palladium quoted in US dollars
pub const DEFAULT_INSTRUMENTS: [&str; 4] = ["xauusd", "xagusd", "xptusd", "xpdusd"];

pub fn default_instruments() -> Vec<String> {
    DEFAULT_INSTRUMENTS.iter().map(|s| s.to_string()).collect()
}

/// Instrument names are a 3-letter metal code followed by a 3-letter quote currency
pub fn is_valid_instrument(instrument: &str) -> bool {
    instrument.len() == 6 && instrument.chars().all(|c| c.is_ascii_alphabetic())
}

/// Upper-cased metal code, e.g. `XAU` for `xauusd`
pub fn metal_code(instrument: &str) -> Option<String> {
    if !is_valid_instrument(instrument) {
        return None;
    }
    Some(instrument[..3].to_ascii_uppercase())
}

/// Upper-cased quote currency, e.g. `USD` for `xauusd`
pub fn quote_currency(instrument: &str) -> Option<String> {
    if !is_valid_instrument(instrument) {
        return None;
    }
    Some(instrument[3..].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_validation() {
        assert!(is_valid_instrument("xauusd"));
        assert!(is_valid_instrument("XPDEUR"));
        assert!(!is_valid_instrument("xau"));
        assert!(!is_valid_instrument("xau-usd"));
        assert!(!is_valid_instrument("xauus1"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(metal_code("xagusd").as_deref(), Some("XAG"));
        assert_eq!(quote_currency("xagusd").as_deref(), Some("USD"));
        assert_eq!(metal_code("bad"), None);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(default_instruments().len(), 4);
        assert!(DEFAULT_INSTRUMENTS.iter().all(|i| is_valid_instrument(i)));
    }
}
