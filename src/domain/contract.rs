//! Contract identifier helpers.

/// Placeholder month used for continuous instrument codes.
pub const CONTINUOUS_MONTH: &str = "9999";

/// Maps a dated contract to its continuous instrument code:
/// `CU2506.SHF` -> `CU9999.SHF`.
pub fn instrument_of(contract: &str) -> String {
    let (symbol, exchange) = match contract.split_once('.') {
        Some((symbol, exchange)) => (symbol, Some(exchange)),
        None => (contract, None),
    };
    let product: String = symbol.chars().filter(|c| !c.is_ascii_digit()).collect();
    match exchange {
        Some(exchange) => format!("{product}{CONTINUOUS_MONTH}.{exchange}"),
        None => format!("{product}{CONTINUOUS_MONTH}"),
    }
}
