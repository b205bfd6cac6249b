use crate::models::Stock;
use crate::AppState;

use super::quotes::QuoteError;

/// Markets probed, in order, when a symbol comes without a market prefix.
pub const MARKETS: [&str; 5] = ["FR", "AM", "US", "US2", "W"];

/// Splits `FR:RNO` into `("FR", "RNO")`; a bare short code gets no market.
pub fn split_symbol(symbol: &str) -> (Option<String>, String) {
    let upper = symbol.trim().to_uppercase();
    match upper.split_once(':') {
        Some((market, short)) => (Some(market.to_string()), short.to_string()),
        None => (None, upper),
    }
}

/// Fetches an existing stock, or creates it from the quote source on first
/// successful lookup (name, price and currency).
pub async fn get_or_create(state: &AppState, market: &str, short: &str) -> Result<Stock, String> {
    if let Some(mut stock) = state.store.stock_by_symbol(market, short).await? {
        // backfill a currency we never managed to observe
        if stock.currency.is_empty() {
            if let Ok(quote) = state.quotes.fetch(market, short).await {
                stock.value = quote.value;
                stock.currency = quote.currency;
                state.store.save_stock(&stock).await?;
            }
        }
        return Ok(stock);
    }

    let name = state
        .quotes
        .lookup_name(market, short)
        .await
        .map_err(|e| match e {
            QuoteError::NotFound => format!("No \"{short}\" on {market} market !"),
            other => other.to_string(),
        })?;

    let mut stock = Stock::new(market, short);
    stock.name = name;
    if let Ok(quote) = state.quotes.fetch(market, short).await {
        stock.value = quote.value;
        stock.currency = quote.currency;
    }
    state.store.save_stock(&stock).await?;
    tracing::info!("created stock {}", stock.label());
    Ok(stock)
}

/// Resolves a user-supplied symbol: `MARKET:SHORT`, or a bare short code
/// probed across every known market.
pub async fn resolve(state: &AppState, symbol: &str) -> Result<Stock, String> {
    let (market, short) = split_symbol(symbol);
    if short.is_empty() {
        return Err("No stock provided !".to_string());
    }

    match market {
        Some(market) => get_or_create(state, &market, &short).await,
        None => {
            for market in MARKETS {
                if let Ok(stock) = get_or_create(state, market, &short).await {
                    return Ok(stock);
                }
            }
            Err(format!("Could not find stock \"{}\".", short.to_lowercase()))
        }
    }
}
