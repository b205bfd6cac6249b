use chrono::Utc;

use crate::models::{Alert, Direction, Holding};
use crate::transport;
use crate::AppState;

use super::{quotes, stocks};

const HELP: &str = "s STOCK PERCENT [WINDOW] : subscribe to a stock's variations
u STOCK : unsubscribe
g STOCK : get the current quote
l (or ls) : list your subscriptions
v STOCK [NB [COST]] : value your holdings (NB <= 0 forgets)
pause [DAYS] : stop alerts for DAYS days (default 1)
resume : alerts again
url / nourl : include quote page links in alerts, or not
me : who the engine thinks you are
forgetme : delete everything about you
ping / uptime / version / quit";

/// Entry point for one inbound chat line. Every reply goes back to `from`
/// through the outbound queue.
pub async fn handle_line(state: &AppState, from: &str, text: &str) {
    let line = text.trim().to_lowercase();
    if line.is_empty() {
        return;
    }

    // our own fallback reply coming back at us would loop forever
    if line.starts_with("what?") {
        tracing::warn!("{}: ignoring echoed fallback", from);
        return;
    }

    if let Err(err) = dispatch(state, from, &line).await {
        reply(state, from, format!("Error: {err}")).await;
    }
}

async fn dispatch(state: &AppState, from: &str, line: &str) -> Result<(), String> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c.strip_prefix('!').unwrap_or(c),
        None => return Ok(()),
    };
    let args: Vec<&str> = parts.collect();

    match cmd {
        "ping" => reply(state, from, format!("!pong {}", args.join(" "))).await,
        "help" => reply_chunked(state, from, HELP).await,
        "me" => {
            let contact = state.store.contact_by_address(from).await?;
            reply(
                state,
                from,
                format!("You are contact {} ({})", contact.id.to_hex(), contact.address),
            )
            .await;
        }
        "g" => get_quote(state, from, &args).await?,
        "s" => subscribe(state, from, &args).await?,
        "u" => unsubscribe(state, from, &args).await?,
        "l" | "ls" => list_alerts(state, from).await?,
        "v" => valuation(state, from, &args).await?,
        "pause" => pause(state, from, &args).await?,
        "resume" => resume(state, from).await?,
        "url" | "nourl" => set_url(state, from, cmd == "url").await?,
        "forgetme" => forget_me(state, from).await?,
        "uptime" => {
            let secs = (Utc::now().timestamp_millis() - state.started_at) / 1000;
            reply(state, from, format!("Uptime: {secs}s")).await;
        }
        "version" => reply(state, from, env!("CARGO_PKG_VERSION").to_string()).await,
        "quit" => {
            reply(state, from, "Bye bye!".to_string()).await;
            // give the farewell a moment to leave the queue
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            let _ = state.shutdown_tx.send(1).await;
        }
        _ => {
            reply(
                state,
                from,
                format!("WHAT? Type \"help\". You issued \"{line}\"."),
            )
            .await;
        }
    }
    Ok(())
}

async fn reply(state: &AppState, to: &str, text: String) {
    transport::notify(&state.chat.outbound_tx, to, text).await;
}

/// Long replies go out in chunks so the chat server does not cut them off.
async fn reply_chunked(state: &AppState, to: &str, text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    for chunk in lines.chunks(state.settings.lines_per_message) {
        reply(state, to, format!("\n{}", chunk.join("\n"))).await;
    }
}

async fn get_quote(state: &AppState, from: &str, args: &[&str]) -> Result<(), String> {
    let symbol = args.first().copied().unwrap_or("");
    let stock = stocks::resolve(state, symbol).await?;

    // prefer a live quote, fall back to the last stored value
    let (value, currency) = match state.quotes.fetch(&stock.market, &stock.short).await {
        Ok(q) => (q.value, q.currency),
        Err(_) => (stock.value, stock.currency.clone()),
    };

    reply(
        state,
        from,
        format!("Stock {} : {:.3} {}", stock.label(), value, currency),
    )
    .await;
    Ok(())
}

async fn subscribe(state: &AppState, from: &str, args: &[&str]) -> Result<(), String> {
    let symbol = args.first().copied().unwrap_or("");
    let stock = stocks::resolve(state, symbol).await?;
    let contact = state.store.contact_by_address(from).await?;

    let spec = args.get(1).copied().unwrap_or("");
    let (percent, direction) = parse_threshold(spec)?;

    let window_ms = match args.get(2) {
        Some(w) => parse_duration_ms(w)?,
        None => 0,
    };

    // one alert per contact and stock; a new subscription replaces it
    state
        .store
        .delete_alerts_for_pair(stock.id, contact.id)
        .await?;
    let alert = Alert::new(stock.id, contact.id, percent, direction, window_ms);
    state.store.save_alert(&alert).await?;
    state.registry.ensure_watching(state, &stock).await;

    reply(state, from, format!("Defined alert {}", alert.describe(&stock))).await;
    Ok(())
}

async fn unsubscribe(state: &AppState, from: &str, args: &[&str]) -> Result<(), String> {
    let symbol = args.first().copied().unwrap_or("");
    let stock = stocks::resolve(state, symbol).await?;
    let contact = state.store.contact_by_address(from).await?;
    state
        .store
        .delete_alerts_for_pair(stock.id, contact.id)
        .await?;
    reply(state, from, "Done !".to_string()).await;
    Ok(())
}

async fn list_alerts(state: &AppState, from: &str) -> Result<(), String> {
    let contact = state.store.contact_by_address(from).await?;
    let alerts = state.store.alerts_for_contact(contact.id).await?;

    let mut lines = Vec::new();
    for alert in alerts {
        match state.store.stock_by_id(alert.stock_id).await? {
            Some(stock) => lines.push(alert.describe(&stock)),
            None => {
                // subscription to a stock that was evicted underneath us
                tracing::info!("alert {}: stock missing, deleting", alert.id.to_hex());
                state.store.delete_alert(alert.id).await?;
            }
        }
    }

    if lines.is_empty() {
        reply(state, from, "You didn't subscribe to anything !".to_string()).await;
    } else {
        reply_chunked(state, from, &lines.join("\n")).await;
    }
    Ok(())
}

async fn valuation(state: &AppState, from: &str, args: &[&str]) -> Result<(), String> {
    let contact = state.store.contact_by_address(from).await?;

    // `v <stock>` alone is a query; the save/delete branch needs an
    // explicit share count
    if let (Some(symbol), Some(nb_arg)) = (args.first(), args.get(1)) {
        let stock = stocks::resolve(state, symbol).await?;
        let nb: i64 = nb_arg
            .parse()
            .map_err(|_| format!("Bad number \"{nb_arg}\" !"))?;

        if nb <= 0 {
            if let Some(h) = state.store.holding_for_pair(contact.id, stock.id).await? {
                state.store.delete_holding(h.id).await?;
            }
        } else {
            let cost: f64 = match args.get(2) {
                Some(c) => c
                    .parse()
                    .map_err(|_| format!("Bad cost \"{c}\" !"))?,
                None => 0.0,
            };
            let mut holding = match state.store.holding_for_pair(contact.id, stock.id).await? {
                Some(h) => h,
                None => Holding::new(contact.id, stock.id, 0, 0.0),
            };
            holding.shares = nb;
            holding.unit_cost = cost;
            state.store.save_holding(&holding).await?;
            reply(
                state,
                from,
                format!(
                    "Saved {} with {} x {:.2} = {:.2} {} [{}]",
                    stock.label(),
                    nb,
                    cost,
                    nb as f64 * cost,
                    stock.currency,
                    holding.id.to_hex()
                ),
            )
            .await;
        }
    }

    let holdings = state.store.holdings_for_contact(contact.id).await?;
    if holdings.is_empty() {
        reply(state, from, "You didn't register any stock value.".to_string()).await;
        return Ok(());
    }

    let mut lines = Vec::new();
    let mut total_cost = 0.0;
    let mut total_worth = 0.0;
    for holding in &holdings {
        let stock = match state.store.stock_by_id(holding.stock_id).await? {
            Some(s) => s,
            None => continue,
        };
        let cost = holding.cost();
        let worth = holding.worth(stock.value);
        total_cost += cost;
        total_worth += worth;
        let diff = worth - cost;
        let percent = if cost != 0.0 { diff / cost * 100.0 } else { 0.0 };
        lines.push(format!(
            "{}, {} shares, value: {:.3} / {:.3}, total: {:.3} - {:.3} = {:+.3} {} ({:+.2}%)",
            stock.label(),
            holding.shares,
            stock.value,
            holding.unit_cost,
            worth,
            cost,
            diff,
            stock.currency,
            percent
        ));
    }

    let total_diff = total_worth - total_cost;
    let total_percent = if total_cost != 0.0 {
        total_diff / total_cost * 100.0
    } else {
        0.0
    };
    lines.push(format!(
        "Total: {:.3} - {:.3} = {:+.3} EUR ({:+.2}%)",
        total_worth, total_cost, total_diff, total_percent
    ));

    reply_chunked(state, from, &lines.join("\n")).await;
    Ok(())
}

async fn pause(state: &AppState, from: &str, args: &[&str]) -> Result<(), String> {
    let days: i64 = match args.first() {
        Some(d) => d.parse().map_err(|_| format!("Bad number of days \"{d}\" !"))?,
        None => 1,
    };
    let mut contact = state.store.contact_by_address(from).await?;
    contact.pause_until = Utc::now().timestamp_millis() + days * 86_400_000;
    state.store.save_contact(&contact).await?;
    reply(state, from, format!("OK, no alert for {days} days.")).await;
    Ok(())
}

async fn resume(state: &AppState, from: &str) -> Result<(), String> {
    let mut contact = state.store.contact_by_address(from).await?;
    contact.pause_until = 0;
    state.store.save_contact(&contact).await?;
    reply(state, from, "OK, back to work !".to_string()).await;
    Ok(())
}

async fn set_url(state: &AppState, from: &str, show: bool) -> Result<(), String> {
    let mut contact = state.store.contact_by_address(from).await?;
    contact.show_url = show;
    state.store.save_contact(&contact).await?;
    reply(state, from, format!("OK (show_url={show})")).await;
    Ok(())
}

async fn forget_me(state: &AppState, from: &str) -> Result<(), String> {
    let contact = state.store.contact_by_address(from).await?;
    reply(state, from, "Who are you ?".to_string()).await;
    state.store.delete_contact(contact.id).await?;
    Ok(())
}

/// Parses `2`, `+2` or `-2.5%` into a positive threshold and a direction.
fn parse_threshold(spec: &str) -> Result<(f64, Direction), String> {
    let spec = spec.split('%').next().unwrap_or("");
    if spec.is_empty() {
        return Err("No percentage provided !".to_string());
    }
    let direction = match spec.as_bytes()[0] {
        b'+' => Direction::Up,
        b'-' => Direction::Down,
        _ => Direction::Both,
    };
    let percent: f64 = spec
        .parse()
        .map_err(|_| format!("Bad percentage \"{spec}\" !"))?;
    Ok((percent.abs(), direction))
}

/// Parses `30s`, `15m`, `4h` or `2d` into milliseconds.
fn parse_duration_ms(spec: &str) -> Result<i64, String> {
    let bad = || format!("Bad duration \"{spec}\" !");
    if spec.len() < 2 {
        return Err(bad());
    }
    let (number, unit) = spec.split_at(spec.len() - 1);
    let n: i64 = number.parse().map_err(|_| bad())?;
    let unit_ms = match unit {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(bad()),
    };
    Ok(n * unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_durations() {
        assert_eq!(parse_duration_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_ms("15m").unwrap(), 900_000);
        assert_eq!(parse_duration_ms("4h").unwrap(), 14_400_000);
        assert_eq!(parse_duration_ms("2d").unwrap(), 172_800_000);
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("5").is_err());
        assert!(parse_duration_ms("x5m").is_err());
        assert!(parse_duration_ms("5w").is_err());
    }

    #[test]
    fn threshold_sign_selects_direction() {
        assert_eq!(parse_threshold("2").unwrap(), (2.0, Direction::Both));
        assert_eq!(parse_threshold("+2").unwrap(), (2.0, Direction::Up));
        assert_eq!(parse_threshold("-2.5%").unwrap(), (2.5, Direction::Down));
        assert!(parse_threshold("").is_err());
        assert!(parse_threshold("abc").is_err());
    }
}
