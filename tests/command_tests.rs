mod common;

use followstock::config::Settings;
use followstock::models::{Direction, Stock};
use followstock::services::commands;

const FROM: &str = "x@y.z/phone";

#[tokio::test]
async fn ping_answers_pong_with_the_payload() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "ping hello").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.to, FROM);
    assert_eq!(msg.text, "!pong hello");
}

#[tokio::test]
async fn unknown_commands_get_the_fallback_reply() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "!frobnicate").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "WHAT? Type \"help\". You issued \"!frobnicate\".");
}

#[tokio::test]
async fn the_fallback_reply_is_never_answered() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "WHAT? Type \"help\". You issued \"x\".").await;
    assert!(h.outbound.try_recv().is_err());
}

#[tokio::test]
async fn me_reports_the_bare_address() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "me").await;
    let msg = h.outbound.try_recv().unwrap();
    assert!(msg.text.starts_with("You are contact "));
    assert!(msg.text.ends_with("(x@y.z)"));
}

#[tokio::test]
async fn subscribing_twice_replaces_the_alert() {
    let mut h = common::harness(Settings::default());
    h.quotes.set_name("FR:RNO", "RENAULT");
    h.quotes.enqueue_price("FR:RNO", 10.0);

    commands::handle_line(&h.state, FROM, "s fr:rno 2").await;
    let msg = h.outbound.try_recv().unwrap();
    assert!(
        msg.text.starts_with("Defined alert \"RENAULT\" (FR:RNO) ~2.00%"),
        "unexpected reply: {}",
        msg.text
    );

    commands::handle_line(&h.state, FROM, "s fr:rno +5 2h").await;
    let msg = h.outbound.try_recv().unwrap();
    assert!(
        msg.text.contains("+5.00% on 7200s"),
        "unexpected reply: {}",
        msg.text
    );

    let contact = h.state.store.contact_by_address(FROM).await.unwrap();
    let alerts = h.state.store.alerts_for_contact(contact.id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].direction, Direction::Up);
    assert_eq!(alerts[0].percent, 5.0);
    assert_eq!(alerts[0].window_ms, 7_200_000);
}

#[tokio::test]
async fn unsubscribe_removes_the_alert() {
    let mut h = common::harness(Settings::default());
    h.quotes.set_name("FR:RNO", "RENAULT");
    h.quotes.enqueue_price("FR:RNO", 10.0);

    commands::handle_line(&h.state, FROM, "s fr:rno 2").await;
    h.outbound.try_recv().unwrap();
    commands::handle_line(&h.state, FROM, "u fr:rno").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "Done !");

    let contact = h.state.store.contact_by_address(FROM).await.unwrap();
    assert!(h
        .state
        .store
        .alerts_for_contact(contact.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn quote_falls_back_to_the_stored_value() {
    let mut h = common::harness(Settings::default());
    let mut stock = Stock::new("FR", "RNO");
    stock.name = "RENAULT".to_string();
    stock.value = 10.0;
    stock.currency = "EUR".to_string();
    h.state.store.save_stock(&stock).await.unwrap();

    // nothing scripted, the live fetch fails
    commands::handle_line(&h.state, FROM, "g fr:rno").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "Stock \"RENAULT\" (FR:RNO) : 10.000 EUR");
}

#[tokio::test]
async fn listing_without_subscriptions_says_so() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "ls").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "You didn't subscribe to anything !");
}

#[tokio::test]
async fn pause_and_resume_toggle_the_contact() {
    let mut h = common::harness(Settings::default());

    commands::handle_line(&h.state, FROM, "pause 3").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "OK, no alert for 3 days.");
    let contact = h.state.store.contact_by_address(FROM).await.unwrap();
    assert!(contact.is_paused(chrono::Utc::now().timestamp_millis()));

    commands::handle_line(&h.state, FROM, "resume").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "OK, back to work !");
    let contact = h.state.store.contact_by_address(FROM).await.unwrap();
    assert!(!contact.is_paused(chrono::Utc::now().timestamp_millis()));
}

#[tokio::test]
async fn valuation_saves_and_lists_holdings() {
    let mut h = common::harness(Settings::default());
    let mut stock = Stock::new("FR", "RNO");
    stock.name = "RENAULT".to_string();
    stock.value = 12.0;
    stock.currency = "EUR".to_string();
    h.state.store.save_stock(&stock).await.unwrap();

    commands::handle_line(&h.state, FROM, "v fr:rno 10 10.0").await;
    let saved = h.outbound.try_recv().unwrap();
    assert!(
        saved.text.starts_with("Saved \"RENAULT\" (FR:RNO) with 10 x 10.00 = 100.00 EUR"),
        "unexpected reply: {}",
        saved.text
    );
    let listing = h.outbound.try_recv().unwrap();
    assert!(listing.text.contains("total: 120.000 - 100.000 = +20.000 EUR (+20.00%)"));
    assert!(listing.text.contains("Total: 120.000 - 100.000 = +20.000 EUR (+20.00%)"));

    // NB <= 0 forgets the holding
    commands::handle_line(&h.state, FROM, "v fr:rno 0").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "You didn't register any stock value.");
}

#[tokio::test]
async fn valuation_without_a_share_count_is_a_query() {
    let mut h = common::harness(Settings::default());
    let mut stock = Stock::new("FR", "RNO");
    stock.name = "RENAULT".to_string();
    stock.value = 12.0;
    stock.currency = "EUR".to_string();
    h.state.store.save_stock(&stock).await.unwrap();

    commands::handle_line(&h.state, FROM, "v fr:rno 10 10.0").await;
    h.outbound.try_recv().unwrap();
    h.outbound.try_recv().unwrap();

    // a plain `v <stock>` only lists, it must not touch the holding
    commands::handle_line(&h.state, FROM, "v fr:rno").await;
    let listing = h.outbound.try_recv().unwrap();
    assert!(listing.text.contains("10 shares"), "unexpected reply: {}", listing.text);

    let contact = h.state.store.contact_by_address(FROM).await.unwrap();
    let holding = h
        .state
        .store
        .holding_for_pair(contact.id, stock.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(holding.shares, 10);
}

#[tokio::test]
async fn forgetme_deletes_the_contact() {
    let mut h = common::harness(Settings::default());
    let before = h.state.store.contact_by_address(FROM).await.unwrap();

    commands::handle_line(&h.state, FROM, "forgetme").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, "Who are you ?");

    // a fresh contact record appears on the next interaction
    let after = h.state.store.contact_by_address(FROM).await.unwrap();
    assert_ne!(before.id, after.id);
}

#[tokio::test]
async fn version_reports_the_package_version() {
    let mut h = common::harness(Settings::default());
    commands::handle_line(&h.state, FROM, "version").await;
    let msg = h.outbound.try_recv().unwrap();
    assert_eq!(msg.text, env!("CARGO_PKG_VERSION"));
}
