mod common;

use common::*;
use modest::host::page::SimulatedPage;
use modest::host::INDICATOR_ID;
use modest::kernel::event::ActivityKind;
use modest::kernel::presence::TrackingPhase;
use modest::kernel::reactor::{self, Reactor};
use modest::services::dispatch::{EffectDispatcher, Endpoints};
use modest::TrackerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Boot against `page` and run the full driver loop on a task.
fn spawn_tracker(page: &Arc<SimulatedPage>, transport: &Arc<RecordingTransport>) -> JoinHandle<Reactor> {
    let (tx, rx) = reactor::channel();
    page.attach(tx.clone());
    let mut reactor = Reactor::boot(rx, TrackerConfig::default(), page.as_ref(), memory_store()).expect("boot");
    let dispatcher = EffectDispatcher::new(
        Endpoints::from(&TrackerConfig::default()),
        transport.clone(),
        page.clone(),
        tx,
    );
    tokio::spawn(async move {
        reactor.run(&dispatcher).await;
        reactor
    })
}

fn heartbeat_calls(transport: &RecordingTransport) -> Vec<(String, u64)> {
    transport
        .calls_to("/heartbeat")
        .iter()
        .map(|c| {
            (
                c.body.get("token").unwrap().to_string(),
                c.body.get("time_spent_on_page").unwrap().parse().unwrap(),
            )
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_visit_reports_cumulative_dwell() {
    let page = Arc::new(embedded_page("https://example.com/blog?x=1", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-1"}"#);

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_millis(13_500)).await;
    page.unload();
    let reactor = handle.await.unwrap();

    let pageviews = transport.calls_to("/pageview");
    assert_eq!(pageviews.len(), 1);
    assert_eq!(pageviews[0].body.get("path"), Some("/blog?x=1"));
    assert_eq!(pageviews[0].via, Via::Post);

    assert_eq!(transport.heartbeat_values(), vec![4, 8, 12, 13]);
    assert!(transport.calls_to("/heartbeat").iter().all(|c| c.via == Via::Beacon));
    assert_eq!(reactor.state.phase, TrackingPhase::Unloaded);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_fall_back_to_post_without_beacon() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-1"}"#);
    transport.disable_beacon();

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_millis(8_500)).await;
    page.unload();
    handle.await.unwrap();

    let heartbeats = transport.calls_to("/heartbeat");
    assert_eq!(heartbeats.len(), 3);
    assert!(heartbeats.iter().all(|c| c.via == Via::Post));
}

#[tokio::test(start_paused = true)]
async fn test_spa_navigation_in_running_tracker() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-1"}"#).respond(r#"{"token":"sess-2"}"#);

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_secs(6)).await;
    page.push_state("/about");
    page.replace_state("/about");
    tokio::time::sleep(Duration::from_millis(7_500)).await;
    page.unload();
    handle.await.unwrap();

    let pageviews = transport.calls_to("/pageview");
    assert_eq!(pageviews.len(), 2);
    assert_eq!(pageviews[1].body.get("path"), Some("/about"));

    assert_eq!(
        heartbeat_calls(&transport),
        vec![
            ("sess-1".to_string(), 4),
            ("sess-1".to_string(), 6),
            ("sess-2".to_string(), 4),
            ("sess-2".to_string(), 8),
            ("sess-2".to_string(), 9),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_visitor_stops_accruing() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-1"}"#);

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_secs(41)).await;
    page.input(ActivityKind::Scroll);
    tokio::time::sleep(Duration::from_secs(4)).await;
    page.unload();
    handle.await.unwrap();

    let values = transport.heartbeat_values();
    assert_eq!(&values[..7], &[4, 8, 12, 16, 20, 24, 28]);
    assert_eq!(&values[7..10], &[28, 28, 28]);
    // Scroll at 41s revives accrual for the tick at 44s
    assert_eq!(values[10], 32);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_registration_sends_no_heartbeats() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond("<html>oops</html>");

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_secs(20)).await;
    page.unload();
    let reactor = handle.await.unwrap();

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(reactor.telemetry.snapshot().registration_stats.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_registration_sends_no_heartbeats() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    // No scripted answer: the collector responds 503
    let transport = RecordingTransport::new();

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_secs(10)).await;
    page.unload();
    handle.await.unwrap();

    assert!(transport.calls_to("/heartbeat").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_opt_out_from_page_in_running_tracker() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-2"}"#);

    let handle = spawn_tracker(&page, &transport);
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    page.opt_out();
    page.opt_out();
    tokio::time::sleep(Duration::from_secs(8)).await;
    page.unload();
    handle.await.unwrap();

    assert_eq!(transport.heartbeat_values(), vec![4]);
    let deletes = transport.calls_to("/delete");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].body.get("token"), Some("sess-2"));
    assert_eq!(page.element_count(INDICATOR_ID), 1);
}

#[tokio::test]
async fn test_page_without_embed_never_starts() {
    let page = SimulatedPage::new("https://example.com/");
    let (_tx, rx) = reactor::channel();
    assert!(Reactor::boot(rx, TrackerConfig::default(), &page, memory_store()).is_err());
    assert!(page.elements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_busy_page_does_not_starve_heartbeat() {
    let page = Arc::new(embedded_page("https://example.com/", "abc"));
    let transport = RecordingTransport::new();
    transport.respond(r#"{"token":"sess-1"}"#);

    let handle = spawn_tracker(&page, &transport);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.calls_to("/pageview").len(), 1);

    // Keep the queue full of pointer moves
    let busy_page = page.clone();
    let flood = tokio::spawn(async move {
        loop {
            for _ in 0..512 {
                busy_page.input(ActivityKind::PointerMove);
            }
            tokio::task::yield_now().await;
        }
    });

    tokio::time::advance(Duration::from_millis(4_500)).await;
    for _ in 0..10_000 {
        if !transport.heartbeat_values().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.heartbeat_values().first(), Some(&4));

    flood.abort();
    for _ in 0..10_000 {
        if handle.is_finished() {
            break;
        }
        page.unload();
        tokio::task::yield_now().await;
    }
    handle.await.unwrap();
}
