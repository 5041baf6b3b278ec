//! End-to-end delivery tests against live HTTP expectations.
//!
//! Deliveries are fire-and-forget, so tests wait for requests to land (or
//! for bookkeeping to update) under a deadline instead of awaiting the
//! dispatch call alone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kennel_core::SubscriptionId;
use kennel_protocol::WebhookEvent;
use kennel_settings::WebhookSettings;
use kennel_webhooks::{signer, NewSubscription, WebhookDispatcher, WebhookRegistry};

const TIMEOUT: Duration = Duration::from_secs(5);

fn make_dispatcher() -> WebhookDispatcher {
    WebhookDispatcher::new(Arc::new(WebhookRegistry::new()), &WebhookSettings::default())
}

async fn subscribe(
    dispatcher: &WebhookDispatcher,
    server: &MockServer,
    events: &[&str],
    secret: Option<&str>,
) -> SubscriptionId {
    dispatcher
        .registry()
        .register(NewSubscription {
            url: format!("{}/hook", server.uri()),
            events: events.iter().map(ToString::to_string).collect(),
            secret: secret.map(ToString::to_string),
        })
        .await
        .unwrap()
        .id
}

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {count} webhook deliveries"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for<F>(mut condition: F, what: &str)
where
    F: AsyncFnMut() -> bool,
{
    let deadline = Instant::now() + TIMEOUT;
    while !condition().await {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn delivery_reaches_matching_subscriptions_only() {
    let bookings = MockServer::start().await;
    let pets = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&bookings)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&pets)
        .await;

    let dispatcher = make_dispatcher();
    let _ = subscribe(&dispatcher, &bookings, &["booking.created"], None).await;
    let _ = subscribe(&dispatcher, &pets, &["pet.created"], None).await;

    let spawned = dispatcher
        .trigger(WebhookEvent::BookingCreated, json!({"id": "bk_1"}))
        .await;
    assert_eq!(spawned, 1);

    let _ = wait_for_requests(&bookings, 1).await;
    sleep(Duration::from_millis(50)).await;
    assert!(pets.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn envelope_carries_event_timestamp_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let _ = subscribe(&dispatcher, &server, &["availability.changed"], None).await;
    let _ = dispatcher
        .trigger(
            WebhookEvent::AvailabilityChanged,
            json!({"serviceId": "svc_1", "date": "2026-09-01"}),
        )
        .await;

    let requests = wait_for_requests(&server, 1).await;
    let request = &requests[0];
    assert_eq!(
        request.headers.get("content-type").unwrap().to_str().unwrap(),
        "application/json"
    );
    let envelope: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event"], "availability.changed");
    assert_eq!(envelope["data"]["serviceId"], "svc_1");
    assert!(envelope["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
}

#[tokio::test(flavor = "multi_thread")]
async fn signature_covers_the_exact_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let _ = subscribe(
        &dispatcher,
        &server,
        &["booking.completed"],
        Some("wh_secret_9"),
    )
    .await;
    let _ = dispatcher
        .trigger(WebhookEvent::BookingCompleted, json!({"id": "bk_7"}))
        .await;

    let requests = wait_for_requests(&server, 1).await;
    let request = &requests[0];
    let header = request
        .headers
        .get("X-Kennel-Signature")
        .expect("signature header missing")
        .to_str()
        .unwrap();
    assert_eq!(header, signer::sign("wh_secret_9", &request.body));
}

#[tokio::test(flavor = "multi_thread")]
async fn unsigned_when_no_secret_is_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let _ = subscribe(&dispatcher, &server, &["owner.created"], None).await;
    let _ = dispatcher
        .trigger(WebhookEvent::OwnerCreated, json!({"id": "own_1"}))
        .await;

    let requests = wait_for_requests(&server, 1).await;
    assert!(requests[0].headers.get("X-Kennel-Signature").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_delivery_counts_but_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let id = subscribe(&dispatcher, &server, &["booking.cancelled"], None).await;
    let _ = dispatcher
        .trigger(WebhookEvent::BookingCancelled, json!({"id": "bk_9"}))
        .await;

    let registry = Arc::clone(dispatcher.registry());
    wait_for(
        async || registry.get(&id).await.unwrap().error_count == 1,
        "failure bookkeeping",
    )
    .await;

    let view = registry.get(&id).await.unwrap();
    assert!(view.last_failure.is_some());
    assert!(view.last_triggered.is_none());

    // No retry: the request count stays where it is.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn trigger_returns_before_deliveries_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let id = subscribe(&dispatcher, &server, &["booking.updated"], None).await;

    let started = Instant::now();
    let spawned = dispatcher
        .trigger(WebhookEvent::BookingUpdated, json!({"id": "bk_3"}))
        .await;
    assert_eq!(spawned, 1);
    assert!(
        started.elapsed() < Duration::from_millis(200),
        "trigger must not wait on the delivery"
    );

    let registry = Arc::clone(dispatcher.registry());
    wait_for(
        async || registry.get(&id).await.unwrap().last_triggered.is_some(),
        "delayed delivery to finish",
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delivery_ignores_the_event_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    // Subscribed to bookings only; the diagnostic still goes through.
    let id = subscribe(&dispatcher, &server, &["booking.created"], None).await;
    dispatcher.test_subscription(&id).await.unwrap();

    let requests = wait_for_requests(&server, 1).await;
    let envelope: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["event"], "webhook.test");
    assert_eq!(envelope["data"]["subscriptionId"], json!(id.as_str()));
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_delivery_stamps_last_triggered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dispatcher = make_dispatcher();
    let id = subscribe(&dispatcher, &server, &["pet.created"], None).await;
    let _ = dispatcher
        .trigger(WebhookEvent::PetCreated, json!({"id": "pet_1"}))
        .await;

    let registry = Arc::clone(dispatcher.registry());
    wait_for(
        async || registry.get(&id).await.unwrap().last_triggered.is_some(),
        "success bookkeeping",
    )
    .await;
    assert_eq!(registry.get(&id).await.unwrap().error_count, 0);
}
