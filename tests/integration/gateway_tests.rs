//! Gateway round trip: inbound payloads routed into the service, outbound
//! records published through the outbox.

use crate::mock_hw::{Harness, RecordingSink};

use serde_json::Value;
use swinefeeder::config::FeederConfig;
use swinefeeder::error::CommsError;
use swinefeeder::fsm::StateId;
use swinefeeder::gateway::{Outbox, Publisher, topics};

#[derive(Default)]
struct Broker {
    online: bool,
    published: Vec<(String, Value)>,
}

impl Publisher for Broker {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.online {
            return Err(CommsError::NotConnected);
        }
        let json = serde_json::from_slice(payload).map_err(|_| CommsError::Decode)?;
        self.published.push((topic.to_owned(), json));
        Ok(())
    }
}

type GatewayHarness = Harness<(RecordingSink, Outbox<Broker>)>;

fn harness(config: FeederConfig) -> GatewayHarness {
    let broker = Broker {
        online: true,
        ..Broker::default()
    };
    Harness::with_sink(config, (RecordingSink::new(), Outbox::new(broker)))
}

fn published_on<'a>(h: &'a GatewayHarness, topic: &str) -> Vec<&'a Value> {
    h.sink
        .1
        .publisher()
        .published
        .iter()
        .filter(|(t, _)| t == topic)
        .map(|(_, v)| v)
        .collect()
}

#[test]
fn session_publishes_rfid_and_consumption_log() {
    let mut h = harness(FeederConfig {
        portion_amount_grams: 500,
        ..FeederConfig::default()
    });
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":1000}"#);
    h.step_until(120_000, |h| h.app.state() == StateId::Exiting);
    h.hw.presence = false;
    h.step().unwrap();
    let now = h.now_ms();
    h.sink.1.poll(now);

    let rfid = published_on(&h, topics::RFID_IDENTIFICATION);
    assert_eq!(rfid.len(), 1);
    assert_eq!(rfid[0]["rfid"], "PIG00123");

    let logs = published_on(&h, topics::CONSUMPTION_LOG);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["amountConsumed"], 1000);
    assert_eq!(logs[0]["confinementId"], 7);
    assert!(logs[0]["entryDateTime"].is_string());
    assert!(logs[0]["exitDateTime"].is_string());
    assert!(published_on(&h, topics::ALERTS).is_empty());
}

#[test]
fn alerts_are_published_camel_case_with_type() {
    let mut h = harness(FeederConfig::default());
    h.hw.presence = true;
    for _ in 0..40 {
        h.step().unwrap();
    }
    let now = h.now_ms();
    h.sink.1.poll(now);

    let alerts = published_on(&h, topics::ALERTS);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["type"], "ReadFailure");
    assert_eq!(alerts[0]["status"], "Pending");
    assert!(!alerts[0]["description"].as_str().unwrap().is_empty());
    assert!(alerts[0]["createdAt"].is_string());
}

#[test]
fn offline_broker_keeps_records_until_reconnect() {
    let mut h = harness(FeederConfig::default());
    h.sink.1.publisher_mut().online = false;
    h.hw.present_tag("PIG00123");
    h.step().unwrap();

    let now = h.now_ms();
    assert_eq!(h.sink.1.poll(now), 0);
    assert_eq!(h.sink.1.pending(), 1);

    h.sink.1.publisher_mut().online = true;
    // Still inside the first backoff window.
    assert_eq!(h.sink.1.poll(now + 500), 0);
    assert_eq!(h.sink.1.poll(now + 1_000), 1);
    assert_eq!(h.sink.1.pending(), 0);
}

#[test]
fn alert_parameters_update_changes_read_tolerance() {
    let mut h = harness(FeederConfig::default());
    h.inbox
        .route(
            topics::ALERT_PARAMETERS,
            br#"{"maxFeedingTimeMinutes":30,"maxIntervalWithoutFeedingHours":24,"rfidReadTolerance":1,"minAmountWithoutAlertGrams":500}"#,
        )
        .unwrap();
    h.hw.presence = true;
    // 1 s tolerance: the read failure fires within two seconds.
    for _ in 0..10 {
        h.step().unwrap();
    }
    assert_eq!(h.app.config().rfid_read_tolerance_secs, 1);
    assert_eq!(h.sink.0.alerts(swinefeeder::gateway::dto::AlertType::ReadFailure), 1);
}

#[test]
fn invalid_inbound_payloads_are_rejected_at_the_edge() {
    let h = harness(FeederConfig::default());
    assert_eq!(
        h.inbox.route("swinefarm/unknown", b"{}"),
        Err(CommsError::UnknownTopic)
    );
    assert_eq!(
        h.inbox.route(topics::DAILY_PLAN, b"not json"),
        Err(CommsError::Decode)
    );
    assert!(matches!(
        h.inbox
            .route(topics::DAILY_PLAN, br#"{"confinementId":0,"feedAmountGrams":10}"#),
        Err(CommsError::InvalidPayload(_))
    ));
    assert!(h.inbox.try_next_plan().is_none());
}
