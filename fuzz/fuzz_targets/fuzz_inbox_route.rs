//! Fuzz target: `GatewayInbox::route`
//!
//! Drives arbitrary payloads into every inbound topic and asserts that the
//! inbox never panics and never queues a plan that fails validation.
//!
//! cargo fuzz run fuzz_inbox_route

#![no_main]

use libfuzzer_sys::fuzz_target;
use swinefeeder::gateway::GatewayInbox;
use swinefeeder::gateway::topics::Topic;

fuzz_target!(|data: &[u8]| {
    let inbox = GatewayInbox::new();

    for topic in Topic::INBOUND {
        let _ = inbox.route(topic.as_str(), data);
    }

    if let Some(plan) = inbox.try_next_plan() {
        assert!(plan.validate().is_ok(), "invalid plan was queued");
    }
    let _ = inbox.try_next_settings();
    let _ = inbox.try_next_alert_parameters();
});
