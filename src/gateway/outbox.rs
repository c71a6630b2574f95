//! Outbound gateway queue with retry.
//!
//! Application events are serialised when they are emitted and queued in
//! FIFO order.  [`Outbox::poll`] pushes queued messages to the transport;
//! on failure it waits an exponential backoff (1 s → 2 s → 4 s … capped at
//! 60 s) before retrying the same message.  When the queue is full the
//! oldest message is evicted and logged at error level.

use heapless::Deque;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::dto::{ConsumptionLogDto, RfidDto};
use super::topics::Topic;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::CommsError;

pub const OUTBOX_DEPTH: usize = 32;

const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 60_000;

/// Transport the outbox publishes through (MQTT client on the device).
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: Topic,
    pub payload: Vec<u8>,
}

pub struct Outbox<P> {
    publisher: P,
    queue: Deque<OutboundMessage, OUTBOX_DEPTH>,
    backoff_ms: u64,
    next_attempt_ms: u64,
    evicted: u32,
}

impl<P: Publisher> Outbox<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            queue: Deque::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt_ms: 0,
            evicted: 0,
        }
    }

    /// Serialise and queue a payload.
    pub fn publish_json<T: Serialize>(&mut self, topic: Topic, payload: &T) -> Result<(), CommsError> {
        let bytes = serde_json::to_vec(payload).map_err(|_| CommsError::Encode)?;
        self.enqueue(OutboundMessage { topic, payload: bytes });
        Ok(())
    }

    pub fn enqueue(&mut self, msg: OutboundMessage) {
        if self.queue.is_full() {
            if let Some(old) = self.queue.pop_front() {
                self.evicted = self.evicted.wrapping_add(1);
                error!(
                    "outbox: full, evicted oldest message on {} ({} evicted total)",
                    old.topic.as_str(),
                    self.evicted
                );
            }
        }
        if let Err(msg) = self.queue.push_back(msg) {
            error!("outbox: failed to queue message on {}", msg.topic.as_str());
        }
    }

    /// Publish as many queued messages as the transport accepts.  Returns
    /// the number sent.  Does nothing while a backoff is pending.
    pub fn poll(&mut self, now_ms: u64) -> usize {
        if now_ms < self.next_attempt_ms {
            return 0;
        }
        let mut sent = 0;
        while let Some(msg) = self.queue.front() {
            match self.publisher.publish(msg.topic.as_str(), &msg.payload) {
                Ok(()) => {
                    debug!("outbox: published on {}", msg.topic.as_str());
                    self.queue.pop_front();
                    sent += 1;
                    if self.backoff_ms != INITIAL_BACKOFF_MS {
                        info!("outbox: transport recovered");
                        self.backoff_ms = INITIAL_BACKOFF_MS;
                    }
                }
                Err(e) => {
                    warn!(
                        "outbox: publish on {} failed ({}), retry in {} ms ({} queued)",
                        msg.topic.as_str(),
                        e,
                        self.backoff_ms,
                        self.queue.len()
                    );
                    self.next_attempt_ms = now_ms + self.backoff_ms;
                    self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                    break;
                }
            }
        }
        sent
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn evicted(&self) -> u32 {
        self.evicted
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    fn publish_consumption(&mut self, dto: Result<ConsumptionLogDto, CommsError>) {
        match dto {
            Ok(dto) => self.queue_or_log(Topic::ConsumptionLog, &dto),
            Err(e) => warn!("outbox: consumption log not published: {}", e),
        }
    }

    fn queue_or_log<T: Serialize>(&mut self, topic: Topic, payload: &T) {
        if let Err(e) = self.publish_json(topic, payload) {
            error!("outbox: {} on {}", e, topic.as_str());
        }
    }
}

impl<P: Publisher> EventSink for Outbox<P> {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::RfidIdentified(tag) => match RfidDto::new(tag) {
                Ok(dto) => self.queue_or_log(Topic::RfidIdentification, &dto),
                Err(e) => warn!("outbox: tag {} not published: {}", tag, e),
            },
            AppEvent::ConsumptionLogged { record, logged_at } => {
                let dto = ConsumptionLogDto::from_record(record, *logged_at);
                self.publish_consumption(dto);
            }
            AppEvent::Alert(alert) => self.queue_or_log(Topic::Alerts, alert),
            _ => {}
        }
    }
}
