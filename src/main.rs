//! Swine feeding station firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  InterlockAdapter       LogEventSink    Outbox<MqttPublisher>  │
//! │  (Sensor+Actuator)      (EventSink)     (EventSink)            │
//! │  SystemClock (Clock)    GatewayInbox ◀── MQTT callback         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Safety · FSM · Ledger                                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::{FreeRtos, NON_BLOCK};
use esp_idf_svc::hal::gpio::{
    AnyIOPin, AnyOutputPin, IOPin, Input, Output, OutputPin as _, PinDriver, Pull,
};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};

use swinefeeder::adapters::hardware::InterlockAdapter;
use swinefeeder::adapters::log_sink::LogEventSink;
use swinefeeder::adapters::time::SystemClock;
use swinefeeder::app::commands::AppCommand;
use swinefeeder::app::ports::Clock;
use swinefeeder::app::service::AppService;
use swinefeeder::config::FeederConfig;
use swinefeeder::drivers::door::{DoorDriver, DoorId};
use swinefeeder::drivers::feeder_motor::FeederMotor;
use swinefeeder::drivers::watchdog::{Watchdog, timeout_for_loop};
use swinefeeder::error::{CommsError, Error};
use swinefeeder::gateway::topics::Topic;
use swinefeeder::gateway::{GatewayInbox, Outbox, Publisher};
use swinefeeder::sensors::presence::PresenceSensor;
use swinefeeder::sensors::rfid::{ByteSource, RfidReader};

// ── Build-time settings ───────────────────────────────────────

const WIFI_SSID: &str = match option_env!("SWINEFEEDER_WIFI_SSID") {
    Some(v) => v,
    None => "",
};
const WIFI_PASSWORD: &str = match option_env!("SWINEFEEDER_WIFI_PASSWORD") {
    Some(v) => v,
    None => "",
};
const BROKER_URL: &str = match option_env!("SWINEFEEDER_BROKER_URL") {
    Some(v) => v,
    None => "mqtt://localhost:1883",
};

const TELEMETRY_INTERVAL_MS: u64 = 10_000;
const WIFI_BACKOFF_MIN_MS: u64 = 1_000;
const WIFI_BACKOFF_MAX_MS: u64 = 60_000;
const TAG_READER_BAUD: u32 = 9_600;

// ── Shared with the MQTT task ─────────────────────────────────

static INBOX: GatewayInbox = GatewayInbox::new();
static MQTT_CONNECTED: AtomicBool = AtomicBool::new(false);

type OutPin = PinDriver<'static, AnyOutputPin, Output>;
type InPin = PinDriver<'static, AnyIOPin, Input>;

// ── Gateway transport ─────────────────────────────────────────

struct MqttPublisher {
    client: EspMqttClient<'static>,
}

impl MqttPublisher {
    fn subscribe_inbound(&mut self) -> bool {
        Topic::INBOUND.iter().all(|topic| {
            match self.client.subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(_) => true,
                Err(e) => {
                    warn!("MQTT: subscribe {} failed: {}", topic.as_str(), e);
                    false
                }
            }
        })
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !MQTT_CONNECTED.load(Ordering::Acquire) {
            return Err(CommsError::NotConnected);
        }
        self.client
            .enqueue(topic, QoS::AtLeastOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: enqueue on {} failed: {}", topic, e);
                CommsError::PublishFailed
            })
    }
}

// ── Tag reader UART ───────────────────────────────────────────

struct UartSource(UartDriver<'static>);

impl ByteSource for UartSource {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.0.read(&mut byte, NON_BLOCK) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

fn output(pin: AnyOutputPin) -> Result<OutPin> {
    let mut driver = PinDriver::output(pin)?;
    driver.set_low()?;
    Ok(driver)
}

fn input(pin: AnyIOPin) -> Result<InPin> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Down)?;
    Ok(driver)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  swinefeeder v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // ── 2. Interlock hardware ─────────────────────────────────
    let entry = DoorDriver::new(
        DoorId::Entry,
        output(pins.gpio4.downgrade_output())?,
        output(pins.gpio5.downgrade_output())?,
        input(pins.gpio6.downgrade())?,
        input(pins.gpio7.downgrade())?,
    );
    let separation = DoorDriver::new(
        DoorId::Separation,
        output(pins.gpio15.downgrade_output())?,
        output(pins.gpio16.downgrade_output())?,
        input(pins.gpio17.downgrade())?,
        input(pins.gpio18.downgrade())?,
    );
    let feeder = FeederMotor::new(output(pins.gpio8.downgrade_output())?);
    let presence = PresenceSensor::new(input(pins.gpio9.downgrade())?);
    let uart = UartDriver::new(
        peripherals.uart1,
        pins.gpio10,
        pins.gpio11,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(TAG_READER_BAUD)),
    )?;
    let mut hw = InterlockAdapter::new(
        entry,
        separation,
        feeder,
        presence,
        RfidReader::new(UartSource(uart)),
    );

    // ── 3. Network: Wi-Fi, SNTP, MQTT ─────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: WIFI_PASSWORD
            .try_into()
            .map_err(|_| anyhow!("Wi-Fi password too long"))?,
        ..Default::default()
    }))?;
    wifi.start()?;
    if let Err(e) = wifi.connect() {
        warn!("Wi-Fi: initial connect failed ({}), will retry", e);
    }
    let _sntp = EspSntp::new_default()?;

    let client = EspMqttClient::new_cb(
        BROKER_URL,
        &MqttClientConfiguration {
            client_id: Some("swinefeeder"),
            ..Default::default()
        },
        |event| match event.payload() {
            EventPayload::Connected(_) => {
                info!("MQTT: connected");
                MQTT_CONNECTED.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                warn!("MQTT: disconnected");
                MQTT_CONNECTED.store(false, Ordering::Release);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                if let Err(e) = INBOX.route(topic, data) {
                    warn!("MQTT: inbound {} dropped: {}", topic, e);
                }
            }
            _ => {}
        },
    )?;

    // ── 4. Application service ────────────────────────────────
    let clock = SystemClock::new();
    if !clock.wall_clock_synced() {
        warn!("Wall clock not yet synced, timestamps are unreliable until SNTP completes");
    }

    let config = FeederConfig::default();
    let mut app = AppService::new(config);
    let mut sink = (LogEventSink::new(), Outbox::new(MqttPublisher { client }));
    app.start(&clock, &mut sink);

    let watchdog = Watchdog::new(timeout_for_loop(config.control_loop_interval_ms));

    info!(
        "System ready (watchdog {}). Entering control loop.",
        if watchdog.is_subscribed() { "armed" } else { "off" }
    );

    // ── 5. Control loop ───────────────────────────────────────
    let mut subscribed = false;
    let mut last_error: Option<Error> = None;
    let mut next_telemetry_ms = clock.uptime_ms() + TELEMETRY_INTERVAL_MS;
    let mut wifi_backoff_ms = WIFI_BACKOFF_MIN_MS;
    let mut next_wifi_retry_ms = clock.uptime_ms() + wifi_backoff_ms;

    loop {
        let now_ms = clock.uptime_ms();

        // Wi-Fi reconnection (non-blocking, exponential backoff).
        match wifi.is_connected() {
            Ok(true) => wifi_backoff_ms = WIFI_BACKOFF_MIN_MS,
            _ if now_ms >= next_wifi_retry_ms => {
                info!("Wi-Fi: reconnect attempt (backoff {} ms)", wifi_backoff_ms);
                if let Err(e) = wifi.connect() {
                    warn!("Wi-Fi: connect failed: {}", e);
                }
                wifi_backoff_ms = (wifi_backoff_ms * 2).min(WIFI_BACKOFF_MAX_MS);
                next_wifi_retry_ms = now_ms + wifi_backoff_ms;
            }
            _ => {}
        }

        // (Re)subscribe after every broker connection.
        if MQTT_CONNECTED.load(Ordering::Acquire) {
            if !subscribed {
                subscribed = sink.1.publisher_mut().subscribe_inbound();
            }
        } else {
            subscribed = false;
        }

        // Control tick.
        match app.tick(&mut hw, &clock, &INBOX, &mut sink) {
            Ok(()) => {
                if last_error.take().is_some() {
                    info!("Control loop recovered in {:?}", app.state());
                }
            }
            Err(e) => {
                if last_error != Some(e) {
                    match e {
                        Error::Halted | Error::IllegalTransition { .. } => {
                            error!("Control loop halted: {}", e);
                        }
                        _ => warn!("Control tick: {}", e),
                    }
                }
                last_error = Some(e);
            }
        }

        // Outbound retries.
        sink.1.poll(clock.uptime_ms());

        if now_ms >= next_telemetry_ms {
            if let Err(e) = app.handle_command(AppCommand::ReportTelemetry, &mut hw, &mut sink.0) {
                warn!("Telemetry: {}", e);
            }
            next_telemetry_ms = now_ms + TELEMETRY_INTERVAL_MS;
        }

        watchdog.feed();
        FreeRtos::delay_ms(app.config().control_loop_interval_ms);
    }
}
