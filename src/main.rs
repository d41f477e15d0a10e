//! HiveLink daemon entry point
//!
//! Role selection is a boot-time input: `--role sender` or `--role gateway`
//! (the field devices wire this to a mode switch). Settings come from the
//! persisted key-value store, `/etc/hivelink.toml` by default.

use hivelink::config::{keys, Settings, DEFAULT_SETTINGS_PATH};
use hivelink::error::{Error, Result};
use hivelink::gateway::GatewayProtocol;
use hivelink::link::{RadioLink, UdpRadioLink};
use hivelink::relay::{LoggingBroker, RelaySink, SystemClock};
use hivelink::sender::SenderProtocol;
use hivelink::sensors::{
    BoardThermometer, LastGood, ReadingSource, SimulatedBoardSensor, SimulatedSensor,
};
use hivelink::supervisor::{ProcessReboot, RecoverySupervisor};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Sender,
    Gateway,
}

/// Parse command line arguments.
///
/// Supports:
/// - `hivelink --role <sender|gateway>` (required)
/// - `hivelink --config <path>` / `-c <path>` (defaults to `/etc/hivelink.toml`)
fn parse_args() -> Result<(String, Role)> {
    let args: Vec<String> = env::args().collect();
    let mut config_path = DEFAULT_SETTINGS_PATH.to_string();
    let mut role = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => {
                config_path = args[i + 1].clone();
                i += 2;
            }
            "--role" | "-r" if i + 1 < args.len() => {
                role = match args[i + 1].as_str() {
                    "sender" => Some(Role::Sender),
                    "gateway" => Some(Role::Gateway),
                    other => {
                        return Err(Error::Other(format!(
                            "unknown role '{other}' (expected sender or gateway)"
                        )))
                    }
                };
                i += 2;
            }
            other => {
                return Err(Error::Other(format!("unknown argument '{other}'")));
            }
        }
    }

    let role = role.ok_or_else(|| Error::Other("missing --role <sender|gateway>".into()))?;
    Ok((config_path, role))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) | Err(Error::Interrupted) => {
            log::info!("HiveLink stopped");
        }
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let (config_path, role) = parse_args()?;
    log::info!("HiveLink v0.2.0 starting ({role:?} role)");
    log::info!("Using settings: {config_path}");

    let running = Arc::new(AtomicBool::new(true));
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let running = Arc::clone(&running);
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            log::info!("received interrupt signal");
            interrupted.store(true, Ordering::Relaxed);
            running.store(false, Ordering::Relaxed);
        })
        .map_err(|e| Error::Other(format!("error setting Ctrl-C handler: {e}")))?;
    }

    // The closure is one full boot of the role; after a restart it runs
    // again from scratch, exactly like a rebooted device.
    let mut supervisor = RecoverySupervisor::new(ProcessReboot, Arc::clone(&interrupted));
    supervisor.run(|| match role {
        Role::Sender => run_sender(&config_path, &running),
        Role::Gateway => run_gateway(&config_path),
    })
}

/// Boot and run the sender role: sample-and-transmit duty cycles
fn run_sender(config_path: &str, running: &Arc<AtomicBool>) -> Result<()> {
    let mut settings = Settings::load(config_path)?;

    let own = settings.address("02:00:00:00:00:01")?;
    let peer = settings.peer()?;
    let bind = settings.bind_addr("0.0.0.0:0")?;
    let mut link = UdpRadioLink::bind(&bind, own)?;
    link.add_endpoint(peer, settings.peer_endpoint()?.as_str())?;
    link.register_peer(peer)?;

    // Pin assignments are provisioning keys; without hardware drivers the
    // hives run on simulated sources with the real drivers' sample rates.
    let dht11_pin = settings.get(keys::DHT11_PIN)?;
    let ds28b20_pin = settings.get(keys::DS28B20_PIN)?;
    if dht11_pin.is_empty() && ds28b20_pin.is_empty() {
        log::info!("no sensor pins configured, using simulated sources");
    }
    let providers: Vec<Box<dyn ReadingSource>> = vec![
        Box::new(LastGood::new(
            SimulatedSensor::new("Christine", 21.0, Duration::from_secs(1)).with_humidity(55.0),
        )),
        Box::new(LastGood::new(SimulatedSensor::new(
            "Elisabeth",
            34.0,
            Duration::from_millis(750),
        ))),
    ];

    let duty_cycle = settings.duty_cycle()?;
    let mut sender = SenderProtocol::new(link, own, peer, providers, duty_cycle);
    log::info!("sender paired with gateway {peer}, duty cycle {duty_cycle:?}");
    sender.run(running)
}

/// Boot and run the gateway role: the blocking receive loop
fn run_gateway(config_path: &str) -> Result<()> {
    let mut settings = Settings::load(config_path)?;

    let own = settings.address("02:00:00:00:00:02")?;
    let bind = settings.bind_addr("0.0.0.0:5077")?;
    let link = UdpRadioLink::bind(&bind, own)?;

    // Discovered once at boot and pinned for the process lifetime
    let channel = settings.radio_channel()?;
    log::info!("relay running on channel {channel}");

    let broker_url = settings.get(keys::MQTT_BROKER)?;
    if broker_url.is_empty() {
        log::warn!("mqtt_broker unset, publishing to the log instead");
    }

    let gateway_name = settings.device_name("House")?;
    // Board sensor reports raw Fahrenheit; the thermometer converts
    let board = BoardThermometer::new(SimulatedBoardSensor::new(108.0));
    let sink = RelaySink::new(
        Box::new(LoggingBroker),
        Box::new(SystemClock),
        gateway_name,
        channel,
        Box::new(board),
    );

    let mut gateway = GatewayProtocol::new(link, sink, settings.status_every()?);
    gateway.run()
}
