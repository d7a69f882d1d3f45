//! An in-process scripted specMech.
//!
//! The mock accepts connections, reads `\r`-terminated commands, and answers
//! with whatever the scripted handler returns. An empty reply makes the mock
//! stay silent, which is how the timeout tests starve the client.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use specmech_client::bus::{BusCommand, Severity};
use specmech_client::config::{
    AlertsConfig, CollimatorConfig, Config, Setpoint, Sp2AlertsConfig, SpecMechConfig,
    TimeoutsConfig,
};

pub fn xor_checksum(body: &str) -> String {
    let checksum = body.bytes().fold(0u8, |acc, byte| acc ^ byte);
    format!("{:02X}", checksum)
}

/// Wraps a sentence body in `$...*HH`.
pub fn nmea(body: &str) -> String {
    format!("${}*{}", body, xor_checksum(body))
}

/// Builds a complete reply: echo of `command`, data sentences, terminator.
///
/// Each entry of `data` is a sentence body without the `S2` prefix, e.g.
/// `PNU,,o,,c,,o,,1`.
pub fn reply(command: &str, data: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();

    out.extend(nmea(&format!("S2CMD,{}", command)).bytes());
    out.extend(b"\r");

    if data.is_empty() {
        out.extend(b"\n");
    } else {
        out.extend(b"\n");
        let sentences: Vec<String> = data
            .iter()
            .map(|body| nmea(&format!("S2{}", body)))
            .collect();
        out.extend(sentences.join("\r\x00\n").bytes());
        out.extend(b"\r\n");
    }

    out.extend(b">");
    out
}

/// Starts the mock on an ephemeral port and returns its address.
///
/// The handler receives each command exactly as framed, without the `\r`.
pub async fn spawn_mock<F>(mut handler: F) -> SocketAddr
where
    F: FnMut(&str) -> Vec<u8> + Send + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut line = Vec::new();
            let mut byte = [0u8; 1];

            loop {
                match socket.read(&mut byte).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) if byte[0] == b'\r' => {
                        let command = String::from_utf8_lossy(&line).to_string();
                        line.clear();

                        let response = handler(&command);
                        if response.is_empty() {
                            continue;
                        }
                        if socket.write_all(&response).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => line.push(byte[0]),
                }
            }
        }
    });

    addr
}

/// A configuration pointing at the mock, with fast pneumatic polling.
pub fn test_config(addr: SocketAddr) -> Config {
    Config {
        spec_mech: SpecMechConfig {
            address: addr.ip().to_string(),
            port: addr.port(),
            write_log: false,
            sequence_id_mode: Default::default(),
            motors: CollimatorConfig {
                min_encoder: 0,
                max_encoder: 20000,
                min_microns: 100,
                max_microns: 2900,
                speed_microns_per_sec: 25.0,
                home_position: 1500,
                tolerance: 2.0,
            },
        },
        timeouts: TimeoutsConfig {
            pneumatics: 0.1,
            controller: 3.0,
        },
        alerts: AlertsConfig {
            sp2: Sp2AlertsConfig {
                r2_ccd_status_param: "mod2/tempa".to_string(),
                b2_ccd_status_param: "mod12/tempa".to_string(),
                r2_ln2_status_param: "mod2/tempb".to_string(),
                b2_ln2_status_param: "mod12/tempb".to_string(),
                r2_setpoint_param: Setpoint::Fixed(-98.0),
                b2_setpoint_param: Setpoint::Fixed(-98.0),
                ln2_base_temperature: Setpoint::Fixed(-180.0),
                ccd_temperature_max_increase: 5.0,
                ln2_temperature_max_increase: 10.0,
                interval: 60.0,
            },
        },
    }
}

/// Command handle that records everything written to it.
#[derive(Debug, Default)]
pub struct Recorder {
    pub writes: Mutex<Vec<(Severity, Value)>>,
    pub finishes: Mutex<Vec<Option<Value>>>,
    pub failures: Mutex<Vec<Value>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(written, _)| *written == severity)
            .count()
    }
}

impl BusCommand for Recorder {
    fn write(&self, severity: Severity, message: Value) {
        self.writes.lock().unwrap().push((severity, message));
    }

    fn finish(&self, message: Option<Value>) {
        self.finishes.lock().unwrap().push(message);
    }

    fn fail(&self, message: Value) {
        self.failures.lock().unwrap().push(message);
    }
}
