mod telemetry;

use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use telemetry::DeviceReport;
use tracing::{error, info, warn};
use ureq::Agent;

const PLATFORMS: &[&str] = &["XRP-Web", "XRP-Beta", "MicroPython", "Blockly"];

#[derive(Debug, Parser)]
#[command(about = "Posts simulated device reports to a telemetry collector")]
struct Args {
    /// Collector base URL
    #[arg(long, env = "COLLECTOR_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Reports per second
    #[arg(long, env = "RATE", default_value_t = 10)]
    rate: u64,

    /// Number of simulated devices
    #[arg(long, env = "DEVICES", default_value_t = 20)]
    devices: usize,

    /// Distinct networks the devices report from (devices share their network's IP)
    #[arg(long, env = "NETWORKS", default_value_t = 4)]
    networks: usize,

    /// Stop after this many reports (0 runs until interrupted)
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,
}

struct Device {
    xrp_id: String,
    platform: String,
    network_ip: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting device simulator");
    info!(
        "Collector: {}, Rate: {} req/s, Devices: {}, Networks: {}",
        args.url, args.rate, args.devices, args.networks
    );

    let mut rng = rand::thread_rng();
    let devices = make_devices(&mut rng, args.devices.max(1), args.networks.max(1));

    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(10)))
        .build()
        .into();
    let endpoint = format!("{}/data", args.url.trim_end_matches('/'));
    let interval = Duration::from_millis(1000 / args.rate.max(1));

    let mut counter = 0u64;
    let mut failures = 0u64;

    loop {
        if args.count > 0 && counter >= args.count {
            break;
        }

        let device = &devices[(counter as usize) % devices.len()];
        let report = generate_report(&mut rng, device);
        let agent = agent.clone();
        let endpoint = endpoint.clone();
        let ip = device.network_ip.clone();

        let sent = tokio::select! {
            result = tokio::task::spawn_blocking(move || post_report(&agent, &endpoint, &ip, &report)) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        };

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                warn!("Failed to post report: {}", e);
            }
            Err(e) => {
                failures += 1;
                error!("Report task failed: {}", e);
            }
        }

        counter += 1;
        if counter % 100 == 0 {
            info!("Posted {} reports ({} failed)", counter, failures);
        }

        tokio::time::sleep(interval).await;
    }

    info!("Posted {} reports ({} failed)", counter, failures);
}

fn make_devices(rng: &mut impl Rng, count: usize, networks: usize) -> Vec<Device> {
    let network_ips: Vec<String> = (0..networks)
        .map(|_| {
            format!(
                "{}.{}.{}.{}",
                rng.gen_range(11..=223),
                rng.gen_range(0..=255),
                rng.gen_range(0..=255),
                rng.gen_range(1..=254)
            )
        })
        .collect();

    (0..count)
        .map(|i| Device {
            xrp_id: uuid::Uuid::new_v4().simple().to_string()[..12].to_string(),
            platform: PLATFORMS
                .choose(rng)
                .copied()
                .unwrap_or("XRP-Web")
                .to_string(),
            network_ip: network_ips[i % network_ips.len()].clone(),
        })
        .collect()
}

fn generate_report(rng: &mut impl Rng, device: &Device) -> DeviceReport {
    // Roughly a third of the reports come over BLE
    let ble = if rng.gen_bool(0.3) {
        Some(json!({
            "name": format!("XRP-{}", &device.xrp_id[..4]),
            "rssi": rng.gen_range(-95..-30),
        }))
    } else {
        None
    };

    DeviceReport {
        xrp_id: device.xrp_id.clone(),
        platform: Some(device.platform.clone()),
        ble,
    }
}

fn post_report(agent: &Agent, endpoint: &str, ip: &str, report: &DeviceReport) -> Result<(), ureq::Error> {
    agent
        .post(endpoint)
        .header("X-Forwarded-For", ip)
        .header("User-Agent", "xrp-simulator/0.1")
        .send_json(report)?;
    Ok(())
}
