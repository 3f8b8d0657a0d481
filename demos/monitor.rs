use hidapi::HidApi;
use hxi_psu::{
    channel::{InboundHandler, SessionConfig},
    command::{CORSAIR_VENDOR_ID, SupportedModel},
    hwmon::{Attribute, CHANNEL_INFO, HwmonChip},
    psu::HxiPsu,
    transport::HidapiTransport,
};
use inquire::Select;
use tracing_subscriber::EnvFilter;

// Configuration constants - adjust these for your setup
// Raise this if readings regularly come back as "no data".
const RESPONSE_TIMEOUT_MS: u32 = 300;
const POLL_INTERVAL_MS: u64 = 2000;
const POLL_COUNT: usize = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api = HidApi::new().expect("Failed to initialise hidapi");

    // Find every supported PSU
    let mut found: Vec<_> = api
        .device_list()
        .filter(|info| info.vendor_id() == CORSAIR_VENDOR_ID)
        .filter_map(|info| {
            SupportedModel::from_ids(info.vendor_id(), info.product_id())
                .map(|model| (format!("{} ({:?})", model.name(), info.path()), info, model))
        })
        .collect();

    if found.is_empty() {
        eprintln!("No supported PSU found!");
        std::process::exit(1);
    }

    // Interactive selection when more than one is connected
    let (_, info, model) = if found.len() == 1 {
        found.remove(0)
    } else {
        let names: Vec<String> = found.iter().map(|(name, _, _)| name.clone()).collect();
        let choice = Select::new("Select a PSU:", names)
            .prompt()
            .expect("Failed to select PSU");
        let index = found
            .iter()
            .position(|(name, _, _)| *name == choice)
            .expect("Selection not in list");
        found.remove(index)
    };

    println!("Using {}", model.name());

    let device = info.open_device(&api).expect("Failed to open PSU");
    let inbound = InboundHandler::new();
    let transport = HidapiTransport::from_device(device, model, inbound.clone());
    let timeout = fugit::MillisDurationU32::millis(RESPONSE_TIMEOUT_MS);
    let config = SessionConfig::default().with_response_timeout(timeout);
    let chip = HwmonChip::new(HxiPsu::with_config(transport, inbound, config));

    for _ in 0..POLL_COUNT {
        println!("\n--- {} ---", chip.name());
        for info in CHANNEL_INFO {
            for channel in 0..info.count {
                let label = chip
                    .read_string(info.sensor_type, Attribute::Label, channel)
                    .unwrap_or("-");
                let value = match chip.read(info.sensor_type, Attribute::Input, channel) {
                    Ok(value) => value.to_string(),
                    Err(err) => err.to_string(),
                };
                println!("{:?}[{}] {:>5}: {}", info.sensor_type, channel, label, value);
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS));
    }
}
