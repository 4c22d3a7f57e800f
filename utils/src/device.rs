use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// The input device called `device_name`, or the host's default input.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    match device_name {
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device")),
        Some(target) => host
            .input_devices()?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .ok_or_else(|| anyhow::anyhow!("No input device named {}", target)),
    }
}

/// The output device called `device_name`, or the host's default output.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();

    match device_name {
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default output device")),
        Some(target) => host
            .output_devices()?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .ok_or_else(|| anyhow::anyhow!("No output device named {}", target)),
    }
}

fn describe(
    name: String,
    config: anyhow::Result<cpal::SupportedStreamConfig>,
    default: &str,
) -> String {
    let mut d = match config {
        Ok(config) => format!(
            " * {}({}ch, {}hz)",
            name,
            config.channels(),
            config.sample_rate().0
        ),
        Err(_) => format!(" * {}", name),
    };
    if name == default {
        d.push_str(" [default]");
    }
    d
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut device_names: Vec<String> = Vec::new();
    for in_device in host.input_devices()? {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        let d_cfg = in_device.default_input_config().map_err(anyhow::Error::from);
        device_names.push(describe(d_name, d_cfg, &default_device));
    }
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut device_names: Vec<String> = Vec::new();
    for out_device in host.output_devices()? {
        let Ok(d_name) = out_device.name() else {
            continue;
        };
        let d_cfg = out_device.default_output_config().map_err(anyhow::Error::from);
        device_names.push(describe(d_name, d_cfg, &default_device));
    }
    Ok(device_names.join("\n"))
}
