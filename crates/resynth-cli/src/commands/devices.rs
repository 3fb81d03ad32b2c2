//! Audio device listing command.

use clap::{Args, Subcommand};
use resynth_io::{AudioDevice, default_device, list_devices};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all available audio devices
    List,

    /// Show default device information
    Info,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No audio devices found.");
                return Ok(());
            }

            println!("Available Audio Devices");
            println!("=======================\n");

            let inputs: Vec<_> = devices.iter().filter(|d| d.is_input).collect();
            let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
            print_section("Input Devices:", &inputs, |d| d.is_output, " (also output)");
            print_section("Output Devices:", &outputs, |d| d.is_input, " (also input)");

            println!(
                "Total: {} input(s), {} output(s)",
                inputs.len(),
                outputs.len()
            );
            println!();
            println!("Tip: Use device index or partial name with --input-device/--output-device:");
            println!("  resynth run --live --input-device 0 --output-device 0");
            println!("  resynth run --stream guitar.wav --output-device \"USB\"");
        }

        DevicesCommand::Info => {
            let (input, output) = default_device()?;

            println!("Default Audio Devices");
            println!("=====================\n");
            print_default("Input", input.as_ref());
            println!();
            print_default("Output", output.as_ref());
        }
    }

    Ok(())
}

fn print_section(
    title: &str,
    devices: &[&AudioDevice],
    also: impl Fn(&AudioDevice) -> bool,
    also_label: &str,
) {
    if devices.is_empty() {
        return;
    }
    println!("{title}");
    for (idx, device) in devices.iter().enumerate() {
        let suffix = if also(device) { also_label } else { "" };
        println!(
            "  [{}] {} ({} Hz){}",
            idx, device.name, device.default_sample_rate, suffix
        );
    }
    println!();
}

fn print_default(kind: &str, device: Option<&AudioDevice>) {
    match device {
        Some(device) => {
            println!("Default {kind}:");
            println!("  Name: {}", device.name);
            println!("  Sample Rate: {} Hz", device.default_sample_rate);
        }
        None => println!("Default {kind}: None"),
    }
}
