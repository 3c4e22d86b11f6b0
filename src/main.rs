use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hexplay::HexViewBuilder;
use log::{info, warn};

use daikin_ir::{
    config::Config,
    daikin::{Controller, Fan, Mode, Model, Phy, Preset, StateChange, Swing},
    modem::{create_device, DeviceError, DeviceType},
    smartir,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Daikin IR remote emulator", long_about = None)]
struct Cli {
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// JSON unit configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the remote model from the configuration
    #[arg(short, long, global = true)]
    model: Option<Model>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a climate state and write it to a device
    Encode {
        #[arg(long)]
        mode: Option<Mode>,
        #[arg(short, long)]
        temperature: Option<f32>,
        #[arg(long)]
        fan: Option<Fan>,
        #[arg(long)]
        swing: Option<Swing>,
        #[arg(long)]
        preset: Option<Preset>,

        /// lines:hex, lines:base64 or lines:raw
        #[arg(short, long, default_value = "lines:base64")]
        output: DeviceType,
    },

    /// Read captures of the unit's own remote and print the state they carry
    Decode {
        #[arg(short, long, default_value = "lines:hex")]
        input: DeviceType,

        /// Dump the bytes of every frame
        #[arg(long)]
        dump: bool,
    },

    /// Print a SmartIR code file for the configured model
    Smartir,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    info!("using remote model {}", config.model);

    match cli.command {
        Command::Encode {
            mode,
            temperature,
            fan,
            swing,
            preset,
            output,
        } => {
            let mut controller = Controller::from_config(&config, create_device(output));
            let change = StateChange {
                mode,
                target_temperature: temperature,
                fan,
                swing,
                preset,
            };

            // A fresh controller dedups against the default state, always send
            if !controller.request_state_change(&change) && !controller.transmit_state() {
                anyhow::bail!("failed to write command");
            }
        }

        Command::Decode { input, dump } => {
            let phy = Phy::new();
            let mut controller = Controller::from_config(&config, create_device(input));

            loop {
                let recording = match controller.transmitter_mut().recv() {
                    Ok(recording) => recording,
                    Err(DeviceError::EOF) => break,
                    Err(e) => return Err(e.into()),
                };

                if dump {
                    match phy.decode(recording.pulses.iter().copied()) {
                        Ok(frames) => {
                            for frame in frames {
                                println!("{}", HexViewBuilder::new(&frame).row_width(16).finish());
                            }
                        }
                        Err(e) => warn!("failed to decode pulses: {}", e),
                    }
                }

                match controller.receive(&phy, recording.pulses.into_iter()) {
                    Ok(_) => println!("{:?}", controller.state()),
                    Err(e) => warn!("ignoring capture: {}", e),
                }
            }
        }

        Command::Smartir => {
            let code_file = smartir::gen_smartir(config.model);
            println!("{}", serde_json::to_string_pretty(&code_file)?);
        }
    }

    Ok(())
}
