//! pada-io - command-line front-end for the foot pedal configuration session
//!
//! ```text
//! pada-io ports                          list serial ports
//! pada-io --port /dev/ttyACM0 info       show the device layout
//! pada-io --port /dev/ttyACM0 load       print the stored mapping
//! pada-io --mock save --set 3:value=74   edit and write back
//! ```

use clap::{Parser, Subcommand};
use pada_io::config::Config;
use pada_io::core::types::LAYER_COUNT;
use pada_io::error::{Error, Result};
use pada_io::orchestrator::{SessionEvent, SyncOrchestrator};
use pada_io::transport::{LinkOpener, SerialLinkOpener, list_ports};
use pada_io::view::{LayerPosition, render_layer};
use pada_io::SlotField;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pada-io")]
#[command(about = "Configure a three-layer MIDI foot pedal over serial")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "pada.toml")]
    config: PathBuf,

    /// Serial port, overrides the config file
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overrides the config file
    #[arg(short, long)]
    baud: Option<u32>,

    /// Talk to a simulated pedal instead of a serial port
    #[arg(long)]
    mock: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Discover the device layout and hardware types
    Info,

    /// Read the stored mapping from the device
    Load {
        /// Layer to print (1-3); all layers if omitted
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
        layer: Option<u8>,
    },

    /// Edit slots and write the full mapping back to EEPROM
    Save {
        /// Edit as <slot>:<field>=<value>, e.g. 3:value=74 or 0:mode=toggle
        #[arg(short = 's', long = "set", value_parser = parse_edit, required = true)]
        edits: Vec<(usize, SlotField)>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path
        path: PathBuf,
    },
}

fn parse_edit(s: &str) -> std::result::Result<(usize, SlotField), String> {
    let (index, field) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <slot>:<field>=<value>, got '{}'", s))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not a slot index", index))?;
    let field = field.parse::<SlotField>().map_err(|e| e.to_string())?;
    Ok((index, field))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    match &args.command {
        Commands::Ports => print_ports(),
        Commands::InitConfig { path } => {
            Config::default().to_file(path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        Commands::Info => {
            let mut orchestrator = connect(&args, &config)?;
            orchestrator.discover_layout()?;
            print_layout(&orchestrator);
            orchestrator.close();
            Ok(())
        }
        Commands::Load { layer } => {
            let mut orchestrator = connect(&args, &config)?;
            orchestrator.discover_layout()?;
            load_tolerant(&mut orchestrator)?;
            match layer.and_then(|l| LayerPosition::from_layer(l as usize - 1)) {
                Some(position) => print_layer(&orchestrator, position),
                None => {
                    for position in LayerPosition::ALL {
                        print_layer(&orchestrator, position);
                    }
                }
            }
            orchestrator.close();
            Ok(())
        }
        Commands::Save { edits, yes } => {
            let mut orchestrator = connect(&args, &config)?;
            orchestrator.discover_layout()?;
            load_tolerant(&mut orchestrator)?;

            for (index, field) in edits {
                orchestrator.update_slot(*index, *field)?;
                println!("Slot {}: {}", index, field);
            }

            if !*yes && !confirm("Overwrite device settings?")? {
                println!("Aborted, nothing written");
                orchestrator.close();
                return Ok(());
            }

            let result = orchestrator.save_current();
            println!("{}", orchestrator.last_status_message());
            orchestrator.close();
            result
        }
    }
}

fn print_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for (name, kind) in ports {
        println!("{:<24} {}", name, kind);
    }
    Ok(())
}

/// Build an orchestrator and open the selected link
fn connect(args: &Args, config: &Config) -> Result<SyncOrchestrator> {
    let mut orchestrator = SyncOrchestrator::new(config);
    orchestrator.subscribe(Box::new(|event: &SessionEvent| {
        if let SessionEvent::StatusChanged(status) = event {
            log::info!("{}", status);
        }
    }));

    let mut opener = if args.mock {
        mock_opener(config)?
    } else {
        Box::new(SerialLinkOpener::new(
            config.serial.port.clone(),
            config.serial.baud_rate,
            config.protocol.poll_slice(),
        )) as Box<dyn LinkOpener>
    };
    orchestrator.open(opener.as_mut())?;
    Ok(orchestrator)
}

#[cfg(feature = "mock")]
fn mock_opener(config: &Config) -> Result<Box<dyn LinkOpener>> {
    use pada_io::core::clock::SystemClock;
    use pada_io::devices::SimulatedPedal;
    use pada_io::transport::PreparedLink;
    use std::sync::Arc;

    let pedal = SimulatedPedal::new(Arc::new(SystemClock), config.layout.slots_per_layer);
    Ok(Box::new(PreparedLink::named(
        Box::new(pedal),
        "simulated pedal",
    )))
}

#[cfg(not(feature = "mock"))]
fn mock_opener(_config: &Config) -> Result<Box<dyn LinkOpener>> {
    Err(Error::Other(
        "--mock needs a build with the `mock` feature".to_string(),
    ))
}

/// Load, treating a missing completion token as a warning
fn load_tolerant(orchestrator: &mut SyncOrchestrator) -> Result<()> {
    match orchestrator.load_configuration() {
        Ok(_) => Ok(()),
        Err(Error::LoadIncomplete { records }) => {
            log::warn!("Device did not finish its dump; using {} slots received", records);
            eprintln!("Warning: load incomplete, {} slots received", records);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_layout(orchestrator: &SyncOrchestrator) {
    println!(
        "Controls per layer: {} ({} layers, {} slots)",
        orchestrator.slots_per_layer(),
        LAYER_COUNT,
        orchestrator.slots().len()
    );
    let caps = orchestrator.capabilities();
    if caps.is_empty() {
        println!("No hardware types reported; all slots treated as buttons");
    }
    for (index, capability) in caps.iter() {
        println!("  slot {}: {}", index, capability);
    }
    if orchestrator.capabilities_stale() {
        println!("Warning: hardware types may not match the stored layout");
    }
}

fn print_layer(orchestrator: &SyncOrchestrator, position: LayerPosition) {
    println!(
        "{}",
        render_layer(
            orchestrator.slots(),
            orchestrator.capabilities(),
            orchestrator.slots_per_layer(),
            position,
        )
    );
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
