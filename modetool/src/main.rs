use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, LevelFilter, Log, Metadata, Record};

use tvout::config::HardwareGeneration;
use tvout::hdmi::infoframe::{self, Infoframe};
use tvout::hdmi::layout::{self, RegisterLayout};
use tvout::hdmi::{self, phy};
use tvout::mode::{cea_mode, cea_vic, DisplayMode, PRESETS};

/// Inspect what the TV output driver would program for a display mode
#[derive(Parser)]
#[command(name = "modetool", version)]
struct Args {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the named modes and which generations accept them
    Modes,

    /// Print the register layout for a mode
    Layout {
        /// Preset name (see `modes`) or CEA VIC number
        mode: String,

        /// Hardware generation: 1 or 2
        #[arg(short, long, default_value = "2", value_parser = parse_generation)]
        gen: HardwareGeneration,
    },

    /// Print the PHY calibration blob for a pixel clock
    Phy {
        /// Pixel clock in Hz
        clock: u32,

        /// Hardware generation: 1 or 2
        #[arg(short, long, default_value = "2", value_parser = parse_generation)]
        gen: HardwareGeneration,
    },

    /// Print the AVI infoframe for a mode
    Infoframe {
        /// Preset name (see `modes`) or CEA VIC number
        mode: String,
    },

    /// Print audio clock recovery N/CTS for a sample rate
    Acr {
        /// Sample rate in Hz
        rate: u32,
    },
}

fn parse_generation(s: &str) -> Result<HardwareGeneration, String> {
    HardwareGeneration::from_name(s).ok_or_else(|| format!("unknown generation '{}', expected 1 or 2", s))
}

fn parse_mode(name: &str) -> Result<DisplayMode, String> {
    if let Some((_, mode)) = PRESETS.iter().find(|(n, _)| *n == name) {
        return Ok(*mode);
    }
    name.parse::<u8>()
        .ok()
        .and_then(cea_mode)
        .ok_or_else(|| format!("unknown mode '{}' (try `modetool modes`)", name))
}

// =============================================================================
// Logging
// =============================================================================

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// =============================================================================
// Commands
// =============================================================================

fn accepted(mode: &DisplayMode, generation: HardwareGeneration) -> &'static str {
    if hdmi::check_timing(mode, generation).is_ok() {
        "yes"
    } else {
        "-"
    }
}

fn list_modes() {
    println!(
        "{:<10} {:>11} {:>4} {:>9} {:>4} {:>5} {:>5}",
        "NAME", "SIZE", "SCAN", "CLOCK", "VIC", "GEN1", "GEN2"
    );
    for (name, mode) in PRESETS {
        println!(
            "{:<10} {:>11} {:>4} {:>9.3} {:>4} {:>5} {:>5}",
            name,
            format!("{}x{}", mode.hdisplay, mode.vdisplay),
            format!("{}{}", mode.refresh(), if mode.is_interlaced() { "i" } else { "p" }),
            mode.clock_hz as f64 / 1e6,
            cea_vic(mode),
            accepted(mode, HardwareGeneration::Gen1),
            accepted(mode, HardwareGeneration::Gen2),
        );
    }
}

fn print_layout(mode: &DisplayMode, generation: HardwareGeneration) -> Result<(), String> {
    if let Err(e) = hdmi::check_timing(mode, generation) {
        println!("⚠️  {:?} would reject {} at check_timing: {}", generation, mode, e);
    }
    let config = layout::translate(mode, generation).map_err(|e| e.to_string())?;
    debug!("translated {} for {:?}", mode, generation);

    println!("mode:        {}", mode);
    println!("pixel clock: {} Hz", config.pixel_clock);
    println!("vic:         {}", config.vic);
    println!("interlaced:  {}", config.interlaced);
    if layout::is_wide_900_quirk(mode) {
        println!("quirk:       1440x900 active-area shift applied");
    }
    match &config.layout {
        RegisterLayout::Gen1(preset) => println!("{:#?}", preset),
        RegisterLayout::Gen2(gen2) => println!("{:#?}", gen2),
    }
    Ok(())
}

fn print_phy(clock: u32, generation: HardwareGeneration) -> Result<(), String> {
    let entry = phy::select(clock, generation).map_err(|_| {
        let known: Vec<String> = phy::table(generation)
            .iter()
            .map(|e| e.pixel_clock.to_string())
            .collect();
        format!("no {:?} PHY entry for {} Hz (known: {})", generation, clock, known.join(", "))
    })?;

    println!("{:?} PHY entry for {} Hz ({} bytes):", generation, entry.pixel_clock, entry.blob.len());
    for chunk in entry.blob.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        println!("  {}", line.join(" "));
    }
    Ok(())
}

fn print_infoframe(mode: &DisplayMode) {
    let vic = cea_vic(mode);
    if vic == 0 {
        println!("⚠️  {} has no CEA VIC; the AVI frame carries VIC 0", mode);
    }
    let frame = Infoframe::avi(vic);
    let header = [frame.kind as u8, frame.version, frame.length()];
    let payload: Vec<String> = frame.payload.iter().map(|b| format!("{:02x}", b)).collect();

    println!("header:   {:02x} {:02x} {:02x}", header[0], header[1], header[2]);
    println!("payload:  {}", payload.join(" "));
    println!("checksum: {:02x}", frame.checksum);

    let sum = header
        .iter()
        .chain(frame.payload.iter())
        .fold(frame.checksum as u32, |acc, b| acc + *b as u32);
    println!("sum mod 256: {}", sum % 256);
    debug!(
        "checksum recomputed as {:02x}",
        infoframe::checksum(header[0], header[1], header[2], &frame.payload)
    );
}

fn print_acr(rate: u32) {
    let values = infoframe::acr(rate);
    if values.n == 0 {
        println!("⚠️  no N/CTS entry for {} Hz; the driver would program zeros", rate);
    }
    println!("N   = {}", values.n);
    println!("CTS = {}", values.cts);
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::Modes => {
            list_modes();
            Ok(())
        }
        Command::Layout { mode, gen } => parse_mode(&mode).and_then(|m| print_layout(&m, gen)),
        Command::Phy { clock, gen } => print_phy(clock, gen),
        Command::Infoframe { mode } => parse_mode(&mode).map(|m| print_infoframe(&m)),
        Command::Acr { rate } => {
            print_acr(rate);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("modetool: {}", e);
            ExitCode::FAILURE
        }
    }
}
