mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use arm7gba_core::{log_buffer, System};
use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(version, about = "Runs the ARM code of a Game Boy Advance ROM image.", long_about = None)]
struct Args {
    /// ROM image; defaults to the most recent one in the config.
    #[arg(name = "ROM_PATH")]
    rom_path: Option<PathBuf>,

    /// BIOS image. Without one the run starts at the cartridge entry point.
    #[arg(long)]
    bios: Option<PathBuf>,

    /// Cycle budget for this run.
    #[arg(long)]
    cycles: Option<u64>,

    /// off, error, warn, info, debug or trace.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the register state as TOML after the run.
    #[arg(long)]
    dump: bool,

    /// Do not update the config file.
    #[arg(long)]
    no_save: bool,
}

#[derive(Serialize)]
struct RegisterDump {
    cycles: u64,
    mode: String,
    state: String,
    cpsr: String,
    spsr: Option<String>,
    registers: Vec<String>,
}

impl RegisterDump {
    fn capture(system: &System) -> Self {
        let cpu = system.cpu();
        Self {
            cycles: system.bus().cycles(),
            mode: format!("{:?}", cpu.mode()),
            state: format!("{:?}", cpu.state()),
            cpsr: format!("{:#010X}", cpu.cpsr().raw()),
            spsr: cpu.spsr().map(|v| format!("{v:#010X}")),
            registers: cpu.registers().snapshot().iter().map(|r| format!("{r:#010X}")).collect(),
        }
    }
}

fn print_logs() {
    let dropped = log_buffer::dropped_logs();
    if dropped > 0 {
        eprintln!("({dropped} older log records dropped)");
    }
    for entry in log_buffer::drain_logs() {
        eprintln!("{entry}");
    }
}

fn parse_level(name: &str) -> Result<LevelFilter> {
    name.parse()
        .map_err(|e| anyhow::anyhow!("invalid log level {name:?}: {e}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load().context("loading config")?;

    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.log_level))?;
    if log_buffer::init_logger(level, config.log_capacity).is_err() {
        eprintln!("a logger is already installed; log output is disabled");
    }

    let rom_path = args
        .rom_path
        .or_else(|| config.recent_roms.first().cloned())
        .context("no ROM_PATH given and no recent ROM in the config")?;
    let bios = args.bios.clone().or_else(|| config.bios.clone());
    let budget = args.cycles.unwrap_or(config.cycle_budget);

    let mut system = System::new();
    if let Some(bios) = &bios {
        system
            .load_bios_file(bios)
            .with_context(|| format!("loading BIOS {}", bios.display()))?;
    }
    system
        .load_rom_file(&rom_path)
        .with_context(|| format!("loading ROM {}", rom_path.display()))?;

    info!("running {} for {budget} cycles", rom_path.display());
    let outcome = system.run_cycles(budget);

    print_logs();
    if args.dump {
        let dump = toml::to_string(&RegisterDump::capture(&system)).context("serializing register dump")?;
        print!("{dump}");
    }

    if !args.no_save {
        config.add_recent(rom_path);
        if args.bios.is_some() {
            config.bios = bios;
        }
        config.save().context("saving config")?;
    }

    let spent = outcome.context("execution stopped")?;
    println!("{spent} cycles, PC {:#010X}", system.cpu().pc());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_after_reset() {
        let system = System::new();
        let text = toml::to_string(&RegisterDump::capture(&system)).unwrap();
        assert!(text.contains("mode = \"Supervisor\""));
        assert!(text.contains("state = \"Arm\""));
        assert!(text.contains("cpsr = \"0x000000D3\""));
        assert!(text.contains("cycles = 0"));
    }

    #[test]
    fn dump_lists_sixteen_registers() {
        let mut system = System::new();
        system.load_rom(&0xEAFF_FFFEu32.to_le_bytes()).unwrap();
        let dump = RegisterDump::capture(&system);
        assert_eq!(dump.registers.len(), 16);
        assert_eq!(dump.registers[15], "0x08000000");
        assert_eq!(dump.registers[13], "0x03007F00");
        assert_eq!(dump.spsr, None);
    }

    #[test]
    fn log_level_names() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("OFF").unwrap(), LevelFilter::Off);
        let err = parse_level("loud").unwrap_err();
        assert!(err.to_string().contains("invalid log level \"loud\""));
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["arm7gba", "game.gba", "--cycles", "500", "--dump", "--no-save"]);
        assert_eq!(args.rom_path, Some(PathBuf::from("game.gba")));
        assert_eq!(args.cycles, Some(500));
        assert!(args.dump && args.no_save);
        assert!(args.bios.is_none());
    }
}
