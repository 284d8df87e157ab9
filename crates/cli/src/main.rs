//! `rvima`: boots a kernel image under the bare-metal RV32IMA emulator.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use rvima_core::config::Config;
use rvima_core::core::units::cache::LineCache;
use rvima_core::soc::backing_store::InMemoryStore;
use rvima_core::soc::bus::MemoryBusAdapter;
use rvima_core::soc::devices::uart::{ConsoleSink, KeyboardSource, Uart};
use rvima_core::sim::platform::{Platform, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "rvima", author, version, about = "Bare-metal RV32IMA emulator with a write-back line cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot a kernel image.
    Run {
        /// Kernel image to load at the base of guest RAM.
        kernel: String,

        /// Device tree blob, placed at the top of guest RAM.
        #[arg(long)]
        dtb: Option<String>,

        /// Guest RAM size in bytes. Overrides the config file / default.
        #[arg(long)]
        ram_size: Option<u32>,

        /// Path to a JSON config file (see `rvima_core::config::Config`).
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { kernel, dtb, ram_size, config } => cmd_run(&kernel, dtb.as_deref(), ram_size, config.as_deref()),
    }
}

fn cmd_run(kernel_path: &str, dtb_path: Option<&str>, ram_size_override: Option<u32>, config_path: Option<&str>) -> ExitCode {
    let mut config = load_config(config_path);
    if let Some(size) = ram_size_override {
        config.system.ram_size = size;
    }

    let kernel: Arc<[u8]> = match std::fs::read(kernel_path) {
        Ok(bytes) => bytes.into(),
        Err(err) => {
            eprintln!("failed to read kernel image {kernel_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let dtb: Arc<[u8]> = match dtb_path {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => bytes.into(),
            Err(err) => {
                eprintln!("failed to read device tree blob {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Arc::from(&[][..]),
    };

    let store = InMemoryStore::new(config.system.ram_size as usize);
    let cache = LineCache::new(store, config.cache.sets, config.cache.ways, config.cache.line_bytes);
    let uart = Uart::new(StdinKeyboard::new(), StdoutConsole);
    let bus = MemoryBusAdapter::new(cache, config.system.ram_size, uart);

    let mut platform = match Platform::new(bus, config, kernel, dtb) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to load guest images: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = platform.run();
    platform.stats().print_sections();

    match outcome {
        Ok(RunOutcome::PowerOff) => ExitCode::SUCCESS,
        Ok(RunOutcome::Interrupted) => {
            eprintln!("interrupted");
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("host error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&str>) -> Config {
    let Some(path) = path else { return Config::default() };
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            eprintln!("invalid config file {path}: {err}, using defaults");
            Config::default()
        }),
        Err(err) => {
            eprintln!("failed to read config file {path}: {err}, using defaults");
            Config::default()
        }
    }
}

/// Reads keyboard bytes from the process's stdin without ever blocking the
/// guest: a background thread blocks on stdin and feeds bytes over a
/// channel, which `has_byte`/`take_byte` drain non-blockingly.
struct StdinKeyboard {
    queue: VecDeque<u8>,
    rx: Receiver<u8>,
}

impl StdinKeyboard {
    fn new() -> Self {
        let (tx, rx) = channel();
        thread::spawn(move || {
            let mut buf = [0u8; 1];
            let stdin = io::stdin();
            let mut handle = stdin.lock();
            while io::Read::read_exact(&mut handle, &mut buf).is_ok() {
                if tx.send(buf[0]).is_err() {
                    break;
                }
            }
        });
        Self { queue: VecDeque::new(), rx }
    }

    fn drain_channel(&mut self) {
        while let Ok(byte) = self.rx.try_recv() {
            self.queue.push_back(byte);
        }
    }
}

impl KeyboardSource for StdinKeyboard {
    fn has_byte(&mut self) -> bool {
        self.drain_channel();
        !self.queue.is_empty()
    }

    fn take_byte(&mut self) -> Option<u8> {
        self.drain_channel();
        self.queue.pop_front()
    }
}

struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn put_byte(&mut self, byte: u8) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(&[byte]);
        let _ = lock.flush();
    }
}
