use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vdrive_storage::{
    autodetect, BackendKind, BackendSelect, Completion, CompletionTracker, Drive, DriveConfig,
    Geometry, ImageKind, IoStatus, SegmentedLayout, SECTOR_SIZE,
};

// Per-invocation cap on sectors read or written.
const MAX_SECTORS_PER_COMMAND: u64 = 4096;

#[derive(Parser, Debug)]
#[command(
    name = "vdrive-img",
    about = "Inspect and exercise emulator disk images through the virtual drive layer."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open an image and print its size and CHS geometry
    Info {
        #[command(flatten)]
        drive: DriveArgs,

        /// Print machine-readable JSON instead of text
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },
    /// Classify a path without opening it
    Detect { path: PathBuf },
    /// Hex-dump sectors
    Read {
        #[command(flatten)]
        drive: DriveArgs,

        /// First sector to read
        #[arg(long, default_value_t = 0)]
        lba: u64,

        /// Number of sectors
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
    /// Fill sectors with a byte value, then read them back
    Write {
        #[command(flatten)]
        drive: DriveArgs,

        /// First sector to write
        #[arg(long)]
        lba: u64,

        /// Fill value (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_byte)]
        byte: u8,

        /// Number of sectors
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
    /// Describe the layout of a segmented (directory) image
    Segments { dir: PathBuf },
}

#[derive(Args, Debug)]
struct DriveArgs {
    /// Image path
    #[arg(required_unless_present = "config")]
    image: Option<PathBuf>,

    /// JSON drive description ({"path", "backend", "modifyBackingFile"})
    #[arg(long, value_name = "PATH", conflicts_with = "image")]
    config: Option<PathBuf>,

    /// Load the whole image into memory
    #[arg(long, action = clap::ArgAction::SetTrue)]
    ram: bool,

    /// Write modifications through to the image file
    #[arg(long, action = clap::ArgAction::SetTrue)]
    write_through: bool,
}

impl DriveArgs {
    fn to_config(&self) -> anyhow::Result<DriveConfig> {
        let mut config = match (&self.config, &self.image) {
            (Some(path), _) => DriveConfig::from_json_file(path)
                .with_context(|| format!("load drive config {}", path.display()))?,
            (None, Some(image)) => DriveConfig::new(image),
            (None, None) => bail!("either an image path or --config is required"),
        };
        if self.ram {
            config.backend = BackendSelect::Ram;
        }
        if self.write_through {
            config.modify_backing_file = true;
        }
        Ok(config)
    }

    fn open(&self) -> anyhow::Result<(DriveConfig, Drive)> {
        let config = self.to_config()?;
        debug!(?config, "resolved drive config");
        let drive =
            Drive::open(&config).with_context(|| format!("open {}", config.path.display()))?;
        Ok((config, drive))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DriveInfo {
    path: String,
    kind: ImageKind,
    backend: BackendKind,
    capacity_bytes: u64,
    modifies_backing_store: bool,
    geometry: Geometry,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli.command)
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Info { drive, json } => info(&drive, json),
        Command::Detect { path } => {
            let kind = autodetect(&path);
            println!("{}: {:?} ({})", path.display(), kind, kind.code());
            Ok(())
        }
        Command::Read { drive, lba, count } => read(&drive, lba, count),
        Command::Write {
            drive,
            lba,
            byte,
            count,
        } => write(&drive, lba, byte, count),
        Command::Segments { dir } => segments(&dir),
    }
}

fn info(args: &DriveArgs, json: bool) -> anyhow::Result<()> {
    let (config, drive) = args.open()?;
    let info = DriveInfo {
        path: config.path.display().to_string(),
        kind: autodetect(&config.path),
        backend: drive.backend_kind(),
        capacity_bytes: drive.capacity_bytes(),
        modifies_backing_store: drive.modifies_backing_store(),
        geometry: drive.geometry(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("serialize drive info")?
        );
        return Ok(());
    }

    let g = info.geometry;
    println!("path:      {}", info.path);
    println!("backend:   {:?}", info.backend);
    println!("capacity:  {} bytes", info.capacity_bytes);
    println!("sectors:   {}", g.sectors);
    println!(
        "geometry:  C={} H={} S={}",
        g.cylinders, g.heads, g.sectors_per_track
    );
    Ok(())
}

fn check_span(drive: &Drive, lba: u64, count: u64) -> anyhow::Result<(u64, usize)> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    if count > MAX_SECTORS_PER_COMMAND {
        bail!("refusing to touch more than {MAX_SECTORS_PER_COMMAND} sectors at once (got {count})");
    }
    let end = lba.checked_add(count).context("sector range overflows")?;
    if end > drive.total_sectors() {
        bail!(
            "sectors {lba}..{end} are outside the image ({} sectors)",
            drive.total_sectors()
        );
    }
    Ok((lba * SECTOR_SIZE as u64, count as usize * SECTOR_SIZE))
}

fn read(args: &DriveArgs, lba: u64, count: u64) -> anyhow::Result<()> {
    let (_, mut drive) = args.open()?;
    let (offset, len) = check_span(&drive, lba, count)?;

    let mut tracker = CompletionTracker::new();
    let mut buf = vec![0u8; len];
    let status = drive.read(&mut tracker, &mut buf, offset, Completion::noop())?;
    if status == IoStatus::Pending {
        bail!("backend did not complete the read synchronously");
    }
    print!("{}", hex_dump(offset, &buf));
    Ok(())
}

fn write(args: &DriveArgs, lba: u64, byte: u8, count: u64) -> anyhow::Result<()> {
    let (_, mut drive) = args.open()?;
    let (offset, len) = check_span(&drive, lba, count)?;

    let mut tracker = CompletionTracker::new();
    let data = vec![byte; len];
    drive.write(&mut tracker, &data, offset, Completion::noop())?;
    drive.flush().context("flush drive")?;

    let mut back = vec![0u8; len];
    drive.read(&mut tracker, &mut back, offset, Completion::noop())?;
    if back != data {
        bail!("read-back mismatch after write");
    }

    let persisted = drive.modifies_backing_store();
    println!(
        "wrote {count} sector(s) of {byte:#04x} at lba {lba} ({})",
        if persisted { "persisted" } else { "session only" }
    );
    Ok(())
}

fn segments(dir: &Path) -> anyhow::Result<()> {
    let layout =
        SegmentedLayout::load(dir).with_context(|| format!("load layout {}", dir.display()))?;
    let info = layout.info();
    println!("size:        {} bytes", info.size);
    println!("block size:  {} bytes", info.block_size);
    println!("blocks:      {}", layout.block_count());
    for (i, path) in layout.paths().iter().enumerate() {
        println!("path[{i}]:     {}", path.display());
    }
    Ok(())
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid byte value {s:?}: {e}"))
}

fn hex_dump(base: u64, data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for (i, line) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}:", base + (i * 16) as u64));
        for b in line {
            out.push_str(&format!(" {b:02x}"));
        }
        out.push_str("  ");
        out.extend(line.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
