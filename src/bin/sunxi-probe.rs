//! A diagnostic program for the hardware detection.
//!
//! Prints what the setup wizard would detect on this system, and optionally which boards of a
//! catalog would be offered, without showing any menus or touching the SD card.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use sunxi_bootsetup::{
    boards::{find_matches, BoardQuery},
    config::{Settings, SettingsArgs},
    hardware::{probe, SocType, SystemHardware},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    settings: SettingsArgs,

    /// Path to a `sunxi-boards.cfg` to match the detected hardware against
    #[clap(long)]
    catalog: Option<PathBuf>,

    /// Override the detected SoC type when matching
    #[clap(long)]
    soc_type: Option<SocType>,

    /// Override the detected DRAM size (MiB) when matching
    #[clap(long)]
    dram_size: Option<u32>,

    /// Override the detected DRAM bus width (bits) when matching
    #[clap(long)]
    dram_bus_width: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let settings = Settings::from(args.settings);
    let info = probe(&mut SystemHardware::new(&settings));

    println!("{}", info.summary);
    println!("  soc_type:       {:?}", info.soc_type.map(SocType::as_str));
    println!("  soc_name:       {:?}", info.soc_name);
    println!("  dram_clock:     {:?}", info.dram_clock);
    println!("  mbus_clock:     {:?}", info.mbus_clock);
    println!("  dram_size:      {:?}", info.dram_size);
    println!("  dram_bus_width: {:?}", info.dram_bus_width);

    if let Some(catalog) = args.catalog {
        let mut query = BoardQuery::from(&info);
        query.soc_type = args.soc_type.or(query.soc_type);
        query.dram_size = args.dram_size.or(query.dram_size);
        query.dram_bus_width = args.dram_bus_width.or(query.dram_bus_width);

        let boards = find_matches(&catalog, &query)?;
        println!("{} matching boards:", boards.len());
        for name in boards.keys() {
            println!("  {name}");
        }
    }

    Ok(())
}
