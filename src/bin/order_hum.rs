//! Mesh reordering for hum - serial stream version.

use clap::error::ErrorKind;
use clap::Parser;
use dimm::sfc::{reorder_cells, reorder_nodes, KeyBits};
use dimm::store::h5types::StoreIndex;
use dimm::store::hum::{HumStore, StoreMode};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "orderHum",
    about = "Mesh reordering for hum - serial stream version",
    version = "0.1"
)]
struct Args {
    /// The hum mesh file
    #[arg(short = 'i', long = "input")]
    input: String,

    /// The stream buffer size - in entity counts
    #[arg(short = 's', long = "size", default_value_t = 10000)]
    size: usize,

    /// Disable node re-ordering
    #[arg(short = 'n', long = "node")]
    no_node: bool,

    /// Disable cell re-ordering
    #[arg(short = 'c', long = "cell")]
    no_cell: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
}

fn run(args: &Args) -> Result<(), dimm::error::DimmError> {
    let is64 = {
        let store = HumStore::open(&args.input, StoreMode::ReadOnly)?;
        store.int_width() > 4
    };

    if !args.no_cell {
        if is64 {
            cell_pass::<u64>(&args.input, args.size)?;
        } else {
            cell_pass::<u32>(&args.input, args.size)?;
        }
    }
    if !args.no_node {
        if is64 {
            node_pass::<u64>(&args.input, args.size)?;
        } else {
            node_pass::<u32>(&args.input, args.size)?;
        }
    }
    Ok(())
}

fn node_pass<I: StoreIndex>(path: &str, chunk: usize) -> Result<(), dimm::error::DimmError> {
    eprintln!(" ===========================================");
    eprintln!(" ====  Node re-ordering and re-numbering ===");
    eprintln!(" ===========================================");
    let store = HumStore::open(path, StoreMode::ReadWrite)?;
    let begin = Instant::now();
    eprint!("SFC sort + node re-ordering + face re-numbering ... ");
    reorder_nodes::<I>(&store, KeyBits::B10, chunk)?;
    eprintln!("(done) {:.3} ms", begin.elapsed().as_secs_f64() * 1.0e3);
    store.close();
    Ok(())
}

fn cell_pass<I: StoreIndex>(path: &str, chunk: usize) -> Result<(), dimm::error::DimmError> {
    eprintln!(" ======================================");
    eprintln!(" ====  Cell left/right re-numbering ===");
    eprintln!(" ======================================");
    let store = HumStore::open(path, StoreMode::ReadWrite)?;
    let begin = Instant::now();
    eprint!("Centroids + SFC sort + left/right re-numbering ... ");
    reorder_cells::<I>(&store, KeyBits::B20, chunk)?;
    eprintln!("(done) {:.3} ms", begin.elapsed().as_secs_f64() * 1.0e3);
    store.close();
    Ok(())
}
