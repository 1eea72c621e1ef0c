//! Open a hum store and construct the distributed mesh directories.

use clap::error::ErrorKind;
use clap::Parser;
use dimm::mesh::distributed::CellMesh;
use dimm::store::hum::{HumStore, StoreMode};

#[derive(Parser, Debug)]
#[command(
    name = "partMesh",
    about = "Distribute a hum mesh across the transport group",
    version = "0.1"
)]
struct Args {
    /// The hum mesh store
    store: String,
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

    #[cfg(feature = "mpi-support")]
    let comm = dimm::comm::MpiComm::default();
    #[cfg(not(feature = "mpi-support"))]
    let comm = dimm::comm::NoComm;

    if let Err(e) = run(&args, &comm) {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
}

fn run<C: dimm::comm::Communicator>(args: &Args, comm: &C) -> Result<(), dimm::error::DimmError> {
    let is64 = {
        let store = HumStore::open(&args.store, StoreMode::ReadOnly)?;
        store.int_width() > 4
    };
    if is64 {
        let _mesh = CellMesh::<f64, u64>::open(&args.store, comm)?;
    } else {
        let _mesh = CellMesh::<f64, u32>::open(&args.store, comm)?;
    }
    comm.barrier();
    Ok(())
}
