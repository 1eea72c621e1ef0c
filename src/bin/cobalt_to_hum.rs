//! COBALT mesh to hum converter - serial stream version.

use clap::error::ErrorKind;
use clap::Parser;
use dimm::import::cobalt;

#[derive(Parser, Debug)]
#[command(
    name = "cobaltToHum",
    about = "COBALT Mesh to hum converter - serial stream version",
    version = "0.1"
)]
struct Args {
    /// The cobalt mesh file name
    #[arg(short = 'i', long = "input")]
    input: String,

    /// The output mesh file name (hum)
    #[arg(short = 'o', long = "output", default_value = "cobalt.hum")]
    output: String,

    /// The stream buffer size in GB
    #[arg(short = 's', long = "size", default_value_t = 0.0005)]
    size: f64,

    /// Enable 64-bit integers for large meshes
    #[arg(short = 'L', long = "large")]
    large: bool,
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

    let max_bytes = (args.size * 1024.0 * 1024.0 * 1024.0) as usize;
    eprintln!("Total bytes allocated from buffer = {max_bytes} ({} GB)", args.size);

    let result = if args.large {
        cobalt::convert::<f64, u64>(&args.input, &args.output, max_bytes)
    } else {
        cobalt::convert::<f64, u32>(&args.input, &args.output, max_bytes)
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
}
