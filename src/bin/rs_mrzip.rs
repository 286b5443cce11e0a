//! rs-mrzip — the Reed–Solomon outer codec.
//!
//! Encodes standard input to standard output by default; `-d` decodes.
//! Decoding never stops on correctable damage: corrections are tallied,
//! the trailer checksum is the final arbiter, and only a stream cut on a
//! non-boundary makes the exit status non-zero.

use clap::Parser;
use std::io::{self, BufReader, BufWriter};
use std::process;

use arzip::ecc;

#[derive(Parser)]
#[command(
    name = "rs-mrzip",
    about = "CCSDS (255,223) Reed-Solomon stream codec",
    disable_version_flag = true
)]
struct Cli {
    /// Encode standard input to standard output (the default)
    #[arg(short = 'e', long, conflicts_with = "decode")]
    encode: bool,

    /// Decode standard input to standard output
    #[arg(short = 'd', long)]
    decode: bool,

    /// Print version information
    #[arg(short = 'v', long)]
    version: bool,
}

fn main() {
    let cli = Cli::parse();
    if cli.version {
        eprintln!("rs-mrzip (arzip version {})", env!("CARGO_PKG_VERSION"));
        return;
    }

    let mut input = BufReader::new(io::stdin().lock());
    let mut output = BufWriter::new(io::stdout().lock());

    if cli.decode {
        match ecc::decode_stream(&mut input, &mut output) {
            Ok(report) => {
                if report.corrected > 0 || report.uncorrectable > 0 {
                    eprintln!(
                        "rs-mrzip: number of corrected errors: {} ({} uncorrectable codewords)",
                        report.corrected, report.uncorrectable
                    );
                }
                if !report.checksum_ok {
                    eprintln!(
                        "rs-mrzip: checksum mismatch, too many errors or header corruption."
                    );
                }
            }
            Err(e) => {
                eprintln!("rs-mrzip: {e}");
                process::exit(1);
            }
        }
    } else if let Err(e) = ecc::encode_stream(&mut input, &mut output) {
        eprintln!("rs-mrzip: {e}");
        process::exit(1);
    }
}
