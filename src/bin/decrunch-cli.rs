//! decrunch-cli - Command-line interface for decrunch
//!
//! A command-line tool for decompressing MS-ZIP, LZX, Quantum, LZSS and
//! KWAJ LZH streams.

use clap::{Parser, Subcommand, ValueEnum};
use decrunch::{
    kwaj_decompress_bytes, lzss_decompress_bytes, lzx_decompress_bytes, mszip_decompress_bytes,
    none_decompress_bytes, qtm_decompress_bytes, LzssMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "decrunch-cli")]
#[command(about = "A CLI tool for decompressing classic Microsoft compression formats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress a raw compressed stream
    Decompress {
        /// Input compressed file
        input: PathBuf,

        /// Output decompressed file
        output: PathBuf,

        /// Compression format of the input
        #[arg(short = 'F', long, value_enum)]
        format: CliFormat,

        /// Decompressed length in bytes (required for mszip, lzx and quantum)
        #[arg(short, long)]
        length: Option<u64>,

        /// Window size as a power of two (lzx: 15-21, quantum: 10-21)
        #[arg(short, long)]
        window_bits: Option<u32>,

        /// Salvage what remains after a damaged MS-ZIP frame
        #[arg(long)]
        repair: bool,

        /// LZSS stream flavor
        #[arg(short, long, value_enum, default_value_t = CliLzssMode::Expand)]
        mode: CliLzssMode,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliFormat {
    /// Stored (no compression)
    None,
    /// LZSS ring-buffer compression (EXPAND, QBasic, help files)
    Lzss,
    /// MS-ZIP: DEFLATE in 32 KiB CK frames
    Mszip,
    /// LZX as used by cabinet files
    Lzx,
    /// Quantum arithmetic-coded compression
    Quantum,
    /// KWAJ LZH (Huffman-coded LZSS)
    Kwaj,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliLzssMode {
    /// COMPRESS.EXE / EXPAND.EXE streams - Default
    Expand,
    /// Multimedia Viewer help files (inverted control bytes)
    MsHelp,
    /// QBasic 4.5 installer streams
    QBasic,
}

impl From<CliLzssMode> for LzssMode {
    fn from(mode: CliLzssMode) -> Self {
        match mode {
            CliLzssMode::Expand => LzssMode::Expand,
            CliLzssMode::MsHelp => LzssMode::MsHelp,
            CliLzssMode::QBasic => LzssMode::QBasic,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decompress {
            input,
            output,
            format,
            length,
            window_bits,
            repair,
            mode,
            force,
        } => decompress_file(
            &input,
            &output,
            format,
            length,
            window_bits,
            repair,
            mode.into(),
            force,
            cli.verbose,
            cli.quiet,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn decompress_file(
    input: &PathBuf,
    output: &PathBuf,
    format: CliFormat,
    length: Option<u64>,
    window_bits: Option<u32>,
    repair: bool,
    mode: LzssMode,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    if verbose {
        println!(
            "Decompressing '{}' to '{}'",
            input.display(),
            output.display()
        );
    }

    let start_time = Instant::now();

    let compressed_data = fs::read(input)?;
    let input_size = compressed_data.len();

    if verbose {
        println!("Compressed size: {} bytes", input_size);
    }

    // Show progress bar for large files
    let progress = if !quiet && input_size > 1024 * 1024 {
        let pb = ProgressBar::new(2);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Decompressing...");
        Some(pb)
    } else {
        None
    };

    if let Some(ref pb) = progress {
        pb.inc(1);
    }

    let decompressed_data = run_codec(&compressed_data, format, length, window_bits, repair, mode)
        .map_err(|e| format!("Decompression failed: {}", e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Decompression complete");
    }

    fs::write(output, &decompressed_data)?;

    let decompression_time = start_time.elapsed();
    let output_size = decompressed_data.len();
    let compression_ratio = if output_size > 0 {
        (input_size as f64 / output_size as f64) * 100.0
    } else {
        0.0
    };

    if !quiet {
        println!("✓ Decompression successful!");
        println!("  Input:  {} bytes", input_size);
        println!("  Output: {} bytes", output_size);
        println!("  Ratio:  {:.1}%", compression_ratio);
        println!("  Time:   {:.2?}", decompression_time);
    }

    Ok(())
}

fn run_codec(
    data: &[u8],
    format: CliFormat,
    length: Option<u64>,
    window_bits: Option<u32>,
    repair: bool,
    mode: LzssMode,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let need_length = || -> Result<u64, Box<dyn std::error::Error>> {
        length.ok_or_else(|| "this format requires --length (decompressed size)".into())
    };
    let result = match format {
        CliFormat::None => none_decompress_bytes(data)?,
        CliFormat::Lzss => lzss_decompress_bytes(data, mode)?,
        CliFormat::Mszip => mszip_decompress_bytes(data, need_length()?, repair)?,
        CliFormat::Lzx => lzx_decompress_bytes(data, window_bits.unwrap_or(21), need_length()?)?,
        CliFormat::Quantum => {
            qtm_decompress_bytes(data, window_bits.unwrap_or(21), need_length()?)?
        }
        CliFormat::Kwaj => kwaj_decompress_bytes(data)?,
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_stored_passthrough() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input_path = dir.path().join("input.bin");
        let output_path = dir.path().join("output.bin");

        let test_data = b"Hello, World! This is a test of the decrunch CLI tool.";
        fs::write(&input_path, test_data)?;

        decompress_file(
            &input_path,
            &output_path,
            CliFormat::None,
            None,
            None,
            false,
            LzssMode::Expand,
            false,
            false,
            true,
        )?;

        let result_data = fs::read(&output_path)?;
        assert_eq!(test_data, &result_data[..]);

        Ok(())
    }

    #[test]
    fn test_length_required_for_frame_codecs() {
        let err = run_codec(&[], CliFormat::Mszip, None, None, false, LzssMode::Expand)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("--length"));
    }
}
