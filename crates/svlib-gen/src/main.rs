use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use svlib_contracts::{render_dpi_package, render_shared_header, SHARED_HEADER_NAME};

#[derive(Parser, Debug)]
#[command(name = "svlib-gen")]
#[command(about = "Render the svlib C/SV shared header and DPI import package.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the header shared by C and SystemVerilog.
    Header {
        #[arg(long)]
        out: PathBuf,
        /// If set, fail if output differs; do not write.
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// Write the SystemVerilog package of DPI imports.
    Dpi {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "svlib_dpi_pkg")]
        package: String,
        /// Header the package `include`s.
        #[arg(long, default_value = SHARED_HEADER_NAME)]
        header_name: String,
        /// If set, fail if output differs; do not write.
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// Write both files into one directory.
    All {
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long, default_value = "svlib_dpi_pkg")]
        package: String,
        /// If set, fail if any output differs; do not write.
        #[arg(long, default_value_t = false)]
        check: bool,
    },
}

fn main() -> Result<()> {
    try_main().map_err(|err| {
        eprintln!("{err:#}");
        err
    })
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Header { out, check } => write_output(&out, &render_shared_header(), check),
        Command::Dpi {
            out,
            package,
            header_name,
            check,
        } => {
            check_identifier(&package)?;
            write_output(&out, &render_dpi_package(&package, &header_name), check)
        }
        Command::All {
            out_dir,
            package,
            check,
        } => {
            check_identifier(&package)?;
            write_output(
                &out_dir.join(SHARED_HEADER_NAME),
                &render_shared_header(),
                check,
            )
            .context("shared header")?;
            write_output(
                &out_dir.join(format!("{package}.sv")),
                &render_dpi_package(&package, SHARED_HEADER_NAME),
                check,
            )
            .context("DPI package")
        }
    }
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if !ok {
        anyhow::bail!("package name {name:?} is not a SystemVerilog identifier");
    }
    Ok(())
}

fn write_output(out_path: &Path, src: &str, check: bool) -> Result<()> {
    if check {
        let cur = std::fs::read_to_string(out_path)
            .with_context(|| format!("read existing output: {}", out_path.display()))?;
        if cur != src {
            anyhow::bail!("generated output differs: {}", out_path.display());
        }
        return Ok(());
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir: {}", parent.display()))?;
        }
    }
    std::fs::write(out_path, src.as_bytes())
        .with_context(|| format!("write output: {}", out_path.display()))?;
    Ok(())
}
