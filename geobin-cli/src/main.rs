//! Inspect and convert serialized geometries from the command line.

use std::fs;
use std::io::Read;

use clap::{Parser, Subcommand, ValueEnum};
use geobin::wkb::{WkbDialect, WkbOptions};
use geobin::{Geometry, GeobinError, gs2};

#[derive(Parser)]
#[command(name = "geobin", version, about = "Inspect and convert WKB/GS2 geometries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a serialized geometry
    Info {
        /// Hex string, a file path prefixed with @, or - for stdin
        input: String,
    },
    /// Re-encode a geometry
    Convert {
        input: String,
        /// Target encoding
        #[arg(long, value_enum, default_value_t = Format::Wkb)]
        to: Format,
        #[arg(long, value_enum, default_value_t = Dialect::Extended)]
        dialect: Dialect,
        #[arg(long, value_enum, default_value_t = Endian::Ndr)]
        endian: Endian,
        /// Attach a bounding box (GS2 output only)
        #[arg(long)]
        bbox: bool,
    },
    /// Tessellate a NURBS curve into a LineString
    Sample {
        input: String,
        /// Number of polyline segments
        #[arg(long, default_value_t = 32)]
        segments: u32,
        #[arg(long, value_enum, default_value_t = Dialect::Extended)]
        dialect: Dialect,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Wkb,
    Gs2,
}

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Sfsql,
    Iso,
    Extended,
}

impl From<Dialect> for WkbDialect {
    fn from(d: Dialect) -> Self {
        match d {
            Dialect::Sfsql => WkbDialect::SfSql,
            Dialect::Iso => WkbDialect::Iso,
            Dialect::Extended => WkbDialect::Extended,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Endian {
    Ndr,
    Xdr,
}

fn read_input(input: &str) -> Result<Vec<u8>, String> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| e.to_string())?;
        buf
    } else if let Some(path) = input.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?
    } else {
        input.to_string()
    };
    hex::decode(text.trim()).map_err(|e| format!("hex input: {e}"))
}

/// A GS2 record declares its own length in the first word; anything
/// else is treated as WKB.
fn decode(buf: &[u8]) -> Result<Geometry<'static>, GeobinError> {
    match gs2::from_gs2(buf) {
        Ok(geom) => Ok(geom),
        Err(_) => geobin::wkb::from_wkb(buf),
    }
}

fn info(buf: &[u8]) -> Result<String, GeobinError> {
    let geom = decode(buf)?;
    let mut out = String::new();
    out.push_str(&format!("type:    {}\n", geom.type_name()));
    out.push_str(&format!(
        "srid:    {}\n",
        geom.srid.map_or("unknown".to_string(), |s| s.to_string())
    ));
    let dims = match (geom.flags.z, geom.flags.m) {
        (false, false) => "XY",
        (true, false) => "XYZ",
        (false, true) => "XYM",
        (true, true) => "XYZM",
    };
    out.push_str(&format!("dims:    {dims}\n"));
    out.push_str(&format!("points:  {}\n", geom.num_points()));
    out.push_str(&format!("empty:   {}\n", geom.is_empty()));
    let bbox = geom
        .bbox
        .or_else(|| geom.compute_bbox().map(|b| b.rounded()));
    match bbox {
        Some(b) => out.push_str(&format!(
            "bbox:    x {}..{} y {}..{}\n",
            b.xmin, b.xmax, b.ymin, b.ymax
        )),
        None => out.push_str("bbox:    none\n"),
    }
    Ok(out)
}

fn convert(
    buf: &[u8],
    to: Format,
    dialect: Dialect,
    endian: Endian,
    bbox: bool,
) -> Result<String, GeobinError> {
    let mut geom = decode(buf)?;
    match to {
        Format::Wkb => {
            let opts = WkbOptions::dialect(dialect.into());
            let opts = match endian {
                Endian::Ndr => opts.ndr(),
                Endian::Xdr => opts.xdr(),
            };
            geom.to_hex_wkb(opts)
        }
        Format::Gs2 => {
            if bbox {
                geom.ensure_bbox();
            }
            Ok(hex::encode_upper(gs2::to_gs2(&geom)?))
        }
    }
}

fn sample(buf: &[u8], segments: u32, dialect: Dialect) -> Result<String, GeobinError> {
    let geom = decode(buf)?;
    let line = geom.nurbs_to_line_string(segments)?;
    line.to_hex_wkb(WkbOptions::dialect(dialect.into()).ndr())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Info { input } => {
            read_input(input).and_then(|buf| info(&buf).map_err(|e| e.to_string()))
        }
        Command::Convert {
            input,
            to,
            dialect,
            endian,
            bbox,
        } => read_input(input).and_then(|buf| {
            convert(&buf, *to, *dialect, *endian, *bbox).map_err(|e| e.to_string())
        }),
        Command::Sample {
            input,
            segments,
            dialect,
        } => read_input(input)
            .and_then(|buf| sample(&buf, *segments, *dialect).map_err(|e| e.to_string())),
    };
    match result {
        Ok(out) => {
            print!("{out}");
            if !out.ends_with('\n') {
                println!();
            }
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            std::process::exit(1);
        }
    }
}
