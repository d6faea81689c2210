use std::io::{self, Write};

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use object::{
    CELL_SIZE, Cell, DATA_ALIGNMENT, FieldKind, Header, LayoutSettings, PayloadKind, TAG_BITS,
    TAG_MASK, TypeCode, TypeLayout, Value, is_aligned, layout_table,
};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect heap object layouts and tagged words", long_about = None)]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Bytes per cell of the build to describe
    #[arg(long, global = true, default_value_t = CELL_SIZE)]
    cell_size: usize,

    /// Alignment of heap objects in bytes
    #[arg(long, global = true, default_value_t = DATA_ALIGNMENT)]
    data_alignment: usize,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Field offsets of every heap kind
    Table {
        /// Only this kind, e.g. `word` or `tuple-layout`
        #[arg(long = "type", value_name = "NAME")]
        ty: Option<String>,
    },
    /// Decode a tagged value word
    Value {
        #[arg(value_parser = parse_word)]
        word: Cell,
    },
    /// Decode an object header word
    Header {
        #[arg(value_parser = parse_word)]
        word: Cell,
    },
    /// Tag an integer as a fixnum
    Fixnum {
        #[arg(allow_negative_numbers = true, value_parser = parse_integer)]
        n: i64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let stdout = io::stdout();
    run(&cli, &mut stdout.lock())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let settings = LayoutSettings {
        cell_size: cli.cell_size,
        data_alignment: cli.data_alignment,
    };
    settings.validate().context("invalid layout settings")?;
    log::info!(
        "describing {}-byte cells with {}-byte alignment",
        settings.cell_size,
        settings.data_alignment
    );

    match &cli.command {
        Command::Table { ty } => table(&settings, ty.as_deref(), cli.json, out),
        Command::Value { word } => value(&settings, *word, cli.json, out),
        Command::Header { word } => header(*word, cli.json, out),
        Command::Fixnum { n } => fixnum(&settings, *n, cli.json, out),
    }
}

fn table(
    settings: &LayoutSettings,
    only: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut layouts = layout_table(settings)?;
    if let Some(name) = only {
        layouts.retain(|layout| layout.name == name);
        if layouts.is_empty() {
            bail!("no heap kind named `{name}`");
        }
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &layouts)?;
        writeln!(out)?;
        return Ok(());
    }
    for layout in &layouts {
        write_layout(layout, out)?;
    }
    Ok(())
}

fn write_layout(layout: &TypeLayout, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "{} (type {}, tag {}): {} fixed bytes, traced to {}",
        layout.name, layout.ty, layout.code, layout.fixed_size, layout.traced_end
    )?;
    for field in &layout.fields {
        let kind = match field.kind {
            FieldKind::Header => "header",
            FieldKind::Tagged => "tagged",
            FieldKind::Native => "native",
            FieldKind::Double => "double",
            FieldKind::Padding => "padding",
        };
        writeln!(
            out,
            "  +{:<4} {:<14} {:>2}  {kind}",
            field.offset, field.name, field.size
        )?;
    }
    if let Some(payload) = &layout.payload {
        let kind = match payload.kind {
            PayloadKind::Tagged => "tagged",
            PayloadKind::Raw => "raw",
        };
        writeln!(
            out,
            "  +{:<4} {:<14} {:>2}  {kind} payload, per element",
            payload.offset, payload.name, payload.element_size
        )?;
    }
    Ok(())
}

fn value(
    settings: &LayoutSettings,
    word: Cell,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let width = settings.cell_size as u32 * 8;
    if width < Cell::BITS && word >> width != 0 {
        bail!("{word:#x} does not fit in a {}-byte cell", settings.cell_size);
    }
    let value = Value::from_raw(word);
    let ty = TypeCode::try_from(value.tag()).ok();
    let address = value.untag();
    let aligned = is_aligned(address, settings.data_alignment);
    let fixnum = value.is_fixnum().then(|| untag_fixnum_at(word, width));

    if json {
        let report = json!({
            "raw": word,
            "tag": value.tag(),
            "type": ty,
            "immediate": value.is_immediate(),
            "fixnum": fixnum.map(|n| n as i64),
            "address": (!value.is_immediate()).then_some(address),
            "aligned": (!value.is_immediate()).then_some(aligned),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    match ty {
        None => writeln!(out, "{word:#x}: unused tag {}", value.tag())?,
        Some(TypeCode::Fixnum) => {
            writeln!(out, "{word:#x}: fixnum {}", untag_fixnum_at(word, width))?
        }
        Some(TypeCode::F) => writeln!(out, "{word:#x}: f")?,
        Some(ty) => {
            let note = if aligned { "" } else { " (misaligned)" };
            writeln!(out, "{word:#x}: {ty} at {address:#x}{note}")?;
        }
    }
    Ok(())
}

/// The fixnum in the low `width` bits of `word`, sign-extended from there.
fn untag_fixnum_at(word: Cell, width: u32) -> i128 {
    let unused = 128 - width;
    (((word as u128) << unused) as i128 >> unused) >> TAG_BITS
}

fn header(word: Cell, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let header = Header::from_raw(word);
    let forwarded = header.is_forwarding_pointer();
    let free = header.is_free();
    let ty = TypeCode::try_from(header.raw_type()).ok();

    if json {
        let report = json!({
            "raw": word,
            "free": free,
            "forwarding": forwarded,
            "target": forwarded.then(|| header.forwarding_pointer() as Cell),
            "type": (!forwarded).then_some(ty).flatten(),
            "hashcode": (!forwarded).then(|| header.hashcode()),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    if forwarded {
        writeln!(
            out,
            "{word:#x}: forwarded to {:#x}",
            header.forwarding_pointer() as Cell
        )?;
        return Ok(());
    }
    let ty = match ty {
        Some(ty) => ty.to_string(),
        None => format!("invalid type {}", header.raw_type()),
    };
    let free = if free { ", free" } else { "" };
    writeln!(out, "{word:#x}: {ty}, hashcode {}{free}", header.hashcode())?;
    Ok(())
}

/// Range and tagged form of `n` as a fixnum of the configured width.
fn fixnum(settings: &LayoutSettings, n: i64, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let width = settings.cell_size as u32 * 8;
    let bits = width - TAG_BITS;
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << (bits - 1)) - 1;
    let n = i128::from(n);
    let fits = (min..=max).contains(&n);
    let cell_mask = (1u128 << width) - 1;
    let tagged = ((n << TAG_BITS) as u128) & cell_mask & !(TAG_MASK as u128);

    if !fits {
        log::warn!("{n} does not fit in a {bits}-bit fixnum, tagging truncates it");
    }

    if json {
        let report = json!({
            "n": n as i64,
            "fits": fits,
            "min": min as i64,
            "max": max as i64,
            "tagged": tagged as u64,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let note = if fits { "" } else { " (out of range, truncated)" };
    writeln!(out, "{n} -> {tagged:#x}{note}")?;
    writeln!(out, "fixnum range {min}..={max}")?;
    Ok(())
}

fn parse_word(s: &str) -> Result<Cell, String> {
    let s = s.replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Cell::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("`{s}` is not a word: {err}"))
}

fn parse_integer(s: &str) -> Result<i64, String> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = parse_word(digits)? as i128;
    let n = if negative { -magnitude } else { magnitude };
    i64::try_from(n).map_err(|_| format!("`{s}` does not fit in 64 bits"))
}
