//! metabridge CLI - tools for working with bridge descriptors and wire buffers
//!
//! Commands:
//!   metabridge describe <types.json>  - Show the host class synthesized for each type
//!   metabridge encode <value.json>    - Encode a wire value as envelope hex
//!   metabridge decode <hex>           - Decode envelope hex into JSON

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use metabridge::descriptor::{build_descriptor, MetaDescriptor, TypeDef, TypeDescriptor};
use metabridge::host::MetaClass;
use metabridge::wire::{decode_with_limits, encode, WireValue};
use metabridge::BridgeConfig;

#[derive(Parser)]
#[command(name = "metabridge")]
#[command(about = "Tools for working with metabridge descriptors and wire buffers", long_about = None)]
struct Cli {
    /// JSON bridge configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build host classes from JSON type definitions and print their layout
    Describe {
        /// File holding one type definition or an array of them
        types_file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode a JSON wire value into envelope bytes
    Encode {
        /// File holding the value
        value_file: PathBuf,
    },

    /// Decode envelope bytes given as hex
    Decode {
        /// Hex-encoded buffer
        hex: String,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Commands::Describe { types_file, json } => describe_command(&types_file, json),
        Commands::Encode { value_file } => encode_command(&value_file),
        Commands::Decode { hex } => decode_command(&hex, &config),
    }
}

fn init_logging() {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;

    let fmt = tracing_subscriber::fmt::Layer::default().with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::Registry::default().with(filter).with(fmt);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn read_type_defs(path: &Path) -> anyhow::Result<Vec<TypeDef>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let defs = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(defs)
}

fn describe_command(types_file: &Path, json: bool) -> anyhow::Result<()> {
    let mut described = Vec::new();
    for def in read_type_defs(types_file)? {
        let descriptor = TypeDescriptor::from(def);
        let meta = build_descriptor(&descriptor)
            .with_context(|| format!("cannot build class for {}", descriptor.type_name()))?;
        described.push(meta);
    }

    if json {
        let output: Vec<_> = described.iter().map(|m| class_to_json(m)).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for meta in &described {
            print_class(meta);
        }
    }
    Ok(())
}

fn superclass_name(class: &MetaClass) -> &str {
    class.superclass().map_or("-", |s| s.name())
}

fn print_class(meta: &MetaDescriptor) {
    let class = meta.class();
    println!("{} : {}", class.name(), superclass_name(class));
    println!("  layout: {}", meta.layout_hash());

    if !class.own_properties().is_empty() {
        println!("  properties:");
        for (i, p) in class.own_properties().iter().enumerate() {
            let notify = p.notify.map(|n| format!(" notify {n}")).unwrap_or_default();
            println!(
                "    [{}] {}: {}{}",
                class.property_offset() + i,
                p.name,
                p.storage.type_name(),
                notify
            );
        }
    }

    if !class.own_methods().is_empty() {
        println!("  methods:");
        for (i, m) in class.own_methods().iter().enumerate() {
            println!(
                "    [{}] {:?} {} -> {}",
                class.method_offset() + i,
                m.kind,
                m.signature(),
                m.return_type.as_deref().unwrap_or("void")
            );
        }
    }
}

fn class_to_json(meta: &MetaDescriptor) -> serde_json::Value {
    let class = meta.class();
    serde_json::json!({
        "name": class.name(),
        "superclass": superclass_name(class),
        "layout": meta.layout_hash().to_hex(),
        "property_offset": class.property_offset(),
        "method_offset": class.method_offset(),
        "properties": class.own_properties().iter().map(|p| serde_json::json!({
            "name": p.name,
            "type": p.storage.type_name(),
            "notify": p.notify,
        })).collect::<Vec<_>>(),
        "methods": class.own_methods().iter().map(|m| serde_json::json!({
            "signature": m.signature(),
            "kind": format!("{:?}", m.kind).to_lowercase(),
            "returns": m.return_type,
        })).collect::<Vec<_>>(),
    })
}

fn encode_command(value_file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(value_file)
        .with_context(|| format!("failed to read {}", value_file.display()))?;
    let value: WireValue = serde_json::from_str(&text)?;
    let bytes = encode(&value).map_err(|e| anyhow::anyhow!("failed to encode: {}", e))?;
    println!("{}", to_hex(&bytes));
    Ok(())
}

fn decode_command(hex: &str, config: &BridgeConfig) -> anyhow::Result<()> {
    let bytes = from_hex(hex)?;
    let value = decode_with_limits(&bytes, &config.limits)
        .map_err(|e| anyhow::anyhow!("failed to decode: {}", e))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Hex digits may be split by whitespace, e.g. when pasted from a dump.
fn from_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).context("invalid hex input")
}
