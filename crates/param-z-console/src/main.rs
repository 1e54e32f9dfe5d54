mod logger;

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use param_z::{
    address::{WildcardResolver, sanitize_name},
    preset::load_preset_file,
    prelude::*,
};
use serde_json::json;
use tracing::{info, warn};

type AnyResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "param-z-console")]
#[command(about = "Inspect and drive a param-z device over Zenoh")]
struct Cli {
    /// Zenoh router or peer to connect to
    #[arg(short, long, default_value = "tcp/127.0.0.1:7447")]
    connect: Vec<String>,

    /// Key prefix the remote device is exposed under
    #[arg(short, long, default_value = "paramz/device")]
    prefix: String,

    /// Local device name, used to select preset sections
    #[arg(long)]
    name: Option<String>,

    /// Query timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// JSON lines output
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every remote parameter with its attributes
    Tree,
    /// Pull and print one value
    Get { address: String },
    /// Push a value; numbers and booleans are inferred, anything else is a string
    Set { address: String, value: String },
    /// Stream value changes until interrupted
    Watch {
        /// Address patterns to watch, all parameters when empty
        patterns: Vec<String>,
        /// Include quiet writes
        #[arg(long)]
        global: bool,
    },
    /// Print the current values as a preset document
    Dump,
    /// Push every value of a preset file
    Load { file: PathBuf },
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.json, cli.debug);

    let mut builder = ZProtocolBuilder::client(&cli.prefix)
        .with_query_timeout(Duration::from_millis(cli.timeout_ms));
    for endpoint in &cli.connect {
        builder = builder.with_connect_endpoint(endpoint);
    }
    let protocol = builder.build()?;

    let name = cli.name.clone().unwrap_or_else(|| device_name(&cli.prefix));
    let device = DeviceBuilder::new(name)
        .with_protocol(protocol)
        .with_resolver(WildcardResolver)
        .build()?;

    if !device.update_async().await {
        warn!(prefix = %cli.prefix, "Remote namespace query failed");
    }
    info!(
        prefix = %cli.prefix,
        parameters = device.parameters().len(),
        "Mirrored remote device"
    );

    match cli.command {
        Command::Tree => print_tree(&device, cli.json),
        Command::Get { address } => get(&device, &address, cli.json).await?,
        Command::Set { address, value } => set(&device, &address, &value)?,
        Command::Watch { patterns, global } => watch(&device, &patterns, global, cli.json).await,
        Command::Dump => print!("{}", dump_preset(&device)?),
        Command::Load { file } => load(&device, &file)?,
    }
    Ok(())
}

fn device_name(prefix: &str) -> String {
    let name = sanitize_name(prefix.rsplit('/').next().unwrap_or_default());
    if name.is_empty() { "remote".to_owned() } else { name }
}

fn print_tree(device: &Device, json: bool) {
    let mut parameters = device.parameters();
    parameters.sort_by_key(|p| p.address());
    for p in parameters {
        if json {
            match serde_json::to_string(&p.to_data()) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(address = %p.address(), "Cannot encode parameter: {e}"),
            }
            continue;
        }
        let unit = p.unit().map(|u| format!(" {u}")).unwrap_or_default();
        println!(
            "{:<32} {:<8} {:<4} {}{}  {}",
            p.address(),
            p.value_type(),
            p.access(),
            p.value(),
            unit,
            p.domain()
        );
    }
}

async fn get(device: &Device, address: &str, json: bool) -> AnyResult<()> {
    let parameter = device
        .find_parameter(address)
        .ok_or_else(|| Error::NotFound(address.to_owned()))?;
    if !parameter.pull_value_async().await {
        warn!(%address, "Pull failed, showing the mirrored value");
    }
    print_value(&parameter.address(), &parameter.value(), json);
    Ok(())
}

fn set(device: &Device, address: &str, raw: &str) -> AnyResult<()> {
    let parameter = device
        .find_parameter(address)
        .ok_or_else(|| Error::NotFound(address.to_owned()))?;
    if parameter.push_value(parse_value(raw)) {
        info!(%address, value = %parameter.value(), "Pushed");
    } else {
        warn!(%address, "Value was not pushed");
    }
    Ok(())
}

fn load(device: &Device, file: &std::path::Path) -> AnyResult<()> {
    let preset = load_preset_file(file, device.name())?;
    let mut pushed = 0;
    for (address, value) in preset.iter() {
        match device.find_parameter(address) {
            Some(p) if p.push_value(value.clone()) => pushed += 1,
            Some(_) => warn!(%address, "Value was not pushed"),
            None => warn!(%address, "No such remote parameter"),
        }
    }
    info!(file = %file.display(), pushed, total = preset.len(), "Preset loaded");
    Ok(())
}

async fn watch(device: &Device, patterns: &[String], global: bool, json: bool) {
    enum Source {
        Global(GlobalMessageQueue),
        Registered(MessageQueue),
    }

    let source = if global {
        let queue = GlobalMessageQueue::new(device);
        info!(watched = queue.observe_all(), "Watching every write");
        Source::Global(queue)
    } else {
        let queue = MessageQueue::new(device);
        let parameters: Vec<_> = if patterns.is_empty() {
            device.parameters()
        } else {
            patterns
                .iter()
                .flat_map(|pattern| device.find_nodes(pattern))
                .filter_map(|node| node.parameter())
                .collect()
        };
        for p in &parameters {
            queue.register(p);
        }
        info!(watched = parameters.len(), "Watching parameters");
        Source::Registered(queue)
    };

    let mut interval = tokio::time::interval(Duration::from_millis(10));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            _ = &mut interrupted => break,
            _ = interval.tick() => {
                let next = || match &source {
                    Source::Global(q) => q.try_dequeue(),
                    Source::Registered(q) => q.try_dequeue(),
                };
                while let Some(msg) = next() {
                    let address = msg
                        .parameter()
                        .map(|p| p.address())
                        .unwrap_or_else(|| msg.id.to_string());
                    print_value(&address, &msg.value, json);
                }
            }
        }
    }
}

fn print_value(address: &str, value: &Value, json: bool) {
    if json {
        println!("{}", json!({ "address": address, "value": value }));
    } else {
        println!("{address} = {value}");
    }
}

/// Infers a typed value from command-line text.
fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Impulse;
    }
    if let Ok(i) = raw.parse::<i32>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f32>() {
        return Value::Float(f);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(raw),
    }
}
