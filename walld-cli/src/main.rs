use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use walld_core::ipc::{self, DaemonStatus, IpcRequest, IpcResponse};
use walld_core::models::Value;
use walld_core::store::InterfaceInfo;
use walld_core::variable::Variable;

#[derive(Parser)]
#[command(
    name = "walld",
    about = "Control the walld wallpaper daemon",
    after_help = "Run `walld interfaces` to list the interfaces and variables the daemon knows."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Set the rotation interval
    Schedule {
        /// Positive number of units
        #[arg(allow_negative_numbers = true)]
        value: i64,
        /// s, m or h
        unit: String,
    },
    /// Replace the wallpaper set with an explicit list of files
    Files {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Turn shuffle on or off
    Shuffle {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Print the current wallpaper
    Current,
    /// List interfaces with their variables
    Interfaces,
    /// List active interfaces
    Active,
    /// Set an interface variable
    SetVar {
        interface: String,
        variable: String,
        value: String,
        /// Send the value as a string instead of inferring its type
        #[arg(long)]
        raw: bool,
    },
    /// Activate interfaces
    Enable {
        #[arg(required = true)]
        interfaces: Vec<String>,
    },
    /// Deactivate interfaces
    Disable {
        #[arg(required = true)]
        interfaces: Vec<String>,
    },
    /// Rotate to the next wallpaper now
    Next,
    /// Stop the daemon
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let resp = send(IpcRequest::Status).await?;
            if let Some(data) = ok_data(resp) {
                let status: DaemonStatus = serde_json::from_value(data)?;
                print_status(&status);
            }
        }
        Commands::Schedule { value, unit } => {
            let resp = send(IpcRequest::SetSchedule { value, unit }).await?;
            print_response(resp);
        }
        Commands::Files { paths } => {
            let paths = paths
                .into_iter()
                .map(std::path::absolute)
                .collect::<std::io::Result<Vec<_>>>()?;
            let resp = send(IpcRequest::SetFiles { paths }).await?;
            print_response(resp);
        }
        Commands::Shuffle { enabled } => {
            let resp = send(IpcRequest::SetShuffle { enabled }).await?;
            print_response(resp);
        }
        Commands::Current => {
            let resp = send(IpcRequest::GetCurrentWallpaper).await?;
            print_wallpaper(resp);
        }
        Commands::Interfaces => {
            let resp = send(IpcRequest::ListInterfaces).await?;
            if let Some(data) = ok_data(resp) {
                let interfaces: Vec<InterfaceInfo> = serde_json::from_value(data)?;
                if interfaces.is_empty() {
                    println!("no interfaces configured");
                }
                for iface in &interfaces {
                    print!("{}", describe_interface(iface));
                }
            }
        }
        Commands::Active => {
            let resp = send(IpcRequest::ListActive).await?;
            if let Some(data) = ok_data(resp) {
                let active: Vec<String> = serde_json::from_value(data)?;
                for name in active {
                    println!("{name}");
                }
            }
        }
        Commands::SetVar {
            interface,
            variable,
            value,
            raw,
        } => {
            let value = if raw {
                Value::String(value)
            } else {
                Value::parse_literal(&value)
            };
            let resp = send(IpcRequest::SetVariable {
                interface,
                variable,
                value,
            })
            .await?;
            print_response(resp);
        }
        Commands::Enable { interfaces } => toggle(interfaces, true).await?,
        Commands::Disable { interfaces } => toggle(interfaces, false).await?,
        Commands::Next => {
            let resp = send(IpcRequest::Next).await?;
            if let Some(data) = ok_data(resp) {
                if data["rotated"].as_bool() == Some(false) {
                    fail("no_wallpapers", "no wallpapers available, nothing rotated");
                }
                print_wallpaper(IpcResponse::ok_with_data(data));
            }
        }
        Commands::Quit => {
            let resp = send(IpcRequest::Quit).await?;
            print_response(resp);
        }
    }

    Ok(())
}

async fn toggle(interfaces: Vec<String>, enabled: bool) -> Result<()> {
    for interface in interfaces {
        let resp = send(IpcRequest::SetInterfaceEnabled {
            interface: interface.clone(),
            enabled,
        })
        .await?;
        if let Some(data) = ok_data(resp) {
            let changed = data["changed"].as_bool().unwrap_or(false);
            let state = if enabled { "enabled" } else { "disabled" };
            if changed {
                println!("{interface}: {state}");
            } else {
                println!("{interface}: already {state}");
            }
        }
    }
    Ok(())
}

async fn send(request: IpcRequest) -> Result<IpcResponse> {
    ipc::send_request(&request)
        .await
        .map_err(|e| anyhow::anyhow!("daemon not running. start with: walld-daemon\n  ({e})"))
}

/// The payload of a successful response; errors are printed and exit.
fn ok_data(resp: IpcResponse) -> Option<serde_json::Value> {
    match resp {
        IpcResponse::Ok { data } => data,
        IpcResponse::Error { code, message } => fail(&code, &message),
    }
}

fn fail(code: &str, message: &str) -> ! {
    eprintln!("error ({code}): {message}");
    std::process::exit(1);
}

fn print_response(resp: IpcResponse) {
    match ok_data(resp) {
        Some(data) => println!(
            "{}",
            serde_json::to_string_pretty(&data).unwrap_or_default()
        ),
        None => println!("ok"),
    }
}

fn print_wallpaper(resp: IpcResponse) {
    if let Some(data) = ok_data(resp) {
        match data["wallpaper"].as_str() {
            Some(path) => println!("{path}"),
            None => println!("{data}"),
        }
    }
}

fn print_status(status: &DaemonStatus) {
    let snapshot = &status.snapshot;
    println!("phase:       {}", status.phase);
    if let Some(next) = &status.next_change {
        println!("next change: {next}");
    }
    println!("interval:    {}s", snapshot.interval_secs);
    println!("shuffle:     {}", if snapshot.shuffle { "on" } else { "off" });
    match (&snapshot.source_path, snapshot.pinned) {
        (_, true) => println!("source:      explicit file list"),
        (Some(path), false) => println!(
            "source:      {}{}",
            path.display(),
            if snapshot.recursive { " (recursive)" } else { "" }
        ),
        (None, false) => println!("source:      none"),
    }
    println!("wallpapers:  {}", snapshot.wallpapers.len());
    if let Some(current) = &snapshot.rotation.current {
        println!("current:     {}", current.display());
    }
    if let Some(at) = &snapshot.rotation.rotated_at {
        println!("changed at:  {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("active:      {}", snapshot.active_interfaces.join(", "));
}

fn describe_interface(iface: &InterfaceInfo) -> String {
    let mut out = format!(
        "{}{}\n  {}\n",
        iface.name,
        if iface.enabled { " [active]" } else { "" },
        iface.args.join(" ")
    );
    for (name, var) in &iface.variables {
        let line = match var {
            Variable::Constant { value } => {
                format!("{name} ({}, constant) = {value}", value.kind())
            }
            Variable::Mutable { value } => format!("{name} ({}) = {value}", value.kind()),
            Variable::Enumeration { current, options } => {
                let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                format!(
                    "{name} ({}) = {current}  options: {}",
                    current.kind(),
                    options.join(", ")
                )
            }
        };
        out.push_str(&format!("    {line}\n"));
    }
    out
}

fn parse_switch(s: &str) -> std::result::Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got {other:?}")),
    }
}
