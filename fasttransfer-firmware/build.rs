//! Build script for fasttransfer-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates node.toml at compile time and turns it into constants

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    setup_linker(&out_dir);
    let config = validate_config();
    generate_config(&out_dir, &config);
}

/// Set up linker search paths for memory.x
fn setup_linker(out_dir: &Path) {
    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validated node.toml contents
struct NodeToml {
    address: u8,
    peer: u8,
    baudrate: u32,
    reserved_index: u16,
    heartbeat_index: u16,
    heartbeat_interval_ms: u64,
}

/// Validate node.toml configuration at compile time
fn validate_config() -> NodeToml {
    // Re-run if node.toml changes
    println!("cargo:rerun-if-changed=node.toml");

    let config_path = Path::new("node.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: node.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a node.toml configuration file.           ║\n\
            ║  Please create one in the fasttransfer-firmware directory.       ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read node.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in node.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();

    let address = integer_in(&config, "node", "address", 0, 255, &mut errors);
    let peer = integer_in(&config, "link", "peer", 0, 255, &mut errors);
    let baudrate = integer_in(&config, "link", "baudrate", 1200, 4_000_000, &mut errors);
    let reserved_index = integer_in(&config, "link", "reserved_index", 0, 65535, &mut errors);
    let heartbeat_index = integer_in(&config, "heartbeat", "index", 0, 65535, &mut errors);
    let heartbeat_interval_ms =
        integer_in(&config, "heartbeat", "interval_ms", 10, 3_600_000, &mut errors);

    if address.is_some() && address == peer {
        errors.push("[link] peer must differ from [node] address".to_string());
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid node configuration                               ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=node.toml validated successfully");

    // Every value is Some once errors is empty
    NodeToml {
        address: address.unwrap() as u8,
        peer: peer.unwrap() as u8,
        baudrate: baudrate.unwrap() as u32,
        reserved_index: reserved_index.unwrap() as u16,
        heartbeat_index: heartbeat_index.unwrap() as u16,
        heartbeat_interval_ms: heartbeat_interval_ms.unwrap() as u64,
    }
}

/// Look up `[section] key` and check it is an integer in `min..=max`
fn integer_in(
    config: &toml::Value,
    section: &str,
    key: &str,
    min: i64,
    max: i64,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match config.get(section).and_then(|s| s.get(key)) {
        Some(toml::Value::Integer(v)) if (min..=max).contains(v) => Some(*v),
        Some(toml::Value::Integer(_)) => {
            errors.push(format!("[{}] {} must be {}-{}", section, key, min, max));
            None
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            None
        }
        None => {
            errors.push(format!("[{}] missing '{}'", section, key));
            None
        }
    }
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.chars().count() > 64 {
                format!("{}...", line.chars().take(61).collect::<String>())
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the validated values as Rust constants for `include!`
fn generate_config(out_dir: &Path, config: &NodeToml) {
    let source = format!(
        "/// This node's address\n\
         pub const NODE_ADDRESS: u8 = {};\n\
         /// Heartbeat destination\n\
         pub const PEER_ADDRESS: u8 = {};\n\
         /// UART0 baud rate\n\
         pub const BAUDRATE: u32 = {};\n\
         /// Local array index only the link port may write\n\
         pub const RESERVED_INDEX: u16 = {};\n\
         /// Peer array index receiving the heartbeat counter\n\
         pub const HEARTBEAT_INDEX: u16 = {};\n\
         /// Milliseconds between heartbeats\n\
         pub const HEARTBEAT_INTERVAL_MS: u64 = {};\n",
        config.address,
        config.peer,
        config.baudrate,
        config.reserved_index,
        config.heartbeat_index,
        config.heartbeat_interval_ms,
    );
    fs::write(out_dir.join("node_config.rs"), source).unwrap();
}
