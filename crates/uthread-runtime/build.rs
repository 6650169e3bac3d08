//! Build script for uthread-runtime
//!
//! Merges compile-time configuration:
//! 1. Start with library defaults
//! 2. If UTHREAD_CONFIG_RS is set, read the user's constants file
//! 3. Override defaults with every known constant whose declared type matches
//! 4. Write OUT_DIR/uthread_merged_config.rs
//!
//! The user file only needs the constants it wants to change, e.g.
//!
//! ```text
//! pub const SCHED_POLICY: &str = "priority";
//! pub const ENABLE_PREEMPTION: bool = true;
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration parameter definition
struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

/// All configuration parameters with their defaults
const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "SCHED_POLICY",
        rust_type: "&str",
        default_value: "\"fifo\"",
    },
    ConfigParam {
        name: "ENABLE_PREEMPTION",
        rust_type: "bool",
        default_value: "false",
    },
    ConfigParam {
        name: "QUANTUM_MS",
        rust_type: "u64",
        default_value: "10",
    },
    ConfigParam {
        name: "STACK_SIZE",
        rust_type: "usize",
        default_value: "128 * 1024",
    },
    ConfigParam {
        name: "GUARD_PAGES",
        rust_type: "bool",
        default_value: "true",
    },
    ConfigParam {
        name: "DEBUG_LOGGING",
        rust_type: "bool",
        default_value: "false",
    },
];

/// One `pub const` declaration lifted from the user file
#[derive(Debug, PartialEq)]
struct ConstDecl {
    name: String,
    rust_type: String,
    value: String,
}

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("uthread_merged_config.rs");

    let mut config: BTreeMap<&'static str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    println!("cargo:rerun-if-env-changed=UTHREAD_CONFIG_RS");

    let user_path = env::var("UTHREAD_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(content) => {
                for warning in merge(&content, &mut config) {
                    println!("cargo:warning={}", warning);
                }
                println!("cargo:warning=uthread: using config overrides from {}", path);
            }
            Err(e) => {
                println!("cargo:warning=uthread: cannot read UTHREAD_CONFIG_RS ({}): {}", path, e);
            }
        }
    }

    let output = render(&config, user_path.as_deref());
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Apply the user's declarations; returns warnings for rejected lines
fn merge(content: &str, config: &mut BTreeMap<&'static str, String>) -> Vec<String> {
    let mut warnings = Vec::new();

    for decl in content.lines().filter_map(parse_const_line) {
        match CONFIG_PARAMS.iter().find(|p| p.name == decl.name) {
            Some(param) if param.rust_type == decl.rust_type => {
                config.insert(param.name, decl.value);
            }
            Some(param) => warnings.push(format!(
                "uthread: {} must be declared as {}, found {}",
                param.name, param.rust_type, decl.rust_type
            )),
            None => warnings.push(format!("uthread: unknown config parameter {}", decl.name)),
        }
    }

    warnings
}

/// Parse `pub const NAME: TYPE = VALUE;`
fn parse_const_line(line: &str) -> Option<ConstDecl> {
    let line = line.trim();
    if line.starts_with("//") {
        return None;
    }
    let rest = line.strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (rust_type, rest) = rest.split_once('=')?;
    let value = rest.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }

    Some(ConstDecl {
        name: name.trim().to_string(),
        rust_type: rust_type.trim().replace("&'static str", "&str"),
        value: value.to_string(),
    })
}

fn render(config: &BTreeMap<&'static str, String>, user_path: Option<&str>) -> String {
    let mut output = String::from("// Auto-generated by build.rs - do not edit\n");
    match user_path {
        Some(path) => output.push_str(&format!("// Library defaults merged with {}\n\n", path)),
        None => output.push_str("// Library defaults\n\n"),
    }

    for param in CONFIG_PARAMS {
        let value = config.get(param.name).map_or(param.default_value, String::as_str);
        let rust_type = if param.rust_type == "&str" { "&'static str" } else { param.rust_type };
        output.push_str(&format!("pub const {}: {} = {};\n", param.name, rust_type, value));
    }

    output
}
