use super::{expand, open_keystore};
use log::{error, info, warn};
use returncodes::{MemStore, MessageKind, NodeConfig, ReturnCodesNode, StoreSnapshot};
use std::path::Path;
use std::sync::Arc;

pub fn command_process(matches: &clap::ArgMatches) {
    let (manager, _, _) = open_keystore(matches);

    let config = NodeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("returncodes process: {}", e);
        std::process::exit(1);
    });

    let state_path = expand(matches.value_of("state").unwrap_or_default());
    let store = Arc::new(MemStore::from_snapshot(load_state(&state_path)));

    info!(
        "node {} ({}) starting, max {} confirmation attempts",
        config.node_id, config.control_component_id, config.max_confirmation_attempts
    );
    let node = ReturnCodesNode::new(config, Arc::new(manager), store.clone());

    let fixed_kind = matches.value_of("kind").map(|kind| parse_kind(kind, kind));
    let mut failures = 0;

    for input in matches.values_of("INPUT").into_iter().flatten() {
        let kind = match fixed_kind {
            Some(kind) => kind,
            None => parse_kind(input, &file_name_prefix(input)),
        };

        let frame = match std::fs::read(expand(input)) {
            Ok(frame) => frame,
            Err(e) => {
                error!("unable to read {}: {}", input, e);
                failures += 1;
                continue;
            }
        };

        match node.handle(kind, &frame) {
            Ok(Some(reply)) => {
                let reply_path = format!("{}.reply", expand(input));
                if let Err(e) = std::fs::write(&reply_path, reply) {
                    error!("unable to write {}: {}", reply_path, e);
                    failures += 1;
                } else {
                    info!("{} processed, reply written to {}", input, reply_path);
                }
            }
            Ok(None) => warn!("{} rejected, no reply written", input),
            Err(e) => {
                error!("{} failed: {}", input, e);
                failures += 1;
            }
        }

        // State is saved after every message
        save_state(&state_path, &store.snapshot());
    }

    if failures > 0 {
        eprintln!("returncodes process: {} message(s) failed", failures);
        std::process::exit(1);
    }
}

/// `decryption-0001.bin` is a decryption message
fn file_name_prefix(input: &str) -> String {
    Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split(|c| c == '-' || c == '_' || c == '.').next())
        .unwrap_or_default()
        .to_owned()
}

fn parse_kind(input: &str, kind: &str) -> MessageKind {
    kind.parse().unwrap_or_else(|e| {
        eprintln!("returncodes process: cannot tell the message kind of {}: {}", input, e);
        std::process::exit(1);
    })
}

fn load_state(path: &str) -> StoreSnapshot {
    if !Path::new(path).exists() {
        return StoreSnapshot::default();
    }
    let contents = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("returncodes process: unable to read state {}: {}", path, e);
        std::process::exit(1);
    });
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        eprintln!("returncodes process: unable to parse state {}: {}", path, e);
        std::process::exit(1);
    })
}

fn save_state(path: &str, snapshot: &StoreSnapshot) {
    let result = serde_json::to_string_pretty(snapshot)
        .map_err(|e| e.to_string())
        .and_then(|serialized| std::fs::write(path, serialized).map_err(|e| e.to_string()));
    if let Err(e) = result {
        eprintln!("returncodes process: unable to save state {}: {}", path, e);
        std::process::exit(1);
    }
}
