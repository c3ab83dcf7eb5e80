use super::{keystore_location, read_json, save_keystore};
use crate::command_certificate::parse_hex;
use ed25519_dalek::SecretKey;
use log::info;
use returncodes::{Certificate, MemKeyManager};
use std::path::Path;

pub fn command_init(matches: &clap::ArgMatches) {
    let (path, password) = keystore_location(matches);
    if Path::new(&path).exists() {
        eprintln!("returncodes init: keystore {} already exists", path);
        std::process::exit(1);
    }

    let platform_ca: Certificate = read_json(matches.value_of("platform-ca").unwrap_or_default());
    let node_ca: Certificate = read_json(matches.value_of("node-ca").unwrap_or_default());
    let node_ca_secret = parse_hex(matches.value_of("node-ca-secret"), "node-ca-secret", |bytes| {
        SecretKey::from_bytes(bytes).map_err(|e| e.to_string())
    });

    let manager = MemKeyManager::new(platform_ca, node_ca, &node_ca_secret).unwrap_or_else(|e| {
        eprintln!("returncodes init: {}", e);
        std::process::exit(1);
    });
    save_keystore(&manager, &path, &password);

    info!("created keystore {}", path);
}
