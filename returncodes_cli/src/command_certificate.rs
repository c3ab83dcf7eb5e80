use super::read_json;
use ed25519_dalek::{PublicKey, SecretKey};
use returncodes::Certificate;

pub fn command_certificate(matches: &clap::ArgMatches) {
    if let Some(matches) = matches.subcommand_matches("root") {
        command_certificate_root(matches);
    }
    if let Some(matches) = matches.subcommand_matches("issue") {
        command_certificate_issue(matches);
    }
}

fn command_certificate_root(matches: &clap::ArgMatches) {
    let subject = matches.value_of("SUBJECT").unwrap_or_default();
    let (certificate, secret) = Certificate::new_root(subject).unwrap_or_else(|e| {
        eprintln!("returncodes certificate: unable to create root certificate: {}", e);
        std::process::exit(1);
    });

    eprintln!("secret-key: {}", hex::encode(secret.to_bytes()));
    print_certificate(&certificate);
}

fn command_certificate_issue(matches: &clap::ArgMatches) {
    let subject = matches.value_of("SUBJECT").unwrap_or_default();
    let issuer: Certificate = read_json(matches.value_of("issuer").unwrap_or_default());
    let issuer_secret = parse_hex(matches.value_of("issuer-secret"), "issuer-secret", |bytes| {
        SecretKey::from_bytes(bytes).map_err(|e| e.to_string())
    });
    let public_key = parse_hex(matches.value_of("public-key"), "public-key", |bytes| {
        PublicKey::from_bytes(bytes).map_err(|e| e.to_string())
    });

    if PublicKey::from(&issuer_secret) != issuer.public_key {
        eprintln!("returncodes certificate: issuer-secret does not match the issuer certificate");
        std::process::exit(1);
    }

    let certificate = issuer
        .issue(&issuer_secret, subject, public_key)
        .unwrap_or_else(|e| {
            eprintln!("returncodes certificate: unable to issue certificate: {}", e);
            std::process::exit(1);
        });
    print_certificate(&certificate);
}

fn print_certificate(certificate: &Certificate) {
    let serialized = serde_json::to_string_pretty(certificate).unwrap_or_else(|e| {
        eprintln!("returncodes certificate: unable to serialize certificate: {}", e);
        std::process::exit(1);
    });
    println!("{}", serialized);
}

pub fn parse_hex<T, F>(value: Option<&str>, name: &str, parse: F) -> T
where
    F: FnOnce(&[u8]) -> Result<T, String>,
{
    let value = value.unwrap_or_default();
    let bytes = hex::decode(value).unwrap_or_else(|e| {
        eprintln!("returncodes: invalid {}: {}", name, e);
        std::process::exit(1);
    });
    parse(&bytes).unwrap_or_else(|e| {
        eprintln!("returncodes: invalid {}: {}", name, e);
        std::process::exit(1);
    })
}
