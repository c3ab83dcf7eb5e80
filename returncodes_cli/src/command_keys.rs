use super::{open_keystore, read_json, save_keystore};
use returncodes::{CcrjReturnCodesKeysSpec, KeyManager, MathGroup, SignedPublicKey};
use serde_json::json;

pub fn command_keys(matches: &clap::ArgMatches) {
    if let Some(matches) = matches.subcommand_matches("return-codes") {
        command_keys_return_codes(matches);
    }
    if let Some(matches) = matches.subcommand_matches("election-signing") {
        command_keys_election_signing(matches);
    }
}

fn command_keys_return_codes(matches: &clap::ArgMatches) {
    let (manager, path, password) = open_keystore(matches);

    let group: MathGroup = read_json(matches.value_of("group").unwrap_or_default());
    let length = matches
        .value_of("length")
        .unwrap_or_default()
        .parse()
        .unwrap_or_else(|e| {
            eprintln!("returncodes keys: invalid length: {}", e);
            std::process::exit(1);
        });
    let spec = CcrjReturnCodesKeysSpec {
        election_event_id: matches.value_of("election-event-id").unwrap_or_default().to_owned(),
        verification_card_set_id: matches
            .value_of("verification-card-set-id")
            .unwrap_or_default()
            .to_owned(),
        group,
        choice_codes_encryption_key_length: length,
    };

    let public_keys = manager.create_ccrj_return_codes_keys(&spec).unwrap_or_else(|e| {
        eprintln!("returncodes keys: {}", e);
        std::process::exit(1);
    });
    save_keystore(&manager, &path, &password);

    let output = json!({
        "electionEventId": spec.election_event_id,
        "verificationCardSetId": spec.verification_card_set_id,
        "generationPublicKey": signed_public_key_json(&public_keys.generation_public_key),
        "choiceCodesEncryptionPublicKey":
            signed_public_key_json(&public_keys.choice_codes_encryption_public_key),
    });
    println!("{:#}", output);
}

fn command_keys_election_signing(matches: &clap::ArgMatches) {
    let (manager, path, password) = open_keystore(matches);
    let election_event_id = matches.value_of("election-event-id").unwrap_or_default();

    let certificate = manager
        .create_election_signing_keys(election_event_id)
        .unwrap_or_else(|e| {
            eprintln!("returncodes keys: {}", e);
            std::process::exit(1);
        });
    save_keystore(&manager, &path, &password);

    match serde_json::to_string_pretty(&certificate) {
        Ok(serialized) => println!("{}", serialized),
        Err(e) => {
            eprintln!("returncodes keys: unable to serialize certificate: {}", e);
            std::process::exit(1);
        }
    }
}

fn signed_public_key_json(key: &SignedPublicKey) -> serde_json::Value {
    let values: Vec<String> = key
        .public_key
        .to_values()
        .iter()
        .map(|v| v.to_str_radix(10))
        .collect();
    json!({
        "publicKey": values,
        "signature": hex::encode(key.signature.to_bytes()),
    })
}
