use clap::{App, AppSettings, Arg, SubCommand};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use returncodes::MemKeyManager;

mod command_certificate;
mod command_init;
mod command_keygen;
mod command_keys;
mod command_process;

use command_certificate::command_certificate;
use command_init::command_init;
use command_keygen::command_keygen;
use command_keys::command_keys;
use command_process::command_process;

const DEFAULT_KEYSTORE: &str = "~/.returncodes/keystore";

fn main() {
    let keystore_args = [
        Arg::with_name("keystore")
            .long("keystore")
            .takes_value(true)
            .help("Sealed keystore path - can also be set with RETURNCODES_KEYSTORE"),
        Arg::with_name("password")
            .long("password")
            .takes_value(true)
            .help("Keystore password - can also be set with RETURNCODES_KEYSTORE_PASSWORD"),
    ];

    let matches = App::new("Return codes control component")
        .version("0.1")
        .about("Generates, partially decrypts and exponentiates voter return codes")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("log-config")
                .long("log-config")
                .takes_value(true)
                .global(true)
                .help("log4rs configuration file, replaces the console logger"),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate an ed25519 keypair"))
        .subcommand(
            SubCommand::with_name("certificate")
                .about("Create certificates")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("root")
                        .about("Create a self-signed root certificate and its secret key")
                        .arg(Arg::with_name("SUBJECT").index(1).required(true)),
                )
                .subcommand(
                    SubCommand::with_name("issue")
                        .about("Issue a certificate for a public key")
                        .arg(Arg::with_name("SUBJECT").index(1).required(true))
                        .arg(
                            Arg::with_name("issuer")
                                .long("issuer")
                                .takes_value(true)
                                .required(true)
                                .help("Issuer certificate file (JSON)"),
                        )
                        .arg(
                            Arg::with_name("issuer-secret")
                                .long("issuer-secret")
                                .takes_value(true)
                                .required(true)
                                .help("Issuer secret key (hex)"),
                        )
                        .arg(
                            Arg::with_name("public-key")
                                .long("public-key")
                                .takes_value(true)
                                .required(true)
                                .help("Subject public key (hex)"),
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("init")
                .about("Create a sealed keystore for this node")
                .args(&keystore_args)
                .arg(
                    Arg::with_name("platform-ca")
                        .long("platform-ca")
                        .takes_value(true)
                        .required(true)
                        .help("Platform root CA certificate file (JSON)"),
                )
                .arg(
                    Arg::with_name("node-ca")
                        .long("node-ca")
                        .takes_value(true)
                        .required(true)
                        .help("Node CA certificate file (JSON), issued by the platform CA"),
                )
                .arg(
                    Arg::with_name("node-ca-secret")
                        .long("node-ca-secret")
                        .takes_value(true)
                        .required(true)
                        .help("Node CA secret key (hex)"),
                ),
        )
        .subcommand(
            SubCommand::with_name("keys")
                .about("Create keys in the keystore")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("return-codes")
                        .about("Create the return codes keys of a verification card set")
                        .args(&keystore_args)
                        .arg(
                            Arg::with_name("election-event-id")
                                .long("election-event-id")
                                .takes_value(true)
                                .required(true),
                        )
                        .arg(
                            Arg::with_name("verification-card-set-id")
                                .long("verification-card-set-id")
                                .takes_value(true)
                                .required(true),
                        )
                        .arg(
                            Arg::with_name("group")
                                .long("group")
                                .takes_value(true)
                                .required(true)
                                .help("Encryption parameters file (JSON with decimal p, q, g)"),
                        )
                        .arg(
                            Arg::with_name("length")
                                .long("length")
                                .takes_value(true)
                                .required(true)
                                .help("Choice return codes encryption key length"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("election-signing")
                        .about("Create the election signing key of an election event")
                        .args(&keystore_args)
                        .arg(
                            Arg::with_name("election-event-id")
                                .long("election-event-id")
                                .takes_value(true)
                                .required(true),
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("process")
                .about("Process framed request messages")
                .args(&keystore_args)
                .arg(
                    Arg::with_name("kind")
                        .long("kind")
                        .takes_value(true)
                        .possible_values(&["generation", "decryption", "exponentiation"])
                        .help("Message kind, otherwise taken from the start of each file name"),
                )
                .arg(
                    Arg::with_name("state")
                        .long("state")
                        .takes_value(true)
                        .default_value("returncodes-state.json")
                        .help("Node state file, created when missing"),
                )
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .multiple(true)
                        .required(true)
                        .help("Framed request files; replies are written next to them"),
                ),
        )
        .get_matches();

    // Global flags may be given before or after the subcommand
    let subcommand = matches.subcommand().1;
    let verbosity = subcommand
        .map(|m| m.occurrences_of("v"))
        .unwrap_or(0)
        .max(matches.occurrences_of("v"));
    let log_config = subcommand
        .and_then(|m| m.value_of("log-config"))
        .or_else(|| matches.value_of("log-config"));
    init_logging(verbosity, log_config);

    match matches.subcommand() {
        ("keygen", Some(matches)) => command_keygen(matches),
        ("certificate", Some(matches)) => command_certificate(matches),
        ("init", Some(matches)) => command_init(matches),
        ("keys", Some(matches)) => command_keys(matches),
        ("process", Some(matches)) => command_process(matches),
        _ => unreachable!(),
    }
}

fn init_logging(verbosity: u64, config_file: Option<&str>) {
    if let Some(config_file) = config_file {
        if let Err(e) = log4rs::init_file(expand(config_file), Default::default()) {
            eprintln!("returncodes: unable to load log config {}: {}", config_file, e);
            std::process::exit(1);
        }
        return;
    }

    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // Audit records only at -vvv
    let secure_level = if verbosity >= 3 {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {l:5} {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().build("secure_log", secure_level))
        .build(Root::builder().appender("stderr").build(level));

    let result = match config {
        Ok(config) => log4rs::init_config(config).map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        eprintln!("returncodes: unable to initialize logging: {}", e);
        std::process::exit(1);
    }
}

pub fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Keystore path and password from the arguments or the environment
pub fn keystore_location(matches: &clap::ArgMatches) -> (String, String) {
    let keystore = match matches.value_of("keystore") {
        Some(path) => path.to_owned(),
        None => {
            std::env::var("RETURNCODES_KEYSTORE").unwrap_or_else(|_| DEFAULT_KEYSTORE.to_owned())
        }
    };

    let password = match matches.value_of("password") {
        Some(password) => password.to_owned(),
        None => std::env::var("RETURNCODES_KEYSTORE_PASSWORD").unwrap_or_else(|_| {
            eprintln!("Please provide a keystore password via --password or the environment");
            std::process::exit(1);
        }),
    };

    (expand(&keystore), password)
}

pub fn open_keystore(matches: &clap::ArgMatches) -> (MemKeyManager, String, String) {
    let (path, password) = keystore_location(matches);
    let sealed = std::fs::read(&path).unwrap_or_else(|e| {
        eprintln!("returncodes: unable to read keystore {}: {}", path, e);
        std::process::exit(1);
    });
    let manager = MemKeyManager::open(&sealed, &password).unwrap_or_else(|e| {
        eprintln!("returncodes: unable to open keystore {}: {}", path, e);
        std::process::exit(1);
    });
    (manager, path, password)
}

pub fn save_keystore(manager: &MemKeyManager, path: &str, password: &str) {
    let sealed = manager.seal(password).unwrap_or_else(|e| {
        eprintln!("returncodes: unable to seal keystore: {}", e);
        std::process::exit(1);
    });
    if let Some(parent) = std::path::Path::new(path).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("returncodes: unable to create {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }
    if let Err(e) = std::fs::write(path, sealed) {
        eprintln!("returncodes: unable to write keystore {}: {}", path, e);
        std::process::exit(1);
    }
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let contents = std::fs::read_to_string(expand(path)).unwrap_or_else(|e| {
        eprintln!("returncodes: unable to read {}: {}", path, e);
        std::process::exit(1);
    });
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        eprintln!("returncodes: unable to parse {}: {}", path, e);
        std::process::exit(1);
    })
}
