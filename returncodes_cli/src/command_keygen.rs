use ed25519_dalek::Keypair;
use rand::rngs::OsRng;

pub fn command_keygen(_matches: &clap::ArgMatches) {
    let Keypair { secret, public } = Keypair::generate(&mut OsRng {});
    let (secret, public) = (hex::encode(secret.to_bytes()), hex::encode(public.to_bytes()));

    println!("secret-key: {}", secret);
    println!("public-key: {}", public);
}
