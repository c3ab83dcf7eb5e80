use crate::*;
use hkdf::Hkdf;
use num_bigint::BigUint;
use sha2::Sha256;
use std::collections::HashSet;

/// Appended to the verification card id to seed the vote-cast key.
pub const CONFIRM_SEED_SUFFIX: &str = "confirm";

/// Which of a voter's two return-code keys is being derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoterKeyKind {
    ChoiceReturnCodes,
    VoteCastReturnCode,
}

impl VoterKeyKind {
    pub fn seed(self, verification_card_id: &str) -> String {
        match self {
            VoterKeyKind::ChoiceReturnCodes => verification_card_id.to_owned(),
            VoterKeyKind::VoteCastReturnCode => {
                format!("{}{}", verification_card_id, CONFIRM_SEED_SUFFIX)
            }
        }
    }
}

/// Derive a voter-specific exponent in `[0, q)` from a node master exponent and a seed.
///
/// HKDF-SHA256 over `seed || decimal(master)` produces `ceil((bits(q) + 1) / 8)` bytes;
/// the top bit is cleared and the candidate accepted if below `q`. Otherwise the raw
/// output is fed back as the next input.
///
/// In very small groups the feedback chain can enter a cycle that never yields a value
/// below `q`; that is reported as [`Error::KeyDerivation`].
pub fn derive_voter_key(
    master: &Exponent,
    seed: &str,
    group: &MathGroup,
) -> Result<Exponent, Error> {
    let bits = group.q().bits() + 1;
    let length = ((bits + 7) / 8) as usize;

    let mut input = format!("{}{}", seed, master.value()).into_bytes();
    let mut seen = HashSet::new();
    loop {
        let hkdf = Hkdf::<Sha256>::new(None, &input);
        let mut output = vec![0u8; length];
        hkdf.expand(&[], &mut output)
            .map_err(|_| Error::KeyDerivation(format!("cannot expand to {} bytes", length)))?;
        if !seen.insert(output.clone()) {
            return Err(Error::KeyDerivation(format!(
                "no value below q reachable from seed {}",
                seed
            )));
        }

        let mut candidate_bytes = output.clone();
        candidate_bytes[0] &= 0x7f;
        let candidate = BigUint::from_bytes_be(&candidate_bytes);
        if &candidate < group.q() {
            return group.exponent(candidate);
        }
        input = output;
    }
}

/// Derive the key of the given kind for a voter.
pub fn derive_voter_key_for(
    master: &Exponent,
    kind: VoterKeyKind,
    verification_card_id: &str,
    group: &MathGroup,
) -> Result<Exponent, Error> {
    derive_voter_key(master, &kind.seed(verification_card_id), group)
}
