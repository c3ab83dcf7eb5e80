use crate::*;
use ed25519_dalek::PublicKey;
use std::sync::Arc;

/// Checks a vote and the client-side proofs that accompany it.
///
/// Every check reports `Ok(false)` on failure. Only missing protocol state is an error.
pub struct ProofsValidator<Z = SigmaProofService> {
    proofs: Arc<Z>,
    public_keys: Arc<dyn VerificationCardPublicKeyStore>,
}

impl<Z: ZeroKnowledgeProof> ProofsValidator<Z> {
    pub fn new(proofs: Arc<Z>, public_keys: Arc<dyn VerificationCardPublicKeyStore>) -> Self {
        ProofsValidator { proofs, public_keys }
    }

    /// Verify the signed election context, the voter's key signature and both vote proofs.
    pub fn validate_vote_and_proofs(
        &self,
        group: &MathGroup,
        input: &PartialChoiceReturnCodesVerificationInput,
        vote: &Vote,
        admin_board_key: &PublicKey,
    ) -> Result<bool, ProcessingError> {
        if let Err(e) = input.election_public_key.verify(admin_board_key) {
            warn!("election public key signature is invalid: {}", e);
            return Ok(false);
        }
        if let Err(e) = input.verification_card_set_data.verify(admin_board_key) {
            warn!("verification card set data signature is invalid: {}", e);
            return Ok(false);
        }
        if !self.verify_verification_card_public_key(input, vote) {
            return Ok(false);
        }

        let election_key_values = &input.election_public_key.content.public_key;
        let election_public_key = match ElGamalPublicKey::from_values(group, election_key_values) {
            Ok(key) => key,
            Err(e) => {
                warn!("election public key is not usable: {}", e);
                return Ok(false);
            }
        };
        let choice_codes_encryption_key = match ElGamalPublicKey::from_values(
            group,
            &input.verification_card_set_data.content.choice_codes_encryption_public_key,
        ) {
            Ok(key) => key,
            Err(e) => {
                warn!("choice codes encryption public key is not usable: {}", e);
                return Ok(false);
            }
        };

        // Both proofs are always evaluated
        let exponentiation = self.verify_exponentiation_proof(group, vote)?;
        let plaintext_equality = self.verify_plaintext_equality_proof(
            group,
            vote,
            &election_public_key,
            &choice_codes_encryption_key,
        )?;
        if !exponentiation {
            warn!("vote exponentiation proof is invalid");
        }
        if !plaintext_equality {
            warn!("vote plaintext equality proof is invalid");
        }

        Ok(exponentiation && plaintext_equality)
    }

    /// The voter's key must be signed by the verification card set issuer over
    /// `key || election_event_id || verification_card_id`.
    pub fn verify_verification_card_public_key(
        &self,
        input: &PartialChoiceReturnCodesVerificationInput,
        vote: &Vote,
    ) -> bool {
        let issuer = &input
            .verification_card_set_data
            .content
            .verification_card_set_issuer_certificate;
        let result = verify_detached(
            &issuer.public_key,
            &[
                vote.verification_card_public_key_bytes().as_slice(),
                vote.election_event_id.as_bytes(),
                vote.verification_card_id.as_bytes(),
            ],
            &vote.verification_card_public_key_signature,
        );
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("verification card public key signature is invalid: {}", e);
                false
            }
        }
    }

    /// Statement: bases `[g, C0, C1]` map to `[K, C'0, C'1]` under the voter's secret key,
    /// where `K` is the voter's stored public key.
    pub fn verify_exponentiation_proof(
        &self,
        group: &MathGroup,
        vote: &Vote,
    ) -> Result<bool, ProcessingError> {
        let stored = self
            .public_keys
            .get_verification_card_public_key(&vote.election_event_id, &vote.verification_card_id)
            .ok_or_else(|| {
                StateError::MissingVerificationCardPublicKey(vote.verification_card_id.clone())
            })?;

        if stored.public_key.len() != 1
            || vote.encrypted_options.len() != 2
            || vote.cipher_text_exponentiations.len() != 2
        {
            return Ok(false);
        }

        let elements = (
            group.element(stored.public_key[0].clone()),
            group.elements(&vote.encrypted_options),
            group.elements(&vote.cipher_text_exponentiations),
        );
        let (voter_key, encrypted, exponentiated) = match elements {
            (Ok(k), Ok(c), Ok(c_prime)) => (k, c, c_prime),
            _ => return Ok(false),
        };

        let bases = vec![group.generator(), encrypted[0].clone(), encrypted[1].clone()];
        let exponentiated = vec![voter_key, exponentiated[0].clone(), exponentiated[1].clone()];

        Ok(self.check(
            &Proof::Exponentiation(vote.exponentiation_proof.clone()),
            &ProofStatement::Exponentiation {
                bases: &bases,
                exponentiated: &exponentiated,
            },
            &vote.proof_auxiliary_data(),
        ))
    }

    /// Statement: `(C'0, C'1)` under the first election key subkey and
    /// `(D0, D1 * .. * Dpsi)` under the compressed choice codes encryption key
    /// hold the same plaintext.
    pub fn verify_plaintext_equality_proof(
        &self,
        group: &MathGroup,
        vote: &Vote,
        election_public_key: &ElGamalPublicKey,
        choice_codes_encryption_key: &ElGamalPublicKey,
    ) -> Result<bool, ProcessingError> {
        if vote.cipher_text_exponentiations.len() != 2
            || vote.encrypted_partial_choice_codes.len() < 2
        {
            return Ok(false);
        }
        let elements = (
            group.elements(&vote.cipher_text_exponentiations),
            group.elements(&vote.encrypted_partial_choice_codes),
        );
        let (exponentiated, partial_choice_codes) = match elements {
            (Ok(c_prime), Ok(d)) => (c_prime, d),
            _ => return Ok(false),
        };

        let ciphertexts = (
            Ciphertext::new(exponentiated[0].clone(), vec![exponentiated[1].clone()]),
            Ciphertext::new(
                partial_choice_codes[0].clone(),
                vec![group.compress(&partial_choice_codes[1..])],
            ),
        );
        let (primary, secondary) = match ciphertexts {
            (Ok(primary), Ok(secondary)) => (primary, secondary),
            _ => return Ok(false),
        };
        let secondary_key = choice_codes_encryption_key.compress();

        let statement = PlaintextEqualityStatement {
            primary: &primary,
            primary_key: election_public_key.first_subkey(),
            secondary: &secondary,
            secondary_key: &secondary_key,
        };

        Ok(self.check(
            &Proof::PlaintextEquality(vote.plaintext_equality_proof.clone()),
            &ProofStatement::PlaintextEquality(statement),
            &vote.proof_auxiliary_data(),
        ))
    }

    fn check(&self, proof: &Proof, statement: &ProofStatement, auxiliary: &[String]) -> bool {
        match self.proofs.verify(proof, statement, auxiliary) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("proof could not be checked: {}", e);
                false
            }
        }
    }
}
