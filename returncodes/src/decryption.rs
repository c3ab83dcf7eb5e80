use crate::*;
use ed25519_dalek::PublicKey;
use rand::rngs::OsRng;
use std::sync::Arc;

const DECRYPTION_PROOF_CONTEXT: &str = "PartialDecryptPCC";

/// Number of elements in `encryptedOptions` and `cipherTextExponentiations`
pub const CIPHERTEXT_ELEMENT_COUNT: usize = 2;

/// Voting phase, first step: partially decrypt a voter's encrypted partial choice return codes.
///
/// Happens at most once per verification card. A successful run creates the card's record.
pub struct DecryptionEngine<Z = SigmaProofService> {
    keys: Arc<dyn KeyManager>,
    correctness_info: Arc<dyn CorrectnessInfoStore>,
    cards: Arc<dyn VerificationCardStore>,
    validator: ProofsValidator<Z>,
    proofs: Arc<Z>,
    locks: Arc<CardLocks>,
    node_id: u32,
}

impl<Z: ZeroKnowledgeProof> DecryptionEngine<Z> {
    pub fn new(
        keys: Arc<dyn KeyManager>,
        correctness_info: Arc<dyn CorrectnessInfoStore>,
        cards: Arc<dyn VerificationCardStore>,
        public_keys: Arc<dyn VerificationCardPublicKeyStore>,
        proofs: Arc<Z>,
        locks: Arc<CardLocks>,
        node_id: u32,
    ) -> Self {
        DecryptionEngine {
            keys,
            correctness_info,
            cards,
            validator: ProofsValidator::new(proofs.clone(), public_keys),
            proofs,
            locks,
            node_id,
        }
    }

    pub fn process(
        &self,
        request: &ComputationRequest,
    ) -> Result<Outcome<DecryptionResponse>, ProcessingError> {
        let invalid = request.invalid_fields();
        if !invalid.is_empty() {
            return Err(ProcessingError::InvalidRequest(invalid));
        }
        let input = match &request.payload {
            Some(input) => input,
            None => return Err(ProcessingError::InvalidRequest(vec!["payload".to_owned()])),
        };
        let eeid = request.election_event_id.as_str();
        let vcid = request.verification_card_id.as_str();

        info!(
            "processing partial decryption request {} for verification card {}",
            request.request_id, vcid
        );

        let vcsid = request.verification_card_set_id.as_str();
        let group = match self.keys.encryption_parameters(eeid, vcsid) {
            Ok(group) => group,
            Err(e) => {
                warn!("no encryption parameters for verification card set {}: {}", vcsid, e);
                reject!(RejectionReason::MissingGroup);
            }
        };

        let verification_input = match &input.partial_choice_return_codes_verification_input {
            Some(verification_input) => verification_input,
            None => reject!(RejectionReason::MissingVerificationInput),
        };
        if input.confirmation_key_verification_input.is_some() {
            reject!(RejectionReason::UnexpectedConfirmationInput);
        }

        let outcome = self.locks.with_card(eeid, vcid, || {
            self.decrypt_locked(request, input, verification_input, &group)
        })?;

        let payload = match outcome {
            Outcome::Completed(payload) => payload,
            Outcome::Rejected(reason) => {
                warn!(
                    "partial decryption request {} for verification card {} dropped: {}",
                    request.request_id, vcid, reason
                );
                return Ok(Outcome::Rejected(reason));
            }
        };

        let signing_key = match self.keys.election_signing_private_key(eeid) {
            Ok(key) => key,
            Err(e) => reject!(RejectionReason::KeyUnavailable(e)),
        };
        let chain = match self.keys.election_signing_certificate_chain(eeid) {
            Ok(chain) => chain,
            Err(e) => reject!(RejectionReason::KeyUnavailable(e)),
        };
        let signed = Signed::sign(&signing_key, chain, payload)?;

        info!("partial decryption request {} processed", request.request_id);
        Ok(Outcome::Completed(request.reply(signed)))
    }

    /// Everything from the duplicate check to persisting the record runs under the card lock.
    fn decrypt_locked(
        &self,
        request: &ComputationRequest,
        input: &ReturnCodesInput,
        verification_input: &PartialChoiceReturnCodesVerificationInput,
        group: &MathGroup,
    ) -> Result<Outcome<ChoiceCodesVerificationDecryptResPayload>, ProcessingError> {
        let eeid = request.election_event_id.as_str();
        let vcsid = request.verification_card_set_id.as_str();
        let vcid = request.verification_card_id.as_str();

        if self.cards.has_verification_card(eeid, vcid) {
            reject!(RejectionReason::AlreadyDecrypted);
        }

        let vote: Vote = match serde_json::from_str(&verification_input.vote) {
            Ok(vote) => vote,
            Err(e) => reject!(RejectionReason::MalformedVote(e.to_string())),
        };
        if vote.election_event_id != eeid || vote.verification_card_id != vcid {
            reject!(RejectionReason::VoteMismatch);
        }

        let server_elements = match &input.return_codes_input_elements {
            Some(elements) => elements,
            None => reject!(RejectionReason::MissingReturnCodesInput),
        };
        if let Some(reason) =
            self.check_input_consistency(group, eeid, vcsid, &vote, server_elements)?
        {
            reject!(reason);
        }

        let admin_board_key = match self.validate_certificates(input)? {
            Ok(key) => key,
            Err(reason) => reject!(reason),
        };

        if !self
            .validator
            .validate_vote_and_proofs(group, verification_input, &vote, &admin_board_key)?
        {
            reject!(RejectionReason::InvalidProofs);
        }

        let payload = match self.partially_decrypt(group, eeid, vcsid, vcid, &server_elements[0]) {
            Ok(payload) => payload,
            Err(reason) => reject!(reason),
        };

        if !self
            .cards
            .insert_verification_card_if_absent(VerificationCardRecord::new(eeid, vcid))
        {
            reject!(RejectionReason::AlreadyDecrypted);
        }

        Ok(Outcome::Completed(payload))
    }

    /// Shape and membership checks on the vote and the server-held list.
    fn check_input_consistency(
        &self,
        group: &MathGroup,
        eeid: &str,
        vcsid: &str,
        vote: &Vote,
        server_elements: &[num_bigint::BigUint],
    ) -> Result<Option<RejectionReason>, ProcessingError> {
        let psi = self.correctness_info.total_number_of_selections(eeid, vcsid)?;

        let client_elements = &vote.encrypted_partial_choice_codes;
        if client_elements.len() != psi + 1 {
            return Ok(Some(RejectionReason::WrongNumberOfElements {
                what: "encryptedPartialChoiceCodes",
                expected: psi + 1,
                found: client_elements.len(),
            }));
        }
        if !group.are_members(client_elements) {
            return Ok(Some(RejectionReason::NotGroupMember("encryptedPartialChoiceCodes")));
        }
        if server_elements.is_empty() {
            return Ok(Some(RejectionReason::MissingReturnCodesInput));
        }
        if !group.are_members(server_elements) {
            return Ok(Some(RejectionReason::NotGroupMember("returnCodesInputElements")));
        }
        for &(what, values) in [
            ("cipherTextExponentiations", &vote.cipher_text_exponentiations),
            ("encryptedOptions", &vote.encrypted_options),
        ]
        .iter()
        {
            if values.len() != CIPHERTEXT_ELEMENT_COUNT {
                return Ok(Some(RejectionReason::WrongNumberOfElements {
                    what,
                    expected: CIPHERTEXT_ELEMENT_COUNT,
                    found: values.len(),
                }));
            }
            if !group.are_members(values.iter()) {
                return Ok(Some(RejectionReason::NotGroupMember(what)));
            }
        }
        if server_elements[0] != client_elements[0] {
            return Ok(Some(RejectionReason::FirstElementMismatch));
        }
        Ok(None)
    }

    /// Validate `[admin board, tenant CA]` against the platform CA, yielding the admin board key.
    fn validate_certificates(
        &self,
        input: &ReturnCodesInput,
    ) -> Result<Result<PublicKey, RejectionReason>, ProcessingError> {
        let certificates = match &input.certificates {
            Some(certificates) => certificates,
            None => return Ok(Err(RejectionReason::MissingCertificates)),
        };
        let platform_ca = match self.keys.platform_ca_certificate() {
            Ok(ca) => ca,
            Err(e) => return Ok(Err(RejectionReason::KeyUnavailable(e))),
        };
        let chain = [certificates.admin_board.clone(), certificates.tenant_ca.clone()];
        if let Err(e) = validate_chain(&chain, &platform_ca) {
            return Ok(Err(RejectionReason::InvalidCertificateChain(e.to_string())));
        }
        Ok(Ok(certificates.admin_board.public_key))
    }

    /// Raise `gamma` to every element of the choice codes encryption secret key and prove it.
    fn partially_decrypt(
        &self,
        group: &MathGroup,
        eeid: &str,
        vcsid: &str,
        vcid: &str,
        gamma: &num_bigint::BigUint,
    ) -> Result<ChoiceCodesVerificationDecryptResPayload, RejectionReason> {
        let secret_key = self
            .keys
            .ccrj_choice_return_codes_encryption_secret_key(eeid, vcsid)
            .map_err(RejectionReason::KeyUnavailable)?;
        let public_key = secret_key.public_key();

        let gamma = group
            .element(gamma.clone())
            .map_err(|e| RejectionReason::Cryptographic(e.to_string()))?;
        let outputs: Vec<GroupElement> = secret_key
            .keys()
            .iter()
            .map(|k| gamma.exponentiate(k))
            .collect();

        let bases = vec![group.generator(), gamma];
        let exponentiated = vec![public_key.compress(), group.compress(&outputs)];
        let auxiliary = vec![
            eeid.to_owned(),
            vcid.to_owned(),
            DECRYPTION_PROOF_CONTEXT.to_owned(),
            self.node_id.to_string(),
        ];
        let proof = self
            .proofs
            .gen_exponentiation_proof(
                &bases,
                &secret_key.compress(),
                &exponentiated,
                &auxiliary,
                &mut OsRng {},
            )
            .map_err(|e| RejectionReason::Cryptographic(e.to_string()))?;

        debug!(
            target: "secure_log",
            "partially decrypted partial choice return codes of verification card {}",
            vcid
        );

        Ok(ChoiceCodesVerificationDecryptResPayload {
            decrypt_contribution_result: values_of(&outputs),
            exponentiation_proof: proof,
            public_key: public_key.to_values(),
        })
    }
}
