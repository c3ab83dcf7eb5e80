use crate::*;
use rand::rngs::OsRng;
use std::sync::Arc;

const GENERATION_PROOF_CONTEXT: &str = "GenEncLongCodeShares";

/// Set-up phase: exponentiate each voter's encrypted partial choice return codes and
/// encrypted confirmation key with the voter-specific keys.
pub struct GenerationEngine<Z = SigmaProofService> {
    keys: Arc<dyn KeyManager>,
    correctness_info: Arc<dyn CorrectnessInfoStore>,
    public_keys: Arc<dyn VerificationCardPublicKeyStore>,
    proofs: Arc<Z>,
    node_id: u32,
}

/// Request-scoped values shared by every input of one generation chunk
struct GenerationContext<'a> {
    election_event_id: &'a str,
    group: &'a MathGroup,
    master: &'a Exponent,
    node_id: u32,
}

impl<Z: ZeroKnowledgeProof> GenerationEngine<Z> {
    pub fn new(
        keys: Arc<dyn KeyManager>,
        correctness_info: Arc<dyn CorrectnessInfoStore>,
        public_keys: Arc<dyn VerificationCardPublicKeyStore>,
        proofs: Arc<Z>,
        node_id: u32,
    ) -> Self {
        GenerationEngine {
            keys,
            correctness_info,
            public_keys,
            proofs,
            node_id,
        }
    }

    pub fn process(
        &self,
        request: &GenerationRequest,
    ) -> Result<Outcome<GenerationResponse>, ProcessingError> {
        let payload = request.payload.inner();
        let eeid = payload.election_event_id.as_str();
        let vcsid = payload.verification_card_set_id.as_str();

        let mut invalid = Vec::new();
        if request.request_id.trim().is_empty() {
            invalid.push("requestId".to_owned());
        }
        if eeid.trim().is_empty() {
            invalid.push("electionEventId".to_owned());
        }
        if vcsid.trim().is_empty() {
            invalid.push("verificationCardSetId".to_owned());
        }
        if payload.return_code_generation_inputs.is_empty() {
            invalid.push("returnCodeGenerationInputs".to_owned());
        }
        if !invalid.is_empty() {
            return Err(ProcessingError::InvalidRequest(invalid));
        }

        info!(
            "processing generation request {} for verification card set {} ({}) chunk {}",
            request.request_id, vcsid, eeid, payload.chunk_id
        );

        let platform_ca = self.keys.platform_ca_certificate()?;
        match request.payload.verify_signature(&platform_ca) {
            Ok(()) => {}
            Err(Error::MissingSignature) => reject!(RejectionReason::MissingSignature),
            Err(e) => reject!(RejectionReason::InvalidSignature(e.to_string())),
        }

        let secret_key = self.keys.ccrj_return_codes_generation_secret_key(eeid, vcsid)?;
        let group = secret_key.group();
        if group != &payload.group {
            reject!(RejectionReason::GroupMismatch);
        }

        let context = GenerationContext {
            election_event_id: eeid,
            group,
            master: &secret_key.keys()[0],
            node_id: self.node_id,
        };

        // Compute everything before persisting anything
        let mut outputs = Vec::with_capacity(payload.return_code_generation_inputs.len());
        let mut voter_public_keys = Vec::with_capacity(payload.return_code_generation_inputs.len());
        for input in &payload.return_code_generation_inputs {
            if !group.are_members(&input.verification_card_public_key) {
                reject!(RejectionReason::NotGroupMember("verificationCardPublicKey"));
            }
            match self.generate(&context, input) {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    error!(
                        "return code generation failed for verification card {}: {}",
                        input.verification_card_id, e
                    );
                    reject!(RejectionReason::Cryptographic(e.to_string()));
                }
            }
            voter_public_keys.push(VerificationCardPublicKeyExtended {
                election_event_id: eeid.to_owned(),
                verification_card_set_id: vcsid.to_owned(),
                verification_card_id: input.verification_card_id.clone(),
                public_key: input.verification_card_public_key.clone(),
            });
        }

        for public_key in voter_public_keys {
            self.public_keys.set_verification_card_public_key(public_key);
        }
        let inserted = self
            .correctness_info
            .insert_correctness_info_if_absent(CombinedCorrectnessInfo {
                election_event_id: eeid.to_owned(),
                verification_card_set_id: vcsid.to_owned(),
                total_number_of_selections: payload
                    .combined_correctness_information
                    .total_number_of_selections,
            });
        if inserted {
            debug!("stored correctness information for verification card set {}", vcsid);
        }

        let response_payload = ReturnCodeGenerationResponsePayload {
            tenant_id: payload.tenant_id.clone(),
            election_event_id: eeid.to_owned(),
            verification_card_set_id: vcsid.to_owned(),
            chunk_id: payload.chunk_id,
            group: group.clone(),
            return_code_generation_outputs: outputs,
            node_id: self.node_id,
        };

        let signing_key = self.keys.election_signing_private_key(eeid)?;
        let chain = self.keys.election_signing_certificate_chain(eeid)?;
        let signed = Signed::sign(&signing_key, chain, response_payload)?;

        info!(
            "return code generation request {} processed, {} verification cards",
            request.request_id,
            signed.return_code_generation_outputs.len()
        );

        Ok(Outcome::Completed(ChoiceCodeGenerationDto {
            correlation_id: request.correlation_id,
            request_id: request.request_id.clone(),
            payload: signed,
        }))
    }

    fn generate(
        &self,
        context: &GenerationContext,
        input: &ReturnCodeGenerationInput,
    ) -> Result<ReturnCodeGenerationOutput, Error> {
        let group = context.group;
        let vcid = input.verification_card_id.as_str();

        let master = context.master;
        let choice_key =
            derive_voter_key_for(master, VoterKeyKind::ChoiceReturnCodes, vcid, group)?;
        let vote_cast_key =
            derive_voter_key_for(master, VoterKeyKind::VoteCastReturnCode, vcid, group)?;

        let g = group.generator();
        let choice_public_key = g.exponentiate(&choice_key);
        let vote_cast_public_key = g.exponentiate(&vote_cast_key);

        let partial_choice_codes = Ciphertext::from_values(
            group,
            &input.encrypted_hashed_squared_partial_choice_return_codes,
        )?;
        let confirmation_key =
            Ciphertext::from_values(group, &input.encrypted_hashed_squared_confirmation_key)?;

        let exponentiated_partial_choice_codes = partial_choice_codes.exponentiate(&choice_key);
        let exponentiated_confirmation_key = confirmation_key.exponentiate(&vote_cast_key);

        let auxiliary = vec![
            context.election_event_id.to_owned(),
            vcid.to_owned(),
            GENERATION_PROOF_CONTEXT.to_owned(),
            context.node_id.to_string(),
        ];
        let mut csprng = OsRng {};

        let partial_choice_codes_proof = self.exponentiation_proof(
            &choice_public_key,
            &partial_choice_codes,
            &exponentiated_partial_choice_codes,
            &choice_key,
            &auxiliary,
            &mut csprng,
        )?;
        let confirmation_key_proof = self.exponentiation_proof(
            &vote_cast_public_key,
            &confirmation_key,
            &exponentiated_confirmation_key,
            &vote_cast_key,
            &auxiliary,
            &mut csprng,
        )?;

        debug!(target: "secure_log", "generated return code shares for verification card {}", vcid);

        Ok(ReturnCodeGenerationOutput {
            verification_card_id: vcid.to_owned(),
            voter_choice_return_code_generation_public_key: vec![choice_public_key.into_value()],
            voter_vote_cast_return_code_generation_public_key: vec![
                vote_cast_public_key.into_value()
            ],
            exponentiated_encrypted_partial_choice_return_codes: exponentiated_partial_choice_codes
                .to_values(),
            encrypted_partial_choice_return_code_exponentiation_proof: partial_choice_codes_proof,
            exponentiated_encrypted_confirmation_key: exponentiated_confirmation_key.to_values(),
            encrypted_confirmation_key_exponentiation_proof: confirmation_key_proof,
        })
    }

    /// Bases `[g, gamma, phis..]`, exponentiated `[K, gamma', phis'..]`
    fn exponentiation_proof(
        &self,
        public_key: &GroupElement,
        ciphertext: &Ciphertext,
        exponentiated: &Ciphertext,
        exponent: &Exponent,
        auxiliary: &[String],
        csprng: &mut OsRng,
    ) -> Result<ExponentiationProof, Error> {
        let mut bases = vec![public_key.group().generator()];
        bases.extend(ciphertext.elements());
        let mut images = vec![public_key.clone()];
        images.extend(exponentiated.elements());

        self.proofs
            .gen_exponentiation_proof(&bases, exponent, &images, auxiliary, csprng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    const FIRST: &str = "1d2c0a7b4f5e4d3c8b9a0f1e2d3c4b5a";
    const SECOND: &str = "2e3d1b8c5a6f4e2d9c0b1a2f3e4d5c6b";

    #[test]
    fn generation_exponentiates_with_derived_keys_and_proves_it() {
        let fixture = Fixture::new();
        let engine = fixture.generation_engine();
        let voters = vec![fixture.voter(FIRST), fixture.voter(SECOND)];
        let request = fixture.generation_request(&voters);

        let response = engine.process(&request).unwrap().completed().unwrap();
        assert_eq!(response.correlation_id, request.correlation_id);
        response
            .payload
            .verify_signature(&fixture.platform_ca)
            .unwrap();
        assert_eq!(response.payload.node_id, fixture.config.node_id);
        assert_eq!(response.payload.return_code_generation_outputs.len(), 2);

        let master = fixture.generation_master_key();
        let proofs = SigmaProofService::default();
        let group = &fixture.group;
        let outputs = &response.payload.return_code_generation_outputs;
        for (output, voter) in outputs.iter().zip(&voters) {
            let k = derive_voter_key_for(&master, VoterKeyKind::ChoiceReturnCodes, &voter.id, group)
                .unwrap();
            let expected_key = group.generator().exponentiate(&k);
            assert_eq!(
                output.voter_choice_return_code_generation_public_key,
                vec![expected_key.value().clone()]
            );

            let generation_input = voter.generation_input();
            let input = Ciphertext::from_values(
                group,
                &generation_input.encrypted_hashed_squared_partial_choice_return_codes,
            )
            .unwrap();
            let exponentiated = Ciphertext::from_values(
                group,
                &output.exponentiated_encrypted_partial_choice_return_codes,
            )
            .unwrap();
            assert_eq!(exponentiated, input.exponentiate(&k));

            let mut bases = vec![fixture.group.generator()];
            bases.extend(input.elements());
            let mut images = vec![expected_key];
            images.extend(exponentiated.elements());
            let auxiliary = vec![
                fixture.eeid.clone(),
                voter.id.clone(),
                "GenEncLongCodeShares".to_owned(),
                fixture.config.node_id.to_string(),
            ];
            let proof = &output.encrypted_partial_choice_return_code_exponentiation_proof;
            assert!(proofs
                .verify_exponentiation_proof(&bases, &images, proof, &auxiliary)
                .unwrap());

            assert!(fixture
                .store
                .get_verification_card_public_key(&fixture.eeid, &voter.id)
                .is_some());
        }

        assert_eq!(
            fixture.store.total_number_of_selections(&fixture.eeid, &fixture.vcsid).unwrap(),
            fixture.psi
        );
    }

    #[test]
    fn unsigned_or_foreign_signed_requests_are_dropped() {
        let fixture = Fixture::new();
        let engine = fixture.generation_engine();
        let voters = vec![fixture.voter(FIRST)];

        let mut request = fixture.generation_request(&voters);
        request.payload.signature = None;
        assert_eq!(
            engine.process(&request).unwrap(),
            Outcome::Rejected(RejectionReason::MissingSignature)
        );

        let mut request = fixture.generation_request(&voters);
        request.payload.payload.chunk_id += 1;
        assert!(matches!(
            engine.process(&request).unwrap(),
            Outcome::Rejected(RejectionReason::InvalidSignature(_))
        ));

        // Nothing was persisted
        assert!(!fixture.store.has_correctness_info(&fixture.eeid, &fixture.vcsid));
    }

    #[test]
    fn empty_chunks_are_invalid_requests() {
        let fixture = Fixture::new();
        let engine = fixture.generation_engine();
        let request = fixture.generation_request(&[]);
        assert!(matches!(
            engine.process(&request),
            Err(ProcessingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn correctness_information_is_only_stored_once() {
        let fixture = Fixture::new();
        let engine = fixture.generation_engine();
        let voters = vec![fixture.voter(FIRST)];
        engine.process(&fixture.generation_request(&voters)).unwrap();

        let mut second = fixture.generation_request(&[fixture.voter(SECOND)]);
        second
            .payload
            .payload
            .combined_correctness_information
            .total_number_of_selections = fixture.psi + 3;
        let second = fixture.resign(second);
        assert!(engine.process(&second).unwrap().is_completed());

        assert_eq!(
            fixture.store.total_number_of_selections(&fixture.eeid, &fixture.vcsid).unwrap(),
            fixture.psi
        );
    }

    #[test]
    fn missing_keys_are_fatal() {
        let fixture = Fixture::new();
        let engine = fixture.generation_engine();
        let mut request = fixture.generation_request(&[fixture.voter(FIRST)]);
        request.payload.payload.verification_card_set_id =
            "ffffffffffffffffffffffffffffffff".to_owned();
        let request = fixture.resign(request);
        assert!(matches!(
            engine.process(&request),
            Err(ProcessingError::KeyManagement(KeyManagementError::NotFound(_)))
        ));
    }
}
