use crate::*;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use std::collections::HashSet;
use std::sync::Arc;

const CHOICE_PROOF_CONTEXT: &str = "CreateLCCShare";
const VOTE_CAST_PROOF_CONTEXT: &str = "CreateLVCCShare";

/// Which exponentiation a request asks for. A request carrying a confirmation key
/// verification input is a vote-cast request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExponentiationPhase {
    ChoiceReturnCodes,
    VoteCastReturnCode,
}

impl ExponentiationPhase {
    pub fn of(input: &ReturnCodesInput) -> Self {
        if input.confirmation_key_verification_input.is_some() {
            ExponentiationPhase::VoteCastReturnCode
        } else {
            ExponentiationPhase::ChoiceReturnCodes
        }
    }

    fn key_kind(self) -> VoterKeyKind {
        match self {
            ExponentiationPhase::ChoiceReturnCodes => VoterKeyKind::ChoiceReturnCodes,
            ExponentiationPhase::VoteCastReturnCode => VoterKeyKind::VoteCastReturnCode,
        }
    }

    fn proof_context(self) -> &'static str {
        match self {
            ExponentiationPhase::ChoiceReturnCodes => CHOICE_PROOF_CONTEXT,
            ExponentiationPhase::VoteCastReturnCode => VOTE_CAST_PROOF_CONTEXT,
        }
    }
}

/// Voting phase, later steps: compute the node's long return code shares from the
/// partial choice return codes, or from the confirmation key.
pub struct ExponentiationEngine<Z = SigmaProofService, H = Sha256HashService> {
    keys: Arc<dyn KeyManager>,
    correctness_info: Arc<dyn CorrectnessInfoStore>,
    cards: Arc<dyn VerificationCardStore>,
    proofs: Arc<Z>,
    hash: H,
    locks: Arc<CardLocks>,
    node_id: u32,
    max_confirmation_attempts: u32,
}

impl<Z: ZeroKnowledgeProof, H: HashService> ExponentiationEngine<Z, H> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keys: Arc<dyn KeyManager>,
        correctness_info: Arc<dyn CorrectnessInfoStore>,
        cards: Arc<dyn VerificationCardStore>,
        proofs: Arc<Z>,
        hash: H,
        locks: Arc<CardLocks>,
        node_id: u32,
        max_confirmation_attempts: u32,
    ) -> Self {
        ExponentiationEngine {
            keys,
            correctness_info,
            cards,
            proofs,
            hash,
            locks,
            node_id,
            max_confirmation_attempts,
        }
    }

    pub fn process(
        &self,
        request: &ComputationRequest,
    ) -> Result<Outcome<ExponentiationResponse>, ProcessingError> {
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
        let phase = ExponentiationPhase::of(input);

        info!(
            "processing {:?} exponentiation request {} for verification card {}",
            phase, request.request_id, vcid
        );

        let vcsid = request.verification_card_set_id.as_str();
        let group = match self.keys.encryption_parameters(eeid, vcsid) {
            Ok(group) => group,
            Err(e) => {
                warn!("no encryption parameters for verification card set {}: {}", vcsid, e);
                reject!(RejectionReason::MissingGroup);
            }
        };

        let outcome = self
            .locks
            .with_card(eeid, vcid, || self.exponentiate_locked(request, input, phase, &group))?;

        let payload = match outcome {
            Outcome::Completed(payload) => payload,
            Outcome::Rejected(reason) => {
                warn!(
                    "exponentiation request {} for verification card {} dropped: {}",
                    request.request_id, vcid, reason
                );
                return Ok(Outcome::Rejected(reason));
            }
        };

        let signing_key = self.keys.election_signing_private_key(eeid)?;
        let chain = self.keys.election_signing_certificate_chain(eeid)?;
        let signed = Signed::sign(&signing_key, chain, payload)?;

        info!("exponentiation request {} processed", request.request_id);
        Ok(Outcome::Completed(request.reply(signed)))
    }

    /// State checks, computation and the state update, under the card lock.
    fn exponentiate_locked(
        &self,
        request: &ComputationRequest,
        input: &ReturnCodesInput,
        phase: ExponentiationPhase,
        group: &MathGroup,
    ) -> Result<Outcome<ReturnCodesExponentiationResponsePayload>, ProcessingError> {
        let eeid = request.election_event_id.as_str();
        let vcsid = request.verification_card_set_id.as_str();
        let vcid = request.verification_card_id.as_str();

        let mut record = self.cards.get_verification_card(eeid, vcid).ok_or_else(|| {
            StateError::MissingComputedVerificationCard {
                election_event_id: eeid.to_owned(),
                verification_card_id: vcid.to_owned(),
            }
        })?;

        let elements = match phase {
            ExponentiationPhase::ChoiceReturnCodes => {
                if record.exponentiation_computed {
                    return Err(StateError::AlreadyExponentiated(vcid.to_owned()).into());
                }
                match self.check_partial_choice_return_codes(group, eeid, vcsid, input)? {
                    Ok(elements) => elements,
                    Err(reason) => reject!(reason),
                }
            }
            ExponentiationPhase::VoteCastReturnCode => {
                if !record.exponentiation_computed {
                    return Err(StateError::NotExponentiated(vcid.to_owned()).into());
                }
                if record.confirmation_attempts >= self.max_confirmation_attempts {
                    reject!(RejectionReason::ConfirmationAttemptsExceeded(
                        self.max_confirmation_attempts
                    ));
                }
                match check_confirmation_key(group, input) {
                    Ok(elements) => elements,
                    Err(reason) => reject!(reason),
                }
            }
        };

        let master = self.keys.ccrj_return_codes_generation_secret_key(eeid, vcsid)?;
        let payload = match self.compute(group, &master.keys()[0], eeid, vcid, phase, &elements) {
            Ok(payload) => payload,
            Err(e) => reject!(RejectionReason::Cryptographic(e.to_string())),
        };

        // Persist before the reply leaves this node
        match phase {
            ExponentiationPhase::ChoiceReturnCodes => record.exponentiation_computed = true,
            ExponentiationPhase::VoteCastReturnCode => record.confirmation_attempts += 1,
        }
        self.cards.set_verification_card(record);

        Ok(Outcome::Completed(payload))
    }

    /// Exactly `psi` pairwise distinct group members.
    fn check_partial_choice_return_codes(
        &self,
        group: &MathGroup,
        eeid: &str,
        vcsid: &str,
        input: &ReturnCodesInput,
    ) -> Result<Result<Vec<GroupElement>, RejectionReason>, ProcessingError> {
        let values = match &input.return_codes_input_elements {
            Some(values) => values,
            None => return Ok(Err(RejectionReason::MissingReturnCodesInput)),
        };
        let psi = self.correctness_info.total_number_of_selections(eeid, vcsid)?;
        if values.len() != psi {
            return Ok(Err(RejectionReason::WrongNumberOfElements {
                what: "partialChoiceReturnCodes",
                expected: psi,
                found: values.len(),
            }));
        }
        let distinct: HashSet<&BigUint> = values.iter().collect();
        if distinct.len() != values.len() {
            return Ok(Err(RejectionReason::DuplicateElements));
        }
        Ok(group
            .elements(values)
            .map_err(|_| RejectionReason::NotGroupMember("partialChoiceReturnCodes")))
    }

    /// `hash_and_square` each input, raise to the voter key of the phase, and prove it.
    fn compute(
        &self,
        group: &MathGroup,
        master: &Exponent,
        eeid: &str,
        vcid: &str,
        phase: ExponentiationPhase,
        elements: &[GroupElement],
    ) -> Result<ReturnCodesExponentiationResponsePayload, Error> {
        let hashed: Vec<GroupElement> = elements
            .iter()
            .map(|e| self.hash.hash_and_square(e))
            .collect();

        let voter_key = derive_voter_key_for(master, phase.key_kind(), vcid, group)?;
        let voter_public_key = group.generator().exponentiate(&voter_key);
        let shares: Vec<GroupElement> = hashed.iter().map(|h| h.exponentiate(&voter_key)).collect();

        let mut bases = vec![group.generator()];
        bases.extend(hashed.iter().cloned());
        let mut exponentiated = vec![voter_public_key.clone()];
        exponentiated.extend(shares.iter().cloned());
        let auxiliary = vec![
            eeid.to_owned(),
            vcid.to_owned(),
            phase.proof_context().to_owned(),
            self.node_id.to_string(),
        ];
        let proof = self
            .proofs
            .gen_exponentiation_proof(
                &bases,
                &voter_key,
                &exponentiated,
                &auxiliary,
                &mut OsRng {},
            )?;

        debug!(
            target: "secure_log",
            "computed {} long return code shares for verification card {}",
            shares.len(),
            vcid
        );

        let pcc_or_ck_to_long_return_code_share = elements
            .iter()
            .zip(&shares)
            .map(|(input, share)| LongReturnCodeShare {
                input: input.value().clone(),
                share: share.value().clone(),
            })
            .collect();

        let (choice_key, vote_cast_key) = match phase {
            ExponentiationPhase::ChoiceReturnCodes => (Some(voter_public_key.into_value()), None),
            ExponentiationPhase::VoteCastReturnCode => (None, Some(voter_public_key.into_value())),
        };

        Ok(ReturnCodesExponentiationResponsePayload {
            pcc_or_ck_to_long_return_code_share,
            exponentiation_proof: proof,
            voter_choice_return_code_generation_public_key: choice_key,
            voter_vote_cast_return_code_generation_public_key: vote_cast_key,
        })
    }
}

/// The server-side confirmation key must be a single group member, equal to the key in
/// the client's message.
fn check_confirmation_key(
    group: &MathGroup,
    input: &ReturnCodesInput,
) -> Result<Vec<GroupElement>, RejectionReason> {
    let values = input
        .return_codes_input_elements
        .as_ref()
        .ok_or(RejectionReason::MissingReturnCodesInput)?;
    if values.len() != 1 {
        return Err(RejectionReason::WrongNumberOfElements {
            what: "confirmationKey",
            expected: 1,
            found: values.len(),
        });
    }
    let confirmation_input = input
        .confirmation_key_verification_input
        .as_ref()
        .ok_or(RejectionReason::MissingVerificationInput)?;
    let message: ConfirmationMessage =
        serde_json::from_str(&confirmation_input.confirmation_message)
            .map_err(|e| RejectionReason::MalformedConfirmationMessage(e.to_string()))?;

    let confirmation_key = group
        .element(values[0].clone())
        .map_err(|_| RejectionReason::NotGroupMember("confirmationKey"))?;
    if confirmation_key.value() != &message.confirmation_key {
        return Err(RejectionReason::ConfirmationKeyMismatch);
    }
    Ok(vec![confirmation_key])
}
