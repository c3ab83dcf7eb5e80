//! Request and response shapes exchanged with the voting server and the set-up component.

use crate::*;
use ed25519_dalek::Signature;
use num_bigint::BigUint;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CombinedCorrectnessInformation {
    pub total_number_of_selections: usize,
}

/// Per-voter input to return code generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodeGenerationInput {
    pub verification_card_id: String,
    pub encrypted_hashed_squared_partial_choice_return_codes: CiphertextValues,
    pub encrypted_hashed_squared_confirmation_key: CiphertextValues,

    #[serde(with = "crate::serde_decimal::vec")]
    pub verification_card_public_key: Vec<BigUint>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodeGenerationRequestPayload {
    pub tenant_id: String,
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub chunk_id: u32,
    pub group: MathGroup,
    pub return_code_generation_inputs: Vec<ReturnCodeGenerationInput>,
    pub combined_correctness_information: CombinedCorrectnessInformation,
}

impl Signable for ReturnCodeGenerationRequestPayload {}

/// Per-voter output of return code generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodeGenerationOutput {
    pub verification_card_id: String,

    #[serde(with = "crate::serde_decimal::vec")]
    pub voter_choice_return_code_generation_public_key: Vec<BigUint>,

    #[serde(with = "crate::serde_decimal::vec")]
    pub voter_vote_cast_return_code_generation_public_key: Vec<BigUint>,

    pub exponentiated_encrypted_partial_choice_return_codes: CiphertextValues,
    pub encrypted_partial_choice_return_code_exponentiation_proof: ExponentiationProof,
    pub exponentiated_encrypted_confirmation_key: CiphertextValues,
    pub encrypted_confirmation_key_exponentiation_proof: ExponentiationProof,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodeGenerationResponsePayload {
    pub tenant_id: String,
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub chunk_id: u32,
    pub group: MathGroup,
    pub return_code_generation_outputs: Vec<ReturnCodeGenerationOutput>,
    pub node_id: u32,
}

impl Signable for ReturnCodeGenerationResponsePayload {}

/// Envelope of generation messages
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChoiceCodeGenerationDto<T> {
    pub correlation_id: Uuid,
    pub request_id: String,
    pub payload: T,
}

pub type GenerationRequest = ChoiceCodeGenerationDto<Signed<ReturnCodeGenerationRequestPayload>>;
pub type GenerationResponse = ChoiceCodeGenerationDto<Signed<ReturnCodeGenerationResponsePayload>>;

// ---------------------------------------------------------------------------
// Voting phase
// ---------------------------------------------------------------------------

/// Envelope of decryption and exponentiation messages.
///
/// Missing identifier fields deserialize as blank so that they are reported by request validation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReturnCodeComputationDto<T> {
    pub correlation_id: Uuid,

    #[serde(default)]
    pub request_id: String,

    #[serde(default)]
    pub election_event_id: String,

    #[serde(default)]
    pub verification_card_set_id: String,

    #[serde(default)]
    pub verification_card_id: String,

    pub payload: Option<T>,
}

impl<T> ReturnCodeComputationDto<T> {
    /// Names of the mandatory fields that are blank, malformed or absent
    pub fn invalid_fields(&self) -> Vec<String> {
        let mut invalid = Vec::new();
        if self.request_id.trim().is_empty() {
            invalid.push("requestId".to_owned());
        }
        let ids = [
            ("verificationCardId", &self.verification_card_id),
            ("verificationCardSetId", &self.verification_card_set_id),
            ("electionEventId", &self.election_event_id),
        ];
        for (name, value) in ids.iter() {
            if value.trim().is_empty() || Uuid::parse_str(value).is_err() {
                invalid.push((*name).to_owned());
            }
        }
        if self.payload.is_none() {
            invalid.push("payload".to_owned());
        }
        invalid
    }

    /// Build the reply envelope for this request
    pub fn reply<U>(&self, payload: U) -> ReturnCodeComputationDto<U> {
        ReturnCodeComputationDto {
            correlation_id: self.correlation_id,
            request_id: self.request_id.clone(),
            election_event_id: self.election_event_id.clone(),
            verification_card_set_id: self.verification_card_set_id.clone(),
            verification_card_id: self.verification_card_id.clone(),
            payload: Some(payload),
        }
    }
}

/// Certificates the voting server forwards with a partial decryption request
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificateBundle {
    pub tenant_ca: Certificate,
    pub admin_board: Certificate,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPublicKey {
    pub election_event_id: String,

    #[serde(with = "crate::serde_decimal::vec")]
    pub public_key: Vec<BigUint>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VerificationCardSetData {
    pub verification_card_set_id: String,

    #[serde(with = "crate::serde_decimal::vec")]
    pub choice_codes_encryption_public_key: Vec<BigUint>,

    pub verification_card_set_issuer_certificate: Certificate,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PartialChoiceReturnCodesVerificationInput {
    /// The voter's vote, as JSON
    pub vote: String,
    pub election_public_key: SignedContent<ElectionPublicKey>,
    pub verification_card_set_data: SignedContent<VerificationCardSetData>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationKeyVerificationInput {
    /// The client's confirmation message, as JSON
    pub confirmation_message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationMessage {
    #[serde(with = "crate::serde_decimal")]
    pub confirmation_key: BigUint,
}

/// Payload of decryption and exponentiation requests
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ReturnCodesInput {
    #[serde(default, with = "crate::serde_decimal::option_vec")]
    pub return_codes_input_elements: Option<Vec<BigUint>>,

    #[serde(default)]
    pub partial_choice_return_codes_verification_input:
        Option<PartialChoiceReturnCodesVerificationInput>,

    #[serde(default)]
    pub confirmation_key_verification_input: Option<ConfirmationKeyVerificationInput>,

    #[serde(default)]
    pub certificates: Option<CertificateBundle>,
}

/// A voter's encrypted selections and the client-side proofs about them
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Vote {
    pub election_event_id: String,
    pub verification_card_id: String,

    /// `(C0, C1)`: the selections encrypted under the election public key
    #[serde(with = "crate::serde_decimal::vec")]
    pub encrypted_options: Vec<BigUint>,

    /// `(C'0, C'1)`: the encrypted options raised to the voter's secret key
    #[serde(with = "crate::serde_decimal::vec")]
    pub cipher_text_exponentiations: Vec<BigUint>,

    /// `(D0, D1..Dpsi)`: the partial choice return codes under the choice codes encryption key
    #[serde(with = "crate::serde_decimal::vec")]
    pub encrypted_partial_choice_codes: Vec<BigUint>,

    pub exponentiation_proof: ExponentiationProof,
    pub plaintext_equality_proof: PlaintextEqualityProof,

    #[serde(with = "crate::serde_decimal::vec")]
    pub verification_card_public_key: Vec<BigUint>,

    #[serde(with = "EdSignatureHex")]
    pub verification_card_public_key_signature: Signature,
}

impl Vote {
    /// Auxiliary data bound into the vote's proofs
    pub fn proof_auxiliary_data(&self) -> Vec<String> {
        vec![
            self.election_event_id.clone(),
            self.verification_card_id.clone(),
        ]
    }

    /// Bytes covered by the verification card public key signature
    pub fn verification_card_public_key_bytes(&self) -> Vec<u8> {
        self.verification_card_public_key
            .iter()
            .map(|v| v.to_str_radix(10))
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChoiceCodesVerificationDecryptResPayload {
    #[serde(with = "crate::serde_decimal::vec")]
    pub decrypt_contribution_result: Vec<BigUint>,

    pub exponentiation_proof: ExponentiationProof,

    #[serde(with = "crate::serde_decimal::vec")]
    pub public_key: Vec<BigUint>,
}

impl Signable for ChoiceCodesVerificationDecryptResPayload {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LongReturnCodeShare {
    #[serde(with = "crate::serde_decimal")]
    pub input: BigUint,

    #[serde(with = "crate::serde_decimal")]
    pub share: BigUint,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodesExponentiationResponsePayload {
    /// Input elements mapped to their long return code shares, in input order
    pub pcc_or_ck_to_long_return_code_share: Vec<LongReturnCodeShare>,

    pub exponentiation_proof: ExponentiationProof,

    #[serde(default, with = "crate::serde_decimal::option")]
    pub voter_choice_return_code_generation_public_key: Option<BigUint>,

    #[serde(default, with = "crate::serde_decimal::option")]
    pub voter_vote_cast_return_code_generation_public_key: Option<BigUint>,
}

impl Signable for ReturnCodesExponentiationResponsePayload {}

pub type ComputationRequest = ReturnCodeComputationDto<ReturnCodesInput>;
pub type DecryptionResponse =
    ReturnCodeComputationDto<Signed<ChoiceCodesVerificationDecryptResPayload>>;
pub type ExponentiationResponse =
    ReturnCodeComputationDto<Signed<ReturnCodesExponentiationResponsePayload>>;
