//! Shared fixtures for unit and scenario tests.

use crate::*;
use ed25519_dalek::{Keypair, SecretKey};
use num_bigint::BigUint;
use num_traits::One;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const ELECTION_EVENT_ID: &str = "0b88257ec32142bb8ee0ed1bb70f362e";
pub const VERIFICATION_CARD_SET_ID: &str = "9a0a2d7fd34a4a1e9f4c0e2d3b1a5c6d";

/// 256-bit safe prime group
pub fn large_group() -> MathGroup {
    let p = "91185207321183015155495153901876504940934195032199180397683690774723603094143";
    let q = "45592603660591507577747576950938252470467097516099590198841845387361801547071";
    MathGroup::new(
        serde_decimal::parse_decimal(p).unwrap(),
        serde_decimal::parse_decimal(q).unwrap(),
        BigUint::from(4u32),
    )
    .unwrap()
}

/// `p = 23`, small enough to reason about by hand
pub fn toy_group() -> MathGroup {
    MathGroup::new(BigUint::from(23u32), BigUint::from(11u32), BigUint::from(4u32)).unwrap()
}

pub fn init_logging() {
    log4rs_test_utils::test_logging::init_logging_once_for(["returncodes"], None, None);
}

/// A key manager whose node CA is issued by a fresh platform CA. Also returns
/// the platform CA secret.
pub fn new_key_manager() -> (MemKeyManager, SecretKey) {
    let (platform_ca, platform_secret) = Certificate::new_root("platform-ca").unwrap();
    let Keypair { public, secret } = Keypair::generate(&mut OsRng {});
    let node_ca = platform_ca.issue(&platform_secret, "node-ca", public).unwrap();
    let manager = MemKeyManager::new(platform_ca, node_ca, &secret).unwrap();
    (manager, platform_secret)
}

fn issue(
    issuer: &Certificate,
    issuer_secret: &SecretKey,
    subject: &str) -> (Certificate, SecretKey,
) {
    let Keypair { public, secret } = Keypair::generate(&mut OsRng {});
    (issuer.issue(issuer_secret, subject, public).unwrap(), secret)
}

/// Proof service that counts how many proofs it generated
#[derive(Default)]
pub struct CountingProofs {
    pub generated: AtomicUsize,
    inner: SigmaProofService,
}

impl ZeroKnowledgeProof for CountingProofs {
    fn gen_exponentiation_proof<R: RngCore + CryptoRng>(
        &self,
        bases: &[GroupElement],
        exponent: &Exponent,
        exponentiated: &[GroupElement],
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<ExponentiationProof, Error> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        self.inner
            .gen_exponentiation_proof(bases, exponent, exponentiated, auxiliary, rng)
    }

    fn verify_exponentiation_proof(
        &self,
        bases: &[GroupElement],
        exponentiated: &[GroupElement],
        proof: &ExponentiationProof,
        auxiliary: &[String],
    ) -> Result<bool, Error> {
        self.inner
            .verify_exponentiation_proof(bases, exponentiated, proof, auxiliary)
    }

    fn gen_plaintext_equality_proof<R: RngCore + CryptoRng>(
        &self,
        statement: &PlaintextEqualityStatement,
        randomness: (&Exponent, &Exponent),
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<PlaintextEqualityProof, Error> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        self.inner
            .gen_plaintext_equality_proof(statement, randomness, auxiliary, rng)
    }

    fn verify_plaintext_equality_proof(
        &self,
        statement: &PlaintextEqualityStatement,
        proof: &PlaintextEqualityProof,
        auxiliary: &[String],
    ) -> Result<bool, Error> {
        self.inner
            .verify_plaintext_equality_proof(statement, proof, auxiliary)
    }
}

/// Key manager that has lost the election signing keys
pub struct SigningKeyUnavailable(pub Arc<MemKeyManager>);

impl KeyManager for SigningKeyUnavailable {
    fn platform_ca_certificate(&self) -> Result<Certificate, KeyManagementError> {
        self.0.platform_ca_certificate()
    }

    fn node_ca_certificate(&self) -> Result<Certificate, KeyManagementError> {
        self.0.node_ca_certificate()
    }

    fn encryption_parameters(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<MathGroup, KeyManagementError> {
        self.0.encryption_parameters(election_event_id, verification_card_set_id)
    }

    fn has_ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> bool {
        self.0
            .has_ccrj_return_codes_keys(election_event_id, verification_card_set_id)
    }

    fn create_ccrj_return_codes_keys(
        &self,
        spec: &CcrjReturnCodesKeysSpec,
    ) -> Result<CcrjReturnCodesPublicKeys, KeyManagementError> {
        self.0.create_ccrj_return_codes_keys(spec)
    }

    fn ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<CcrjReturnCodesKeys, KeyManagementError> {
        self.0
            .ccrj_return_codes_keys(election_event_id, verification_card_set_id)
    }

    fn create_election_signing_keys(
        &self,
        election_event_id: &str,
    ) -> Result<Certificate, KeyManagementError> {
        self.0.create_election_signing_keys(election_event_id)
    }

    fn election_signing_private_key(
        &self,
        election_event_id: &str,
    ) -> Result<SecretKey, KeyManagementError> {
        Err(KeyManagementError::NotFound(format!(
            "election signing key for election event {}",
            election_event_id
        )))
    }

    fn election_signing_certificate_chain(
        &self,
        election_event_id: &str,
    ) -> Result<Vec<Certificate>, KeyManagementError> {
        self.0.election_signing_certificate_chain(election_event_id)
    }
}

/// Everything the voting client and the set-up component know about one voter
pub struct Voter {
    pub id: String,
    pub vote: Vote,
    pub partial_choice_return_codes: Vec<GroupElement>,
    pub confirmation_key: GroupElement,
    generation: ReturnCodeGenerationInput,
}

impl Voter {
    pub fn generation_input(&self) -> ReturnCodeGenerationInput {
        self.generation.clone()
    }
}

/// One node with keys for a single verification card set, plus the other parties' keys
pub struct Fixture {
    pub config: NodeConfig,
    pub group: MathGroup,
    pub eeid: String,
    pub vcsid: String,
    pub psi: usize,
    pub platform_ca: Certificate,
    pub certificates: CertificateBundle,
    pub keys: Arc<MemKeyManager>,
    pub store: Arc<MemStore>,
    pub locks: Arc<CardLocks>,

    setup_certificate: Certificate,
    setup_secret: SecretKey,
    setup_key: ElGamalPublicKey,
    election_key: ElGamalPublicKey,
    choice_codes_encryption_key: ElGamalPublicKey,
    verification_card_set_issuer_secret: SecretKey,
    election_public_key: SignedContent<ElectionPublicKey>,
    verification_card_set_data: SignedContent<VerificationCardSetData>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_group(large_group(), 2)
    }

    pub fn with_group(group: MathGroup, psi: usize) -> Self {
        init_logging();
        let mut csprng = OsRng {};
        let eeid = ELECTION_EVENT_ID.to_owned();
        let vcsid = VERIFICATION_CARD_SET_ID.to_owned();

        let (keys, platform_secret) = new_key_manager();
        let platform_ca = keys.platform_ca_certificate().unwrap();
        keys.create_election_signing_keys(&eeid).unwrap();
        let public_keys = keys
            .create_ccrj_return_codes_keys(&CcrjReturnCodesKeysSpec {
                election_event_id: eeid.clone(),
                verification_card_set_id: vcsid.clone(),
                group: group.clone(),
                choice_codes_encryption_key_length: psi,
            })
            .unwrap();
        let choice_codes_encryption_key = public_keys.choice_codes_encryption_public_key.public_key;

        let (tenant_ca, tenant_secret) = issue(&platform_ca, &platform_secret, "tenant-ca");
        let (admin_board, admin_board_secret) = issue(&tenant_ca, &tenant_secret, "admin-board");
        let (setup_certificate, setup_secret) =
            issue(&platform_ca, &platform_secret, "setup-component");
        let (verification_card_set_issuer, verification_card_set_issuer_secret) =
            issue(&tenant_ca, &tenant_secret, "verification-card-set-issuer");

        let election_key = ElGamalKeyPair::generate(&group, 1, &mut csprng).unwrap().public_key;
        let setup_key = ElGamalKeyPair::generate(&group, psi, &mut csprng).unwrap().public_key;

        let election_public_key = SignedContent::sign(
            &admin_board_secret,
            ElectionPublicKey {
                election_event_id: eeid.clone(),
                public_key: election_key.to_values(),
            },
        )
        .unwrap();
        let verification_card_set_data = SignedContent::sign(
            &admin_board_secret,
            VerificationCardSetData {
                verification_card_set_id: vcsid.clone(),
                choice_codes_encryption_public_key: choice_codes_encryption_key.to_values(),
                verification_card_set_issuer_certificate: verification_card_set_issuer,
            },
        )
        .unwrap();

        Fixture {
            config: NodeConfig::default(),
            group,
            eeid,
            vcsid,
            psi,
            platform_ca,
            certificates: CertificateBundle { tenant_ca, admin_board },
            keys: Arc::new(keys),
            store: Arc::new(MemStore::new()),
            locks: Arc::new(CardLocks::new()),
            setup_certificate,
            setup_secret,
            setup_key,
            election_key,
            choice_codes_encryption_key,
            verification_card_set_issuer_secret,
            election_public_key,
            verification_card_set_data,
        }
    }

    /// A voter with `psi` distinct partial choice return codes and a valid vote
    pub fn voter(&self, id: &str) -> Voter {
        let mut csprng = OsRng {};
        let group = &self.group;
        let g = group.generator();
        let proofs = SigmaProofService::default();

        // Small groups can produce degenerate keys or colliding codes
        let (secret_key, options, partial_choice_return_codes) = loop {
            let k = group.random_exponent(&mut csprng);
            if k.value() == &BigUint::from(0u32) {
                continue;
            }
            let options: Vec<GroupElement> = (0..self.psi)
                .map(|_| g.exponentiate(&group.random_exponent(&mut csprng)))
                .collect();
            let codes: Vec<GroupElement> = options.iter().map(|o| o.exponentiate(&k)).collect();
            let distinct = codes
                .iter()
                .enumerate()
                .all(|(i, c)| !codes[..i].contains(c) && !c.value().is_one());
            if distinct {
                break (k, options, codes);
            }
        };
        let verification_card_public_key = g.exponentiate(&secret_key);

        let r = group.random_exponent(&mut csprng);
        let encrypted_options =
            encrypt(&self.election_key, &[group.compress(&options)], &r).unwrap();
        let exponentiated = encrypted_options.exponentiate(&secret_key);

        let r_prime = group.random_exponent(&mut csprng);
        let encrypted_codes = encrypt(
            &self.choice_codes_encryption_key,
            &partial_choice_return_codes,
            &r_prime,
        )
        .unwrap();

        let auxiliary = vec![self.eeid.clone(), id.to_owned()];
        let exponentiation_proof = proofs
            .gen_exponentiation_proof(
                &[
                    g.clone(),
                    encrypted_options.gamma().clone(),
                    encrypted_options.phis()[0].clone(),
                ],
                &secret_key,
                &[
                    verification_card_public_key.clone(),
                    exponentiated.gamma().clone(),
                    exponentiated.phis()[0].clone(),
                ],
                &auxiliary,
                &mut csprng,
            )
            .unwrap();

        let secondary = Ciphertext::new(
            encrypted_codes.gamma().clone(),
            vec![group.compress(encrypted_codes.phis())],
        )
        .unwrap();
        let secondary_key = self.choice_codes_encryption_key.compress();
        let statement = PlaintextEqualityStatement {
            primary: &exponentiated,
            primary_key: self.election_key.first_subkey(),
            secondary: &secondary,
            secondary_key: &secondary_key,
        };
        let rk = group.exponent_mod_q(&(r.value() * secret_key.value()));
        let plaintext_equality_proof = proofs
            .gen_plaintext_equality_proof(&statement, (&rk, &r_prime), &auxiliary, &mut csprng)
            .unwrap();

        let key_bytes = verification_card_public_key.value().to_str_radix(10).into_bytes();
        let verification_card_public_key_signature = sign_detached(
            &self.verification_card_set_issuer_secret,
            &[key_bytes.as_slice(), self.eeid.as_bytes(), id.as_bytes()],
        );

        let vote = Vote {
            election_event_id: self.eeid.clone(),
            verification_card_id: id.to_owned(),
            encrypted_options: values_of(&encrypted_options.elements()),
            cipher_text_exponentiations: values_of(&exponentiated.elements()),
            encrypted_partial_choice_codes: values_of(&encrypted_codes.elements()),
            exponentiation_proof,
            plaintext_equality_proof,
            verification_card_public_key: vec![verification_card_public_key.value().clone()],
            verification_card_public_key_signature,
        };

        let confirmation_key = g.exponentiate(&group.random_exponent(&mut csprng));
        let hash = Sha256HashService;
        let hashed_codes: Vec<GroupElement> = partial_choice_return_codes
            .iter()
            .map(|c| hash.hash_and_square(c))
            .collect();
        let generation = ReturnCodeGenerationInput {
            verification_card_id: id.to_owned(),
            encrypted_hashed_squared_partial_choice_return_codes: encrypt(
                &self.setup_key,
                &hashed_codes,
                &group.random_exponent(&mut csprng),
            )
            .unwrap()
            .to_values(),
            encrypted_hashed_squared_confirmation_key: encrypt(
                &self.setup_key,
                &[hash.hash_and_square(&confirmation_key)],
                &group.random_exponent(&mut csprng),
            )
            .unwrap()
            .to_values(),
            verification_card_public_key: vec![verification_card_public_key.into_value()],
        };

        Voter {
            id: id.to_owned(),
            vote,
            partial_choice_return_codes,
            confirmation_key,
            generation,
        }
    }

    /// Record what a completed generation run leaves behind for these voters
    pub fn register(&self, voters: &[&Voter]) {
        self.store.insert_correctness_info_if_absent(CombinedCorrectnessInfo {
            election_event_id: self.eeid.clone(),
            verification_card_set_id: self.vcsid.clone(),
            total_number_of_selections: self.psi,
        });
        for voter in voters {
            self.store
                .set_verification_card_public_key(VerificationCardPublicKeyExtended {
                    election_event_id: self.eeid.clone(),
                    verification_card_set_id: self.vcsid.clone(),
                    verification_card_id: voter.id.clone(),
                    public_key: voter.vote.verification_card_public_key.clone(),
                });
        }
    }

    /// `p - 1` is never a quadratic residue of a safe prime with `p = 3 mod 4`
    pub fn non_member(&self) -> BigUint {
        self.group.p() - BigUint::one()
    }

    pub fn generation_master_key(&self) -> Exponent {
        self.keys
            .ccrj_return_codes_generation_secret_key(&self.eeid, &self.vcsid)
            .unwrap()
            .keys()[0]
            .clone()
    }

    pub fn generation_engine(&self) -> GenerationEngine {
        GenerationEngine::new(
            self.keys.clone(),
            self.store.clone(),
            self.store.clone(),
            Arc::new(SigmaProofService::default()),
            self.config.node_id,
        )
    }

    pub fn decryption_engine(&self) -> DecryptionEngine {
        self.decryption_engine_with(Arc::new(SigmaProofService::default()))
    }

    pub fn decryption_engine_with<Z: ZeroKnowledgeProof>(
        &self,
        proofs: Arc<Z>,
    ) -> DecryptionEngine<Z> {
        DecryptionEngine::new(
            self.keys.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            proofs,
            self.locks.clone(),
            self.config.node_id,
        )
    }

    pub fn exponentiation_engine(&self) -> ExponentiationEngine {
        self.exponentiation_engine_with_keys(self.keys.clone())
    }

    pub fn exponentiation_engine_with_keys(
        &self,
        keys: Arc<dyn KeyManager>,
    ) -> ExponentiationEngine {
        ExponentiationEngine::new(
            keys,
            self.store.clone(),
            self.store.clone(),
            Arc::new(SigmaProofService::default()),
            Sha256HashService,
            self.locks.clone(),
            self.config.node_id,
            self.config.max_confirmation_attempts,
        )
    }

    pub fn node(&self) -> ReturnCodesNode {
        ReturnCodesNode::new(self.config.clone(), self.keys.clone(), self.store.clone())
    }

    pub fn generation_request(&self, voters: &[Voter]) -> GenerationRequest {
        let payload = ReturnCodeGenerationRequestPayload {
            tenant_id: "100".to_owned(),
            election_event_id: self.eeid.clone(),
            verification_card_set_id: self.vcsid.clone(),
            chunk_id: 0,
            group: self.group.clone(),
            return_code_generation_inputs: voters.iter().map(Voter::generation_input).collect(),
            combined_correctness_information: CombinedCorrectnessInformation {
                total_number_of_selections: self.psi,
            },
        };
        ChoiceCodeGenerationDto {
            correlation_id: Uuid::new_v4(),
            request_id: Uuid::new_v4().to_simple().to_string(),
            payload: Signed::sign(
                &self.setup_secret,
                vec![self.setup_certificate.clone()],
                payload,
            )
            .unwrap(),
        }
    }

    /// Sign a modified generation request again
    pub fn resign(&self, mut request: GenerationRequest) -> GenerationRequest {
        let payload = request.payload.payload.clone();
        request.payload = Signed::sign(
            &self.setup_secret,
            vec![self.setup_certificate.clone()],
            payload,
        )
        .unwrap();
        request
    }

    fn computation_request(&self, voter: &Voter, input: ReturnCodesInput) -> ComputationRequest {
        ReturnCodeComputationDto {
            correlation_id: Uuid::new_v4(),
            request_id: Uuid::new_v4().to_simple().to_string(),
            election_event_id: self.eeid.clone(),
            verification_card_set_id: self.vcsid.clone(),
            verification_card_id: voter.id.clone(),
            payload: Some(input),
        }
    }

    pub fn decryption_request(&self, voter: &Voter) -> ComputationRequest {
        self.decryption_request_for_vote(voter, &voter.vote)
    }

    /// A decryption request carrying `vote` in place of the voter's own
    pub fn decryption_request_for_vote(&self, voter: &Voter, vote: &Vote) -> ComputationRequest {
        let input = ReturnCodesInput {
            return_codes_input_elements: Some(vote.encrypted_partial_choice_codes.clone()),
            partial_choice_return_codes_verification_input: Some(
                PartialChoiceReturnCodesVerificationInput {
                    vote: serde_json::to_string(vote).unwrap(),
                    election_public_key: self.election_public_key.clone(),
                    verification_card_set_data: self.verification_card_set_data.clone(),
                },
            ),
            confirmation_key_verification_input: None,
            certificates: Some(self.certificates.clone()),
        };
        self.computation_request(voter, input)
    }

    pub fn choice_exponentiation_request(&self, voter: &Voter) -> ComputationRequest {
        let input = ReturnCodesInput {
            return_codes_input_elements: Some(values_of(&voter.partial_choice_return_codes)),
            ..ReturnCodesInput::default()
        };
        self.computation_request(voter, input)
    }

    pub fn vote_cast_request(&self, voter: &Voter) -> ComputationRequest {
        let message = ConfirmationMessage {
            confirmation_key: voter.confirmation_key.value().clone(),
        };
        let input = ReturnCodesInput {
            return_codes_input_elements: Some(vec![voter.confirmation_key.value().clone()]),
            confirmation_key_verification_input: Some(ConfirmationKeyVerificationInput {
                confirmation_message: serde_json::to_string(&message).unwrap(),
            }),
            ..ReturnCodesInput::default()
        };
        self.computation_request(voter, input)
    }
}
