use crate::*;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Upper bound on the length of the choice return codes encryption key
pub const MAX_CHOICE_CODES_ENCRYPTION_KEY_LENGTH: usize = 120;

/// What to create for a verification card set
#[derive(Clone, Debug)]
pub struct CcrjReturnCodesKeysSpec {
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub group: MathGroup,
    pub choice_codes_encryption_key_length: usize,
}

/// An ElGamal public key signed by the election signing key over
/// `key || election_event_id || resource_id`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedPublicKey {
    pub public_key: ElGamalPublicKey,
    pub signature: Signature,
}

impl SignedPublicKey {
    fn sign(
        secret: &SecretKey,
        public_key: ElGamalPublicKey,
        election_event_id: &str,
        resource_id: &str,
    ) -> Self {
        let signature = sign_detached(
            secret,
            &[
                public_key.to_bytes().as_slice(),
                election_event_id.as_bytes(),
                resource_id.as_bytes(),
            ],
        );
        SignedPublicKey {
            public_key,
            signature,
        }
    }

    pub fn verify(
        &self,
        signer: &PublicKey,
        election_event_id: &str,
        resource_id: &str,
    ) -> Result<(), Error> {
        verify_detached(
            signer,
            &[
                self.public_key.to_bytes().as_slice(),
                election_event_id.as_bytes(),
                resource_id.as_bytes(),
            ],
            &self.signature,
        )
    }
}

/// The two key pairs a node holds for one verification card set
#[derive(Clone, Debug)]
pub struct CcrjReturnCodesKeys {
    pub group: MathGroup,
    pub generation_key_pair: ElGamalKeyPair,
    pub generation_public_key_signature: Signature,
    pub choice_codes_encryption_key_pair: ElGamalKeyPair,
    pub choice_codes_encryption_public_key_signature: Signature,
}

/// Public halves of [`CcrjReturnCodesKeys`], as published to the set-up component
#[derive(Clone, Debug)]
pub struct CcrjReturnCodesPublicKeys {
    pub generation_public_key: SignedPublicKey,
    pub choice_codes_encryption_public_key: SignedPublicKey,
}

pub trait KeyManager: Send + Sync {
    fn platform_ca_certificate(&self) -> Result<Certificate, KeyManagementError>;

    fn node_ca_certificate(&self) -> Result<Certificate, KeyManagementError>;

    /// Group used by the verification card set
    fn encryption_parameters(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<MathGroup, KeyManagementError>;

    fn has_ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> bool;

    /// Fails with `NotFound` until the election signing keys of the event exist
    fn create_ccrj_return_codes_keys(
        &self,
        spec: &CcrjReturnCodesKeysSpec,
    ) -> Result<CcrjReturnCodesPublicKeys, KeyManagementError>;

    fn ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<CcrjReturnCodesKeys, KeyManagementError>;

    fn ccrj_return_codes_generation_secret_key(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<ElGamalPrivateKey, KeyManagementError> {
        let keys = self.ccrj_return_codes_keys(election_event_id, verification_card_set_id)?;
        Ok(keys.generation_key_pair.private_key)
    }

    fn ccrj_choice_return_codes_encryption_secret_key(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<ElGamalPrivateKey, KeyManagementError> {
        let keys = self.ccrj_return_codes_keys(election_event_id, verification_card_set_id)?;
        Ok(keys.choice_codes_encryption_key_pair.private_key)
    }

    fn ccrj_choice_return_codes_encryption_public_key(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<ElGamalPublicKey, KeyManagementError> {
        let keys = self.ccrj_return_codes_keys(election_event_id, verification_card_set_id)?;
        Ok(keys.choice_codes_encryption_key_pair.public_key)
    }

    fn create_election_signing_keys(
        &self,
        election_event_id: &str,
    ) -> Result<Certificate, KeyManagementError>;

    fn election_signing_private_key(
        &self,
        election_event_id: &str,
    ) -> Result<SecretKey, KeyManagementError>;

    /// Leaf first, ending with the node CA
    fn election_signing_certificate_chain(
        &self,
        election_event_id: &str,
    ) -> Result<Vec<Certificate>, KeyManagementError>;
}

struct ElectionSigningKeys {
    secret: [u8; 32],
    certificate: Certificate,
}

#[derive(Default)]
struct Keys {
    return_codes: BTreeMap<(String, String), CcrjReturnCodesKeys>,
    election_signing: BTreeMap<String, ElectionSigningKeys>,
}

/// In-memory key manager, optionally persisted as a password-sealed key store
pub struct MemKeyManager {
    platform_ca: Certificate,
    node_ca: Certificate,
    node_ca_secret: [u8; 32],
    keys: RwLock<Keys>,
}

fn secret_from_bytes(bytes: &[u8]) -> Result<SecretKey, KeyManagementError> {
    SecretKey::from_bytes(bytes).map_err(|e| KeyManagementError::InvalidKeyStore(e.to_string()))
}

impl MemKeyManager {
    /// The node CA certificate must be issued by the platform CA.
    pub fn new(
        platform_ca: Certificate,
        node_ca: Certificate,
        node_ca_secret: &SecretKey,
    ) -> Result<Self, KeyManagementError> {
        validate_chain(&[node_ca.clone()], &platform_ca)
            .map_err(|e| KeyManagementError::InvalidNodeCa(e.to_string()))?;
        if PublicKey::from(node_ca_secret) != node_ca.public_key {
            return Err(KeyManagementError::InvalidNodeCa(
                "node CA secret key does not match its certificate".to_owned(),
            ));
        }

        Ok(MemKeyManager {
            platform_ca,
            node_ca,
            node_ca_secret: node_ca_secret.to_bytes(),
            keys: RwLock::new(Keys::default()),
        })
    }

    fn node_ca_secret(&self) -> Result<SecretKey, KeyManagementError> {
        secret_from_bytes(&self.node_ca_secret)
    }

    /// Serialize every key and seal it under `password`
    pub fn seal(&self, password: &str) -> Result<Vec<u8>, KeyManagementError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let contents = SealedContents {
            platform_ca: self.platform_ca.clone(),
            node_ca: self.node_ca.clone(),
            node_ca_secret: hex::encode(self.node_ca_secret),
            return_codes_keys: keys
                .return_codes
                .iter()
                .map(|((eeid, vcsid), k)| StoredReturnCodesKeys {
                    election_event_id: eeid.clone(),
                    verification_card_set_id: vcsid.clone(),
                    group: k.group.clone(),
                    generation_secret_key: k.generation_key_pair.private_key.to_values(),
                    generation_public_key_signature: k.generation_public_key_signature,
                    choice_codes_encryption_secret_key: k
                        .choice_codes_encryption_key_pair
                        .private_key
                        .to_values(),
                    choice_codes_encryption_public_key_signature: k
                        .choice_codes_encryption_public_key_signature,
                })
                .collect(),
            election_signing_keys: keys
                .election_signing
                .iter()
                .map(|(eeid, k)| StoredElectionSigningKeys {
                    election_event_id: eeid.clone(),
                    secret_key: hex::encode(k.secret),
                    certificate: k.certificate.clone(),
                })
                .collect(),
        };
        let serialized = serde_cbor::to_vec(&contents)
            .map_err(|e| KeyManagementError::InvalidKeyStore(e.to_string()))?;

        keystore::seal(password, &serialized)
    }

    /// Open a sealed key store
    pub fn open(sealed: &[u8], password: &str) -> Result<Self, KeyManagementError> {
        let serialized = keystore::open(password, sealed)?;
        let contents: SealedContents = serde_cbor::from_slice(&serialized)
            .map_err(|e| KeyManagementError::InvalidKeyStore(e.to_string()))?;

        let node_ca_secret = hex::decode(&contents.node_ca_secret)
            .map_err(|e| KeyManagementError::InvalidKeyStore(e.to_string()))?;
        let manager = MemKeyManager::new(
            contents.platform_ca,
            contents.node_ca,
            &secret_from_bytes(&node_ca_secret)?,
        )?;

        {
            let mut keys = manager.keys.write().unwrap_or_else(|e| e.into_inner());
            for stored in contents.return_codes_keys {
                let invalid = |e: Error| KeyManagementError::InvalidKeyStore(e.to_string());
                let generation =
                    ElGamalPrivateKey::from_values(&stored.group, &stored.generation_secret_key)
                        .map_err(invalid)?;
                let choice_codes_encryption = ElGamalPrivateKey::from_values(
                    &stored.group,
                    &stored.choice_codes_encryption_secret_key,
                )
                .map_err(invalid)?;
                keys.return_codes.insert(
                    (stored.election_event_id, stored.verification_card_set_id),
                    CcrjReturnCodesKeys {
                        group: stored.group,
                        generation_key_pair: ElGamalKeyPair::from_private_key(generation),
                        generation_public_key_signature: stored.generation_public_key_signature,
                        choice_codes_encryption_key_pair: ElGamalKeyPair::from_private_key(
                            choice_codes_encryption,
                        ),
                        choice_codes_encryption_public_key_signature: stored
                            .choice_codes_encryption_public_key_signature,
                    },
                );
            }
            for stored in contents.election_signing_keys {
                let bytes = hex::decode(&stored.secret_key)
                    .map_err(|e| KeyManagementError::InvalidKeyStore(e.to_string()))?;
                let secret = secret_from_bytes(&bytes)?;
                keys.election_signing.insert(
                    stored.election_event_id,
                    ElectionSigningKeys {
                        secret: secret.to_bytes(),
                        certificate: stored.certificate,
                    },
                );
            }
        }

        Ok(manager)
    }
}

impl KeyManager for MemKeyManager {
    fn platform_ca_certificate(&self) -> Result<Certificate, KeyManagementError> {
        Ok(self.platform_ca.clone())
    }

    fn node_ca_certificate(&self) -> Result<Certificate, KeyManagementError> {
        Ok(self.node_ca.clone())
    }

    fn encryption_parameters(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<MathGroup, KeyManagementError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.return_codes
            .get(&(election_event_id.to_owned(), verification_card_set_id.to_owned()))
            .map(|k| k.group.clone())
            .ok_or_else(|| {
                KeyManagementError::NotFound(format!(
                    "encryption parameters for verification card set {}",
                    verification_card_set_id
                ))
            })
    }

    fn has_ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> bool {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.return_codes
            .contains_key(&(election_event_id.to_owned(), verification_card_set_id.to_owned()))
    }

    fn create_ccrj_return_codes_keys(
        &self,
        spec: &CcrjReturnCodesKeysSpec,
    ) -> Result<CcrjReturnCodesPublicKeys, KeyManagementError> {
        let length = spec.choice_codes_encryption_key_length;
        if length == 0 || length > MAX_CHOICE_CODES_ENCRYPTION_KEY_LENGTH {
            return Err(KeyManagementError::InvalidKeySpec(format!(
                "choice codes encryption key length must be between 1 and {}, got {}",
                MAX_CHOICE_CODES_ENCRYPTION_KEY_LENGTH, length
            )));
        }

        let id = (spec.election_event_id.clone(), spec.verification_card_set_id.clone());
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if keys.return_codes.contains_key(&id) {
            return Err(KeyManagementError::AlreadyExists(format!(
                "return codes keys for verification card set {}",
                spec.verification_card_set_id
            )));
        }

        let invalid = |e: Error| KeyManagementError::InvalidKeySpec(e.to_string());
        let mut csprng = OsRng {};
        let generation = ElGamalKeyPair::generate(&spec.group, 1, &mut csprng).map_err(invalid)?;
        let choice_codes_encryption =
            ElGamalKeyPair::generate(&spec.group, length, &mut csprng).map_err(invalid)?;

        let signer = match keys.election_signing.get(&spec.election_event_id) {
            Some(signing) => secret_from_bytes(&signing.secret)?,
            None => {
                return Err(KeyManagementError::NotFound(format!(
                    "election signing key for election event {}",
                    spec.election_event_id
                )))
            }
        };
        let generation_public_key = SignedPublicKey::sign(
            &signer,
            generation.public_key.clone(),
            &spec.election_event_id,
            &spec.verification_card_set_id,
        );
        let choice_codes_encryption_public_key = SignedPublicKey::sign(
            &signer,
            choice_codes_encryption.public_key.clone(),
            &spec.election_event_id,
            &spec.verification_card_set_id,
        );

        keys.return_codes.insert(
            id,
            CcrjReturnCodesKeys {
                group: spec.group.clone(),
                generation_key_pair: generation,
                generation_public_key_signature: generation_public_key.signature,
                choice_codes_encryption_key_pair: choice_codes_encryption,
                choice_codes_encryption_public_key_signature: choice_codes_encryption_public_key
                    .signature,
            },
        );

        info!(
            "created return codes keys for election event {} verification card set {}",
            spec.election_event_id, spec.verification_card_set_id
        );

        Ok(CcrjReturnCodesPublicKeys {
            generation_public_key,
            choice_codes_encryption_public_key,
        })
    }

    fn ccrj_return_codes_keys(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<CcrjReturnCodesKeys, KeyManagementError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.return_codes
            .get(&(election_event_id.to_owned(), verification_card_set_id.to_owned()))
            .cloned()
            .ok_or_else(|| {
                KeyManagementError::NotFound(format!(
                    "return codes keys for verification card set {}",
                    verification_card_set_id
                ))
            })
    }

    fn create_election_signing_keys(
        &self,
        election_event_id: &str,
    ) -> Result<Certificate, KeyManagementError> {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if keys.election_signing.contains_key(election_event_id) {
            return Err(KeyManagementError::AlreadyExists(format!(
                "election signing keys for election event {}",
                election_event_id
            )));
        }

        let Keypair { public, secret } = Keypair::generate(&mut OsRng {});
        let certificate = self
            .node_ca
            .issue(
                &self.node_ca_secret()?,
                &format!("election-signing-{}", election_event_id),
                public,
            )
            .map_err(|e| KeyManagementError::InvalidNodeCa(e.to_string()))?;

        keys.election_signing.insert(
            election_event_id.to_owned(),
            ElectionSigningKeys {
                secret: secret.to_bytes(),
                certificate: certificate.clone(),
            },
        );

        Ok(certificate)
    }

    fn election_signing_private_key(
        &self,
        election_event_id: &str,
    ) -> Result<SecretKey, KeyManagementError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let signing = keys.election_signing.get(election_event_id).ok_or_else(|| {
            KeyManagementError::NotFound(format!(
                "election signing key for election event {}",
                election_event_id
            ))
        })?;
        secret_from_bytes(&signing.secret)
    }

    fn election_signing_certificate_chain(
        &self,
        election_event_id: &str,
    ) -> Result<Vec<Certificate>, KeyManagementError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let signing = keys.election_signing.get(election_event_id).ok_or_else(|| {
            KeyManagementError::NotFound(format!(
                "election signing certificate for election event {}",
                election_event_id
            ))
        })?;
        Ok(vec![signing.certificate.clone(), self.node_ca.clone()])
    }
}

#[derive(Serialize, Deserialize)]
struct SealedContents {
    platform_ca: Certificate,
    node_ca: Certificate,
    node_ca_secret: String,
    return_codes_keys: Vec<StoredReturnCodesKeys>,
    election_signing_keys: Vec<StoredElectionSigningKeys>,
}

#[derive(Serialize, Deserialize)]
struct StoredReturnCodesKeys {
    election_event_id: String,
    verification_card_set_id: String,
    group: MathGroup,

    #[serde(with = "crate::serde_decimal::vec")]
    generation_secret_key: Vec<BigUint>,

    #[serde(with = "EdSignatureHex")]
    generation_public_key_signature: Signature,

    #[serde(with = "crate::serde_decimal::vec")]
    choice_codes_encryption_secret_key: Vec<BigUint>,

    #[serde(with = "EdSignatureHex")]
    choice_codes_encryption_public_key_signature: Signature,
}

#[derive(Serialize, Deserialize)]
struct StoredElectionSigningKeys {
    election_event_id: String,
    secret_key: String,
    certificate: Certificate,
}
