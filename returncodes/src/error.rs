use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("returncodes: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("returncodes: mismatched public keys")]
    MismatchedPublicKeys,

    #[error("returncodes: missing signature")]
    MissingSignature,

    #[error("returncodes: empty certificate chain")]
    EmptyCertificateChain,

    #[error("returncodes: certificate {subject} was not issued by {issuer}")]
    CertificateIssuerMismatch { subject: String, issuer: String },

    #[error("returncodes: CBOR error: {0}")]
    CBOR(#[from] serde_cbor::Error),

    #[error("returncodes: JSON error: {0}")]
    JSON(#[from] serde_json::Error),

    #[error("returncodes: empty message")]
    EmptyMessage,

    #[error("returncodes: unknown message encoding tag {0}")]
    UnknownEncoding(u8),

    #[error("returncodes: unknown message kind {0}")]
    UnknownMessageKind(String),

    #[error("returncodes: invalid group: {0}")]
    InvalidGroup(&'static str),

    #[error("returncodes: value {0} is not a member of the group")]
    NotGroupMember(String),

    #[error("returncodes: exponent out of range")]
    InvalidExponent,

    #[error("returncodes: elements belong to different groups")]
    GroupMismatch,

    #[error("returncodes: an ElGamal key must have at least one element")]
    EmptyKey,

    #[error("returncodes: invalid proof input: {0}")]
    InvalidProofInput(&'static str),

    #[error("returncodes: key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("returncodes: invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Key management errors. These are infrastructural and fatal for the message being processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyManagementError {
    #[error("returncodes key management: {0} not found")]
    NotFound(String),

    #[error("returncodes key management: {0} already exists")]
    AlreadyExists(String),

    #[error("returncodes key management: invalid password")]
    InvalidPassword,

    #[error("returncodes key management: invalid key store: {0}")]
    InvalidKeyStore(String),

    #[error("returncodes key management: invalid node CA: {0}")]
    InvalidNodeCa(String),

    #[error("returncodes key management: invalid key spec: {0}")]
    InvalidKeySpec(String),
}

/// Protocol state violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("returncodes state: card {verification_card_id} ({election_event_id}) not computed")]
    MissingComputedVerificationCard {
        election_event_id: String,
        verification_card_id: String,
    },

    #[error("returncodes state: exponentiation already computed for verification card {0}")]
    AlreadyExponentiated(String),

    #[error("returncodes state: exponentiation not yet computed for verification card {0}")]
    NotExponentiated(String),

    #[error("returncodes state: no correctness info for set {verification_card_set_id}")]
    MissingCorrectnessInformation {
        election_event_id: String,
        verification_card_set_id: String,
    },

    #[error("returncodes state: no public key stored for verification card {0}")]
    MissingVerificationCardPublicKey(String),
}

/// Errors that escape message processing.
///
/// Anything that is merely a failed check produces an `Outcome::Rejected` instead.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("returncodes: invalid request, missing or malformed fields: {}", .0.join(", "))]
    InvalidRequest(Vec<String>),

    #[error(transparent)]
    KeyManagement(#[from] KeyManagementError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Internal(#[from] Error),
}

/// Why a message was dropped without a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("request is not signed")]
    MissingSignature,

    #[error("request signature is invalid: {0}")]
    InvalidSignature(String),

    #[error("request group does not match the stored key group")]
    GroupMismatch,

    #[error("no encryption parameters for the election event")]
    MissingGroup,

    #[error("partial choice return codes verification input is missing")]
    MissingVerificationInput,

    #[error("confirmation key verification input is present in a partial decryption request")]
    UnexpectedConfirmationInput,

    #[error("verification card has already been decrypted")]
    AlreadyDecrypted,

    #[error("vote could not be parsed: {0}")]
    MalformedVote(String),

    #[error("vote does not belong to the requested verification card")]
    VoteMismatch,

    #[error("return codes input elements are missing")]
    MissingReturnCodesInput,

    #[error("{what}: expected {expected} elements, found {found}")]
    WrongNumberOfElements {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0} contains an element outside the group")]
    NotGroupMember(&'static str),

    #[error("first element of the server list does not match the vote")]
    FirstElementMismatch,

    #[error("certificates are missing")]
    MissingCertificates,

    #[error("certificate chain is invalid: {0}")]
    InvalidCertificateChain(String),

    #[error("vote proofs are invalid")]
    InvalidProofs,

    #[error("partial choice return codes are not pairwise distinct")]
    DuplicateElements,

    #[error("maximum number of confirmation attempts ({0}) reached")]
    ConfirmationAttemptsExceeded(u32),

    #[error("confirmation message could not be parsed: {0}")]
    MalformedConfirmationMessage(String),

    #[error("confirmation key does not match the client confirmation message")]
    ConfirmationKeyMismatch,

    #[error("cryptographic failure: {0}")]
    Cryptographic(String),

    #[error("key unavailable: {0}")]
    KeyUnavailable(KeyManagementError),
}

/// The result of processing one message: either a response to send, or a silent drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Rejected(RejectionReason),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Rejected(reason) => Some(reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Rejected(reason) => Outcome::Rejected(reason),
        }
    }
}

/// Return early with `Outcome::Rejected` from a function returning `Result<Outcome<_>, _>`.
macro_rules! reject {
    ($reason:expr) => {
        return Ok(Outcome::Rejected($reason))
    };
}
