use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use serde::Serialize;
use std::ops::Deref;

/// A named public key, signed by its issuer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    pub subject: String,
    pub issuer: String,

    #[serde(with = "EdPublicKeyHex")]
    pub public_key: PublicKey,

    #[serde(with = "EdSignatureHex")]
    pub signature: Signature,
}

#[derive(Serialize)]
struct CertificatePackage<'a> {
    subject: &'a str,
    issuer: &'a str,
    public_key: &'a [u8],
}

fn certificate_package(
    subject: &str,
    issuer: &str,
    public_key: &PublicKey,
) -> Result<Vec<u8>, Error> {
    let package = CertificatePackage {
        subject,
        issuer,
        public_key: public_key.as_bytes(),
    };
    Ok(serde_cbor::to_vec(&package)?)
}

impl Certificate {
    /// Create a new root certificate along with its secret key
    pub fn new_root(subject: &str) -> Result<(Self, SecretKey), Error> {
        let mut csprng = rand::rngs::OsRng {};
        let Keypair { public, secret } = Keypair::generate(&mut csprng);

        let serialized = certificate_package(subject, subject, &public)?;
        let expanded: ExpandedSecretKey = (&secret).into();
        let signature = expanded.sign(&serialized, &public);

        let cert = Certificate {
            subject: subject.to_owned(),
            issuer: subject.to_owned(),
            public_key: public,
            signature,
        };
        Ok((cert, secret))
    }

    /// Issue a certificate for `public_key`, signed by this certificate's key
    pub fn issue(
        &self,
        issuer_secret: &SecretKey,
        subject: &str,
        public_key: PublicKey,
    ) -> Result<Certificate, Error> {
        if PublicKey::from(issuer_secret) != self.public_key {
            return Err(Error::MismatchedPublicKeys);
        }

        let serialized = certificate_package(subject, &self.subject, &public_key)?;
        let expanded: ExpandedSecretKey = issuer_secret.into();
        let signature = expanded.sign(&serialized, &self.public_key);

        Ok(Certificate {
            subject: subject.to_owned(),
            issuer: self.subject.clone(),
            public_key,
            signature,
        })
    }

    /// Verify that this certificate was issued by `issuer`
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<(), Error> {
        if self.issuer != issuer.subject {
            return Err(Error::CertificateIssuerMismatch {
                subject: self.subject.clone(),
                issuer: issuer.subject.clone(),
            });
        }
        let serialized = certificate_package(&self.subject, &self.issuer, &self.public_key)?;
        Ok(issuer.public_key.verify_strict(&serialized, &self.signature)?)
    }
}

/// Validate a chain ordered leaf first. Each certificate is issued by the
/// next one and the last is issued by `root`.
pub fn validate_chain(chain: &[Certificate], root: &Certificate) -> Result<(), Error> {
    let last = chain.last().ok_or(Error::EmptyCertificateChain)?;
    for pair in chain.windows(2) {
        pair[0].verify_issued_by(&pair[1])?;
    }
    last.verify_issued_by(root)
}

/// Sign the concatenation of `parts`
pub fn sign_detached(secret: &SecretKey, parts: &[&[u8]]) -> Signature {
    let public = PublicKey::from(secret);
    let expanded: ExpandedSecretKey = secret.into();
    expanded.sign(&parts.concat(), &public)
}

/// Verify a signature over the concatenation of `parts`
pub fn verify_detached(
    public: &PublicKey,
    parts: &[&[u8]],
    signature: &Signature,
) -> Result<(), Error> {
    Ok(public.verify_strict(&parts.concat(), signature)?)
}

/// Something that can be signed as a whole
pub trait Signable: Serialize {
    fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(&self)?)
    }
}

/// A signature plus the certificate chain of the signing key, leaf first
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PayloadSignature {
    #[serde(with = "EdSignatureHex")]
    pub signature: Signature,

    pub certificate_chain: Vec<Certificate>,
}

/// A payload and an optional chained signature over it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Signed<T> {
    pub payload: T,

    #[serde(default)]
    pub signature: Option<PayloadSignature>,
}

impl<T: Signable> Signed<T> {
    /// Sign a payload with the leaf key of `certificate_chain`
    pub fn sign(
        secret: &SecretKey,
        certificate_chain: Vec<Certificate>,
        payload: T,
    ) -> Result<Self, Error> {
        let leaf = certificate_chain.first().ok_or(Error::EmptyCertificateChain)?;
        let public_key = PublicKey::from(secret);
        if public_key != leaf.public_key {
            return Err(Error::MismatchedPublicKeys);
        }

        let serialized = payload.as_bytes()?;
        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&serialized, &public_key);

        Ok(Signed {
            payload,
            signature: Some(PayloadSignature {
                signature,
                certificate_chain,
            }),
        })
    }

    pub fn unsigned(payload: T) -> Self {
        Signed {
            payload,
            signature: None,
        }
    }

    /// Verify the chain against `root`, then the signature against the leaf key
    pub fn verify_signature(&self, root: &Certificate) -> Result<(), Error> {
        let signature = self.signature.as_ref().ok_or(Error::MissingSignature)?;
        validate_chain(&signature.certificate_chain, root)?;

        // validate_chain guarantees a non-empty chain
        let leaf = &signature.certificate_chain[0];
        let serialized = self.payload.as_bytes()?;
        Ok(leaf.public_key.verify_strict(&serialized, &signature.signature)?)
    }

    /// Get the inner payload
    pub fn inner(&self) -> &T {
        &self.payload
    }

    pub fn into_inner(self) -> T {
        self.payload
    }
}

impl<T: Signable> Deref for Signed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

/// Content signed directly by a known key, such as the administration board's.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignedContent<T> {
    pub content: T,

    #[serde(with = "EdSignatureHex")]
    pub signature: Signature,
}

impl<T: Serialize> SignedContent<T> {
    pub fn sign(secret: &SecretKey, content: T) -> Result<Self, Error> {
        let serialized = serde_cbor::to_vec(&content)?;
        let signature = sign_detached(secret, &[serialized.as_slice()]);
        Ok(SignedContent { content, signature })
    }

    pub fn verify(&self, public: &PublicKey) -> Result<(), Error> {
        let serialized = serde_cbor::to_vec(&self.content)?;
        verify_detached(public, &[serialized.as_slice()], &self.signature)
    }
}
