use crate::*;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalPrivateKey {
    group: MathGroup,
    keys: Vec<Exponent>,
}

impl ElGamalPrivateKey {
    pub fn new(group: &MathGroup, keys: Vec<Exponent>) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(Error::EmptyKey);
        }
        Ok(ElGamalPrivateKey {
            group: group.clone(),
            keys,
        })
    }

    /// Rebuild from raw values, each of which must be below `q`.
    pub fn from_values(group: &MathGroup, values: &[BigUint]) -> Result<Self, Error> {
        let keys = values
            .iter()
            .map(|v| group.exponent(v.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(group, keys)
    }

    pub fn group(&self) -> &MathGroup {
        &self.group
    }

    pub fn keys(&self) -> &[Exponent] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sum of the key exponents modulo `q`.
    pub fn compress(&self) -> Exponent {
        self.group.sum_exponents(&self.keys)
    }

    pub fn to_values(&self) -> Vec<BigUint> {
        self.keys.iter().map(|k| k.value().clone()).collect()
    }

    /// `public[i] = g^private[i]`
    pub fn public_key(&self) -> ElGamalPublicKey {
        let g = self.group.generator();
        ElGamalPublicKey {
            group: self.group.clone(),
            keys: self.keys.iter().map(|k| g.exponentiate(k)).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalPublicKey {
    group: MathGroup,
    keys: Vec<GroupElement>,
}

impl ElGamalPublicKey {
    pub fn new(group: &MathGroup, keys: Vec<GroupElement>) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(Error::EmptyKey);
        }
        if keys.iter().any(|k| k.group() != group) {
            return Err(Error::GroupMismatch);
        }
        Ok(ElGamalPublicKey {
            group: group.clone(),
            keys,
        })
    }

    /// Rebuild from raw values, each of which must be a group member.
    pub fn from_values(group: &MathGroup, values: &[BigUint]) -> Result<Self, Error> {
        Self::new(group, group.elements(values)?)
    }

    pub fn group(&self) -> &MathGroup {
        &self.group
    }

    pub fn keys(&self) -> &[GroupElement] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first_subkey(&self) -> &GroupElement {
        &self.keys[0]
    }

    /// Product of the key elements.
    pub fn compress(&self) -> GroupElement {
        self.group.compress(&self.keys)
    }

    pub fn to_values(&self) -> Vec<BigUint> {
        values_of(&self.keys)
    }

    /// Bytes covered by a public key signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.keys
            .iter()
            .map(|k| k.value().to_str_radix(10))
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElGamalKeyPair {
    pub private_key: ElGamalPrivateKey,
    pub public_key: ElGamalPublicKey,
}

impl ElGamalKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(
        group: &MathGroup,
        length: usize,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let keys = (0..length).map(|_| group.random_exponent(rng)).collect();
        Ok(Self::from_private_key(ElGamalPrivateKey::new(group, keys)?))
    }

    pub fn from_private_key(private_key: ElGamalPrivateKey) -> Self {
        let public_key = private_key.public_key();
        ElGamalKeyPair {
            private_key,
            public_key,
        }
    }
}

/// A multi-recipient ElGamal ciphertext `(gamma, phi_1..phi_n)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    gamma: GroupElement,
    phis: Vec<GroupElement>,
}

impl Ciphertext {
    pub fn new(gamma: GroupElement, phis: Vec<GroupElement>) -> Result<Self, Error> {
        if phis.iter().any(|phi| phi.group() != gamma.group()) {
            return Err(Error::GroupMismatch);
        }
        Ok(Ciphertext { gamma, phis })
    }

    /// Rebuild from wire values. Every value must be a group member.
    pub fn from_values(group: &MathGroup, values: &CiphertextValues) -> Result<Self, Error> {
        Ok(Ciphertext {
            gamma: group.element(values.gamma.clone())?,
            phis: group.elements(&values.phis)?,
        })
    }

    pub fn gamma(&self) -> &GroupElement {
        &self.gamma
    }

    pub fn phis(&self) -> &[GroupElement] {
        &self.phis
    }

    pub fn group(&self) -> &MathGroup {
        self.gamma.group()
    }

    /// Raise every component to the same exponent.
    pub fn exponentiate(&self, exponent: &Exponent) -> Ciphertext {
        Ciphertext {
            gamma: self.gamma.exponentiate(exponent),
            phis: self.phis.iter().map(|phi| phi.exponentiate(exponent)).collect(),
        }
    }

    /// `[gamma, phi_1..phi_n]`
    pub fn elements(&self) -> Vec<GroupElement> {
        let mut elements = Vec::with_capacity(self.phis.len() + 1);
        elements.push(self.gamma.clone());
        elements.extend(self.phis.iter().cloned());
        elements
    }

    pub fn to_values(&self) -> CiphertextValues {
        CiphertextValues {
            gamma: self.gamma.value().clone(),
            phis: values_of(&self.phis),
        }
    }
}

/// Encrypt `messages` under the first `messages.len()` elements of `public_key`,
/// with randomness `r`.
pub fn encrypt(
    public_key: &ElGamalPublicKey,
    messages: &[GroupElement],
    r: &Exponent,
) -> Result<Ciphertext, Error> {
    if messages.is_empty() || messages.len() > public_key.len() {
        return Err(Error::InvalidProofInput("message count does not fit the public key"));
    }
    let group = public_key.group();
    let gamma = group.generator().exponentiate(r);
    let phis = messages
        .iter()
        .zip(public_key.keys())
        .map(|(m, pk)| pk.exponentiate(r).multiply(m))
        .collect();
    Ciphertext::new(gamma, phis)
}

/// Wire form of a ciphertext.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextValues {
    #[serde(with = "crate::serde_decimal")]
    pub gamma: BigUint,

    #[serde(with = "crate::serde_decimal::vec")]
    pub phis: Vec<BigUint>,
}
