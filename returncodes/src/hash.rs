use crate::*;
use digest::Digest;
use num_bigint::BigUint;
use num_traits::One;
use sha2::Sha256;

/// A value that can be fed to the recursive hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hashable {
    Bytes(Vec<u8>),
    Text(String),
    Integer(BigUint),
    List(Vec<Hashable>),
}

impl From<&str> for Hashable {
    fn from(s: &str) -> Self {
        Hashable::Text(s.to_owned())
    }
}

impl From<String> for Hashable {
    fn from(s: String) -> Self {
        Hashable::Text(s)
    }
}

impl From<BigUint> for Hashable {
    fn from(value: BigUint) -> Self {
        Hashable::Integer(value)
    }
}

impl From<&BigUint> for Hashable {
    fn from(value: &BigUint) -> Self {
        Hashable::Integer(value.clone())
    }
}

impl From<&GroupElement> for Hashable {
    fn from(element: &GroupElement) -> Self {
        Hashable::Integer(element.value().clone())
    }
}

impl<T: Into<Hashable>> From<Vec<T>> for Hashable {
    fn from(values: Vec<T>) -> Self {
        Hashable::List(values.into_iter().map(Into::into).collect())
    }
}

pub trait HashService {
    /// Hash a structured value. Each kind carries its own domain prefix so that,
    /// for example, the text "1" and the integer 1 never collide.
    fn recursive_hash(&self, value: &Hashable) -> Vec<u8>;

    /// Hash into `[0, q)`.
    fn hash_to_zq(&self, value: &Hashable, group: &MathGroup) -> BigUint {
        BigUint::from_bytes_be(&self.recursive_hash(value)) % group.q()
    }

    /// `(hash_to_zq(x) + 1)^2 mod p`, which is always a quadratic residue.
    fn hash_and_square(&self, element: &GroupElement) -> GroupElement {
        let group = element.group();
        let hashed = self.hash_to_zq(&Hashable::from(element), group) + BigUint::one();
        let squared = hashed.modpow(&BigUint::from(2u32), group.p());
        GroupElement::new_unchecked(squared, group)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256HashService;

impl Sha256HashService {
    const BYTES: u8 = 0x00;
    const INTEGER: u8 = 0x01;
    const TEXT: u8 = 0x02;
    const LIST: u8 = 0x03;
}

impl HashService for Sha256HashService {
    fn recursive_hash(&self, value: &Hashable) -> Vec<u8> {
        let mut hasher = Sha256::new();
        match value {
            Hashable::Bytes(bytes) => {
                hasher.update(&[Self::BYTES]);
                hasher.update(bytes);
            }
            Hashable::Integer(value) => {
                hasher.update(&[Self::INTEGER]);
                hasher.update(&value.to_bytes_be());
            }
            Hashable::Text(text) => {
                hasher.update(&[Self::TEXT]);
                hasher.update(text.as_bytes());
            }
            Hashable::List(values) => {
                hasher.update(&[Self::LIST]);
                for value in values {
                    hasher.update(&self.recursive_hash(value));
                }
            }
        }
        hasher.finalize().to_vec()
    }
}
