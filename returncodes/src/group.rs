use crate::*;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use std::convert::TryFrom;

/// Multiplicative group of quadratic residues modulo a safe prime `p = 2q + 1`,
/// with generator `g` of the order-`q` subgroup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "MathGroupValues")]
pub struct MathGroup {
    #[serde(with = "crate::serde_decimal")]
    p: BigUint,

    #[serde(with = "crate::serde_decimal")]
    q: BigUint,

    #[serde(with = "crate::serde_decimal")]
    g: BigUint,
}

/// Unchecked wire form of a [`MathGroup`]
#[derive(Deserialize)]
struct MathGroupValues {
    #[serde(with = "crate::serde_decimal")]
    p: BigUint,

    #[serde(with = "crate::serde_decimal")]
    q: BigUint,

    #[serde(with = "crate::serde_decimal")]
    g: BigUint,
}

impl TryFrom<MathGroupValues> for MathGroup {
    type Error = Error;

    fn try_from(values: MathGroupValues) -> Result<Self, Error> {
        MathGroup::new(values.p, values.q, values.g)
    }
}

impl MathGroup {
    /// Build a group, checking that `p = 2q + 1` and that `g` generates the order-`q` subgroup.
    ///
    /// Primality of `p` and `q` is not checked.
    pub fn new(p: BigUint, q: BigUint, g: BigUint) -> Result<Self, Error> {
        let two = BigUint::from(2u32);
        if q < two {
            return Err(Error::InvalidGroup("q must be at least 2"));
        }
        if p != &q * &two + BigUint::one() {
            return Err(Error::InvalidGroup("p must equal 2q + 1"));
        }
        if g <= BigUint::one() || g >= p {
            return Err(Error::InvalidGroup("g must lie strictly between 1 and p"));
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(Error::InvalidGroup("g does not generate the order-q subgroup"));
        }
        Ok(MathGroup { p, q, g })
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// A value is a member when `0 < value < p` and `value^q == 1 (mod p)`.
    pub fn is_member(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.p && value.modpow(&self.q, &self.p).is_one()
    }

    /// Check that every value is a member.
    pub fn are_members<'a, I: IntoIterator<Item = &'a BigUint>>(&self, values: I) -> bool {
        values.into_iter().all(|v| self.is_member(v))
    }

    pub fn element(&self, value: BigUint) -> Result<GroupElement, Error> {
        if !self.is_member(&value) {
            return Err(Error::NotGroupMember(value.to_string()));
        }
        Ok(GroupElement::new_unchecked(value, self))
    }

    pub fn elements(&self, values: &[BigUint]) -> Result<Vec<GroupElement>, Error> {
        values.iter().map(|v| self.element(v.clone())).collect()
    }

    pub fn generator(&self) -> GroupElement {
        GroupElement::new_unchecked(self.g.clone(), self)
    }

    pub fn identity(&self) -> GroupElement {
        GroupElement::new_unchecked(BigUint::one(), self)
    }

    /// An exponent must lie in `[0, q)`.
    pub fn exponent(&self, value: BigUint) -> Result<Exponent, Error> {
        if value >= self.q {
            return Err(Error::InvalidExponent);
        }
        Ok(Exponent { value })
    }

    /// Reduce an arbitrary integer into an exponent.
    pub fn exponent_mod_q(&self, value: &BigUint) -> Exponent {
        Exponent {
            value: value % &self.q,
        }
    }

    pub fn random_exponent<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Exponent {
        Exponent {
            value: rng.gen_biguint_below(&self.q),
        }
    }

    /// Product of the given elements, the identity for an empty slice.
    pub fn compress(&self, elements: &[GroupElement]) -> GroupElement {
        elements
            .iter()
            .fold(self.identity(), |acc, element| acc.multiply(element))
    }

    /// Sum of the given exponents modulo `q`.
    pub fn sum_exponents(&self, exponents: &[Exponent]) -> Exponent {
        let sum = exponents
            .iter()
            .fold(BigUint::zero(), |acc, e| acc + &e.value);
        self.exponent_mod_q(&sum)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupElement {
    value: BigUint,
    group: MathGroup,
}

impl GroupElement {
    pub(crate) fn new_unchecked(value: BigUint, group: &MathGroup) -> Self {
        GroupElement {
            value,
            group: group.clone(),
        }
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn into_value(self) -> BigUint {
        self.value
    }

    pub fn group(&self) -> &MathGroup {
        &self.group
    }

    pub fn exponentiate(&self, exponent: &Exponent) -> GroupElement {
        GroupElement {
            value: self.value.modpow(&exponent.value, &self.group.p),
            group: self.group.clone(),
        }
    }

    /// Both elements must come from the same group.
    pub fn multiply(&self, other: &GroupElement) -> GroupElement {
        debug_assert_eq!(self.group, other.group);
        GroupElement {
            value: (&self.value * &other.value) % &self.group.p,
            group: self.group.clone(),
        }
    }

    /// Inverse within the order-`q` subgroup, `x^(q-1)`.
    pub fn invert(&self) -> GroupElement {
        let exponent = &self.group.q - BigUint::one();
        GroupElement {
            value: self.value.modpow(&exponent, &self.group.p),
            group: self.group.clone(),
        }
    }
}

/// An integer in `[0, q)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Exponent {
    value: BigUint,
}

impl Exponent {
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn into_value(self) -> BigUint {
        self.value
    }
}

/// Raw values of the elements, in order.
pub fn values_of(elements: &[GroupElement]) -> Vec<BigUint> {
    elements.iter().map(|e| e.value().clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_group() -> MathGroup {
        MathGroup::new(7u32.into(), 3u32.into(), 2u32.into()).unwrap()
    }

    #[test]
    fn membership_in_the_quadratic_residues() {
        let group = toy_group();
        let members: Vec<u32> = (0..=7u32)
            .filter(|v| group.is_member(&BigUint::from(*v)))
            .collect();
        assert_eq!(members, vec![1, 2, 4]);
        assert!(group.element(3u32.into()).is_err());
    }

    #[test]
    fn group_parameters_are_checked() {
        assert!(MathGroup::new(7u32.into(), 4u32.into(), 2u32.into()).is_err());
        assert!(MathGroup::new(7u32.into(), 3u32.into(), 1u32.into()).is_err());
        assert!(MathGroup::new(7u32.into(), 3u32.into(), 7u32.into()).is_err());
        // 3 is a non-residue mod 7
        assert!(MathGroup::new(7u32.into(), 3u32.into(), 3u32.into()).is_err());
    }

    #[test]
    fn deserialized_groups_are_checked() {
        let group: MathGroup = serde_json::from_str(r#"{"p":"23","q":"11","g":"4"}"#).unwrap();
        assert_eq!(group, MathGroup::new(23u32.into(), 11u32.into(), 4u32.into()).unwrap());
        assert_eq!(serde_json::to_string(&group).unwrap(), r#"{"p":"23","q":"11","g":"4"}"#);

        assert!(serde_json::from_str::<MathGroup>(r#"{"p":"23","q":"11","g":"5"}"#).is_err());
        assert!(serde_json::from_str::<MathGroup>(r#"{"p":"24","q":"11","g":"4"}"#).is_err());
    }

    #[test]
    fn arithmetic_stays_in_the_group() {
        let group = MathGroup::new(23u32.into(), 11u32.into(), 4u32.into()).unwrap();
        let g = group.generator();
        let e = group.exponent(5u32.into()).unwrap();
        let x = g.exponentiate(&e);
        assert_eq!(x.value(), &BigUint::from(12u32)); // 4^5 = 1024 = 12 mod 23
        assert!(group.is_member(x.value()));
        assert_eq!(x.multiply(&x.invert()), group.identity());
        assert_eq!(group.compress(&[]), group.identity());
        assert_eq!(group.compress(&[g.clone(), x.clone()]), g.multiply(&x));
        assert!(group.exponent(11u32.into()).is_err());
    }

    #[test]
    fn exponents_sum_modulo_q() {
        let group = MathGroup::new(23u32.into(), 11u32.into(), 4u32.into()).unwrap();
        let a = group.exponent(7u32.into()).unwrap();
        let b = group.exponent(9u32.into()).unwrap();
        assert_eq!(group.sum_exponents(&[a, b]).value(), &BigUint::from(5u32));
    }
}
