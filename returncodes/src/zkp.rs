use crate::*;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

/// Proof that the same secret exponent maps each base to its exponentiated element.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExponentiationProof {
    #[serde(with = "crate::serde_decimal")]
    pub e: BigUint,

    #[serde(with = "crate::serde_decimal")]
    pub z: BigUint,
}

/// Proof that two single-element ciphertexts under different keys hold the same plaintext.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextEqualityProof {
    #[serde(with = "crate::serde_decimal")]
    pub e: BigUint,

    #[serde(with = "crate::serde_decimal::vec")]
    pub z: Vec<BigUint>,
}

/// The proofs this node knows how to check.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Proof {
    Exponentiation(ExponentiationProof),
    PlaintextEquality(PlaintextEqualityProof),
}

/// The statement a plaintext equality proof is about.
#[derive(Clone, Debug)]
pub struct PlaintextEqualityStatement<'a> {
    pub primary: &'a Ciphertext,
    pub primary_key: &'a GroupElement,
    pub secondary: &'a Ciphertext,
    pub secondary_key: &'a GroupElement,
}

/// Generation and verification of sigma-protocol proofs.
///
/// Malformed inputs (length mismatches, mixed groups) are errors. A proof that
/// simply does not verify is `Ok(false)`.
pub trait ZeroKnowledgeProof {
    fn gen_exponentiation_proof<R: RngCore + CryptoRng>(
        &self,
        bases: &[GroupElement],
        exponent: &Exponent,
        exponentiated: &[GroupElement],
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<ExponentiationProof, Error>;

    fn verify_exponentiation_proof(
        &self,
        bases: &[GroupElement],
        exponentiated: &[GroupElement],
        proof: &ExponentiationProof,
        auxiliary: &[String],
    ) -> Result<bool, Error>;

    /// `randomness` holds the encryption randomness of the primary and secondary ciphertexts.
    fn gen_plaintext_equality_proof<R: RngCore + CryptoRng>(
        &self,
        statement: &PlaintextEqualityStatement,
        randomness: (&Exponent, &Exponent),
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<PlaintextEqualityProof, Error>;

    fn verify_plaintext_equality_proof(
        &self,
        statement: &PlaintextEqualityStatement,
        proof: &PlaintextEqualityProof,
        auxiliary: &[String],
    ) -> Result<bool, Error>;

    fn verify(
        &self,
        proof: &Proof,
        statement: &ProofStatement,
        auxiliary: &[String],
    ) -> Result<bool, Error> {
        match (proof, statement) {
            (
                Proof::Exponentiation(proof),
                ProofStatement::Exponentiation {
                    bases,
                    exponentiated,
                },
            ) => self.verify_exponentiation_proof(bases, exponentiated, proof, auxiliary),
            (Proof::PlaintextEquality(proof), ProofStatement::PlaintextEquality(statement)) => {
                self.verify_plaintext_equality_proof(statement, proof, auxiliary)
            }
            _ => Err(Error::InvalidProofInput("proof does not match its statement")),
        }
    }
}

/// What a [`Proof`] claims.
#[derive(Clone, Debug)]
pub enum ProofStatement<'a> {
    Exponentiation {
        bases: &'a [GroupElement],
        exponentiated: &'a [GroupElement],
    },
    PlaintextEquality(PlaintextEqualityStatement<'a>),
}

/// Fiat-Shamir sigma proofs over a [`HashService`].
#[derive(Clone, Copy, Debug)]
pub struct SigmaProofService<H: HashService = Sha256HashService> {
    hash: H,
}

impl Default for SigmaProofService {
    fn default() -> Self {
        SigmaProofService::new(Sha256HashService)
    }
}

impl<H: HashService> SigmaProofService<H> {
    pub fn new(hash: H) -> Self {
        SigmaProofService { hash }
    }

    fn challenge(
        &self,
        group: &MathGroup,
        statement: Vec<Hashable>,
        commitment: &[GroupElement],
        auxiliary: &[String],
    ) -> BigUint {
        let value = Hashable::List(vec![
            Hashable::List(vec![group.p().into(), group.q().into(), group.g().into()]),
            Hashable::List(statement),
            Hashable::List(commitment.iter().map(Hashable::from).collect()),
            Hashable::List(auxiliary.iter().map(|a| Hashable::from(a.as_str())).collect()),
        ]);
        self.hash.hash_to_zq(&value, group)
    }
}

fn single_group<'a, I: IntoIterator<Item = &'a GroupElement>>(
    elements: I,
) -> Result<MathGroup, Error> {
    let mut elements = elements.into_iter();
    let group = elements
        .next()
        .map(|e| e.group().clone())
        .ok_or(Error::InvalidProofInput("no elements"))?;
    if elements.any(|e| e.group() != &group) {
        return Err(Error::GroupMismatch);
    }
    Ok(group)
}

fn check_plaintext_equality_statement(
    statement: &PlaintextEqualityStatement,
) -> Result<MathGroup, Error> {
    if statement.primary.phis().len() != 1 || statement.secondary.phis().len() != 1 {
        return Err(Error::InvalidProofInput(
            "plaintext equality needs single-element ciphertexts",
        ));
    }
    single_group(
        statement
            .primary
            .phis()
            .iter()
            .chain(statement.secondary.phis())
            .chain(vec![
                statement.primary.gamma(),
                statement.secondary.gamma(),
                statement.primary_key,
                statement.secondary_key,
            ]),
    )
}

/// `phi(x1, x2) = (g^x1, g^x2, h^x1 / h'^x2)` and the image `y = (c0, c0', c1 / c1')`.
fn plaintext_equality_image(
    statement: &PlaintextEqualityStatement,
    x1: &Exponent,
    x2: &Exponent,
) -> Vec<GroupElement> {
    let g = statement.primary.group().generator();
    vec![
        g.exponentiate(x1),
        g.exponentiate(x2),
        statement
            .primary_key
            .exponentiate(x1)
            .multiply(&statement.secondary_key.exponentiate(x2).invert()),
    ]
}

fn plaintext_equality_statement_values(
    statement: &PlaintextEqualityStatement,
) -> Vec<GroupElement> {
    vec![
        statement.primary.gamma().clone(),
        statement.secondary.gamma().clone(),
        statement.primary.phis()[0].multiply(&statement.secondary.phis()[0].invert()),
    ]
}

impl<H: HashService> ZeroKnowledgeProof for SigmaProofService<H> {
    fn gen_exponentiation_proof<R: RngCore + CryptoRng>(
        &self,
        bases: &[GroupElement],
        exponent: &Exponent,
        exponentiated: &[GroupElement],
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<ExponentiationProof, Error> {
        if bases.len() != exponentiated.len() {
            return Err(Error::InvalidProofInput("bases and exponentiated differ in length"));
        }
        let group = single_group(bases.iter().chain(exponentiated))?;

        let b = group.random_exponent(rng);
        let commitment: Vec<GroupElement> =
            bases.iter().map(|base| base.exponentiate(&b)).collect();
        let statement = bases.iter().chain(exponentiated).map(Hashable::from).collect();
        let e = self.challenge(&group, statement, &commitment, auxiliary);
        let z = (b.value() + &e * exponent.value()) % group.q();

        Ok(ExponentiationProof { e, z })
    }

    fn verify_exponentiation_proof(
        &self,
        bases: &[GroupElement],
        exponentiated: &[GroupElement],
        proof: &ExponentiationProof,
        auxiliary: &[String],
    ) -> Result<bool, Error> {
        if bases.len() != exponentiated.len() {
            return Err(Error::InvalidProofInput("bases and exponentiated differ in length"));
        }
        let group = single_group(bases.iter().chain(exponentiated))?;
        let (e, z) = match (group.exponent(proof.e.clone()), group.exponent(proof.z.clone())) {
            (Ok(e), Ok(z)) => (e, z),
            _ => return Ok(false),
        };

        let commitment: Vec<GroupElement> = bases
            .iter()
            .zip(exponentiated)
            .map(|(base, y)| base.exponentiate(&z).multiply(&y.exponentiate(&e).invert()))
            .collect();
        let statement = bases.iter().chain(exponentiated).map(Hashable::from).collect();

        Ok(self.challenge(&group, statement, &commitment, auxiliary) == proof.e)
    }

    fn gen_plaintext_equality_proof<R: RngCore + CryptoRng>(
        &self,
        statement: &PlaintextEqualityStatement,
        randomness: (&Exponent, &Exponent),
        auxiliary: &[String],
        rng: &mut R,
    ) -> Result<PlaintextEqualityProof, Error> {
        let group = check_plaintext_equality_statement(statement)?;
        let (r1, r2) = randomness;

        let b1 = group.random_exponent(rng);
        let b2 = group.random_exponent(rng);
        let commitment = plaintext_equality_image(statement, &b1, &b2);
        let image = plaintext_equality_statement_values(statement);
        let hashed_statement = image.iter().map(Hashable::from).collect();
        let e = self.challenge(&group, hashed_statement, &commitment, auxiliary);

        let z1 = (b1.value() + &e * r1.value()) % group.q();
        let z2 = (b2.value() + &e * r2.value()) % group.q();

        Ok(PlaintextEqualityProof { e, z: vec![z1, z2] })
    }

    fn verify_plaintext_equality_proof(
        &self,
        statement: &PlaintextEqualityStatement,
        proof: &PlaintextEqualityProof,
        auxiliary: &[String],
    ) -> Result<bool, Error> {
        let group = check_plaintext_equality_statement(statement)?;
        if proof.z.len() != 2 {
            return Ok(false);
        }
        let exponents = (
            group.exponent(proof.e.clone()),
            group.exponent(proof.z[0].clone()),
            group.exponent(proof.z[1].clone()),
        );
        let (e, z1, z2) = match exponents {
            (Ok(e), Ok(z1), Ok(z2)) => (e, z1, z2),
            _ => return Ok(false),
        };

        let image = plaintext_equality_statement_values(statement);
        let commitment: Vec<GroupElement> = plaintext_equality_image(statement, &z1, &z2)
            .iter()
            .zip(&image)
            .map(|(phi, y)| phi.multiply(&y.exponentiate(&e).invert()))
            .collect();
        let hashed_statement = image.iter().map(Hashable::from).collect();

        Ok(self.challenge(&group, hashed_statement, &commitment, auxiliary) == proof.e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::large_group;
    use rand::rngs::OsRng;

    fn aux() -> Vec<String> {
        vec!["ee".to_owned(), "vc".to_owned()]
    }

    #[test]
    fn exponentiation_proof_verifies_and_detects_tampering() {
        let group = large_group();
        let proofs = SigmaProofService::default();
        let x = group.random_exponent(&mut OsRng);
        let bases: Vec<GroupElement> = (0..3)
            .map(|_| group.generator().exponentiate(&group.random_exponent(&mut OsRng)))
            .collect();
        let exponentiated: Vec<GroupElement> = bases.iter().map(|b| b.exponentiate(&x)).collect();

        let proof = proofs
            .gen_exponentiation_proof(&bases, &x, &exponentiated, &aux(), &mut OsRng)
            .unwrap();
        assert!(proofs
            .verify_exponentiation_proof(&bases, &exponentiated, &proof, &aux())
            .unwrap());

        for i in 0..exponentiated.len() {
            let mut tampered = exponentiated.clone();
            tampered[i] = tampered[i].multiply(&group.generator());
            assert!(!proofs
                .verify_exponentiation_proof(&bases, &tampered, &proof, &aux())
                .unwrap());
        }

        assert!(!proofs
            .verify_exponentiation_proof(&bases, &exponentiated, &proof, &["other".to_owned()])
            .unwrap());
    }

    #[test]
    fn malformed_exponentiation_statement_is_an_error() {
        let group = large_group();
        let proofs = SigmaProofService::default();
        let x = group.random_exponent(&mut OsRng);
        let g = group.generator();
        assert!(proofs
            .gen_exponentiation_proof(&[g.clone(), g.clone()], &x, &[g.clone()], &[], &mut OsRng)
            .is_err());
        assert!(proofs
            .gen_exponentiation_proof(&[], &x, &[], &[], &mut OsRng)
            .is_err());
    }

    #[test]
    fn plaintext_equality_proof_verifies_and_detects_different_plaintexts() {
        let group = large_group();
        let proofs = SigmaProofService::default();
        let primary_pair = ElGamalKeyPair::generate(&group, 1, &mut OsRng).unwrap();
        let secondary_pair = ElGamalKeyPair::generate(&group, 1, &mut OsRng).unwrap();
        let m = group.generator().exponentiate(&group.random_exponent(&mut OsRng));
        let r1 = group.random_exponent(&mut OsRng);
        let r2 = group.random_exponent(&mut OsRng);

        let primary = encrypt(&primary_pair.public_key, &[m.clone()], &r1).unwrap();
        let secondary = encrypt(&secondary_pair.public_key, &[m.clone()], &r2).unwrap();
        let statement = PlaintextEqualityStatement {
            primary: &primary,
            primary_key: primary_pair.public_key.first_subkey(),
            secondary: &secondary,
            secondary_key: secondary_pair.public_key.first_subkey(),
        };

        let proof = proofs
            .gen_plaintext_equality_proof(&statement, (&r1, &r2), &aux(), &mut OsRng)
            .unwrap();
        assert!(proofs
            .verify(
                &Proof::PlaintextEquality(proof.clone()),
                &ProofStatement::PlaintextEquality(statement.clone()),
                &aux()
            )
            .unwrap());

        let other =
            encrypt(&secondary_pair.public_key, &[m.multiply(&group.generator())], &r2).unwrap();
        let wrong = PlaintextEqualityStatement {
            secondary: &other,
            ..statement
        };
        assert!(!proofs
            .verify_plaintext_equality_proof(&wrong, &proof, &aux())
            .unwrap());
    }

    #[test]
    fn proof_kind_must_match_statement() {
        let group = large_group();
        let proofs = SigmaProofService::default();
        let g = group.generator();
        let bases = vec![g.clone()];
        let proof = Proof::PlaintextEquality(PlaintextEqualityProof {
            e: 1u32.into(),
            z: vec![1u32.into(), 1u32.into()],
        });
        let statement = ProofStatement::Exponentiation {
            bases: &bases,
            exponentiated: &bases,
        };
        assert!(proofs.verify(&proof, &statement, &[]).is_err());
    }

    #[test]
    fn proofs_serialize_with_a_type_tag() {
        let proof = Proof::Exponentiation(ExponentiationProof {
            e: 3u32.into(),
            z: 5u32.into(),
        });
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(json, r#"{"type":"exponentiation","e":"3","z":"5"}"#);
    }
}
