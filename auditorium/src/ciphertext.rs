use crate::*;

use rand::{CryptoRng, Rng};

/// The capability set every homomorphic ciphertext variant provides:
/// combining under the variant's arity-2 operation, checking the attached
/// membership proof, and reporting how many plaintexts it accumulates.
pub trait HomomorphicCiphertext: Sized {
    fn combine(&self, other: &Self, key: &ElectionPublicKey) -> Result<Self, Error>;
    fn verify(&self, min: u64, max: u64, key: &ElectionPublicKey) -> bool;
    fn size(&self) -> usize;
}

/// An exponential-ElGamal ciphertext: `(G, H) = (g^r, h^r * f^m)`.
///
/// `size` counts the plaintexts homomorphically combined into it. A fresh
/// encryption carries a membership proof restricting the plaintext to the
/// allowed set; combined ciphertexts carry none, since only primitive
/// ciphertexts are independently verifiable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialElgamalCiphertext {
    g: BigModInt,
    h: BigModInt,
    size: usize,
    proof: Option<MembershipProof>,
}

impl ExponentialElgamalCiphertext {
    /// The multiplicative identity `(1, 1)` with `size = 0`.
    ///
    /// Only ever used as the seed of a running combination; it carries no
    /// proof and is not a terminal operand.
    pub fn identity(key: &ElectionPublicKey) -> Self {
        ExponentialElgamalCiphertext {
            g: BigModInt::one(key.p()),
            h: BigModInt::one(key.p()),
            size: 0,
            proof: None,
        }
    }

    pub fn g(&self) -> &BigModInt {
        &self.g
    }

    pub fn h(&self) -> &BigModInt {
        &self.h
    }

    pub fn has_proof(&self) -> bool {
        self.proof.is_some()
    }
}

impl HomomorphicCiphertext for ExponentialElgamalCiphertext {
    /// Component-wise multiplication, which is addition-in-the-exponent of
    /// the plaintexts. The result carries no proof.
    fn combine(&self, other: &Self, _key: &ElectionPublicKey) -> Result<Self, Error> {
        Ok(ExponentialElgamalCiphertext {
            g: self.g.mul(&other.g)?,
            h: self.h.mul(&other.h)?,
            size: self.size + other.size,
            proof: None,
        })
    }

    /// Check the attached membership proof against this exact `(G, H)`.
    ///
    /// A ciphertext without a proof never verifies; the identity seed is
    /// the only legitimate proofless ciphertext and it is not meant to be
    /// verified on its own.
    fn verify(&self, min: u64, max: u64, key: &ElectionPublicKey) -> bool {
        match &self.proof {
            Some(proof) => proof.verify(&self.g, &self.h, min, max, key),
            None => false,
        }
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl ElectionPublicKey {
    /// Encrypt `plaintext`, drawing fresh randomness and attaching a
    /// membership proof over `domain`.
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        plaintext: u64,
        domain: &[u64],
        rng: &mut R,
    ) -> Result<ExponentialElgamalCiphertext, Error> {
        if !domain.contains(&plaintext) {
            return Err(Error::InvalidPlaintext(plaintext));
        }

        let r = BigModInt::random(self.q(), rng);
        let big_g = self.g().pow(&r);
        let big_h = self
            .h()
            .pow(&r)
            .mul(&self.f().pow(&BigModInt::from_u64(plaintext, self.q())))?;

        let proof = MembershipProof::commit(&big_g, &big_h, &r, plaintext, domain, self, rng)?;

        Ok(ExponentialElgamalCiphertext {
            g: big_g,
            h: big_h,
            size: 1,
            proof: Some(proof),
        })
    }
}

/// The closed set of supported cryptosystem variants.
///
/// Construction goes through explicit per-variant factories keyed on this
/// enum; there is no runtime type lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptosystemKind {
    ExponentialElgamal,
}

impl CryptosystemKind {
    /// The identity-element factory for this variant.
    pub fn identity(&self, key: &ElectionPublicKey) -> ExponentialElgamalCiphertext {
        match self {
            CryptosystemKind::ExponentialElgamal => ExponentialElgamalCiphertext::identity(key),
        }
    }
}

/// Ballot-crypto configuration for one host: the cryptosystem variant and
/// the key material it operates with.
///
/// Constructed once at process start and passed to every ballot-crypto
/// call; there is no process-wide mutable crypto state.
#[derive(Debug, Clone)]
pub struct BallotContext {
    kind: CryptosystemKind,
    keys: KeyMaterial,
}

impl BallotContext {
    pub fn new(kind: CryptosystemKind, keys: KeyMaterial) -> Self {
        BallotContext { kind, keys }
    }

    pub fn kind(&self) -> CryptosystemKind {
        self.kind
    }

    pub fn public_key(&self) -> Result<&ElectionPublicKey, Error> {
        self.keys.public()
    }

    pub fn shares(&self) -> Result<&[PrivateKeyShare], Error> {
        self.keys.shares()
    }

    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        plaintext: u64,
        domain: &[u64],
        rng: &mut R,
    ) -> Result<ExponentialElgamalCiphertext, Error> {
        self.keys.public()?.encrypt(plaintext, domain, rng)
    }

    pub fn identity(&self) -> Result<ExponentialElgamalCiphertext, Error> {
        Ok(self.kind.identity(self.keys.public()?))
    }

    /// Partially decrypt with every locally held share.
    pub fn partial_decryptions(
        &self,
        ciphertext: &ExponentialElgamalCiphertext,
    ) -> Result<Vec<PartialDecryption>, Error> {
        Ok(self
            .keys
            .shares()?
            .iter()
            .map(|share| share.partial_decrypt(ciphertext))
            .collect())
    }

    /// Decrypt a ciphertext outright using the locally held shares.
    ///
    /// Fails fast with `InsufficientShares` when fewer than `threshold`
    /// shares are loaded.
    pub fn decrypt(
        &self,
        ciphertext: &ExponentialElgamalCiphertext,
        threshold: usize,
    ) -> Result<u64, Error> {
        let partials = self.partial_decryptions(ciphertext)?;
        let key = self.keys.public()?;
        let mapped = combine_partials(&partials, ciphertext, threshold, key)?;
        recover_tally(&mapped, ciphertext.size() as u64, key)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{test_context, test_rng};

    #[test]
    fn encrypt_then_verify() {
        let ctx = test_context(2, 3, 1);
        let mut rng = test_rng(21);

        for m in 0..=1 {
            let c = ctx.encrypt(m, &[0, 1], &mut rng).unwrap();
            assert!(c.verify(0, 1, ctx.public_key().unwrap()));
            assert_eq!(c.size(), 1);
        }
    }

    #[test]
    fn plaintext_outside_allowed_set_rejected() {
        let ctx = test_context(2, 3, 2);
        let mut rng = test_rng(22);

        assert!(matches!(
            ctx.encrypt(2, &[0, 1], &mut rng),
            Err(Error::InvalidPlaintext(2))
        ));
    }

    #[test]
    fn proof_binds_to_ciphertext() {
        let ctx = test_context(2, 3, 3);
        let key = ctx.public_key().unwrap();
        let mut rng = test_rng(23);

        let c = ctx.encrypt(1, &[0, 1], &mut rng).unwrap();
        // Graft the proof onto a different ciphertext; it must not verify.
        let other = ctx.encrypt(1, &[0, 1], &mut rng).unwrap();
        let forged = ExponentialElgamalCiphertext {
            g: other.g().clone(),
            h: other.h().clone(),
            size: 1,
            proof: c.proof.clone(),
        };
        assert!(!forged.verify(0, 1, key));
    }

    #[test]
    fn empty_plaintext_range_never_verifies() {
        let ctx = test_context(2, 3, 6);
        let key = ctx.public_key().unwrap();
        let mut rng = test_rng(26);

        let c = ctx.encrypt(1, &[0, 1], &mut rng).unwrap();
        assert!(!c.verify(1, 0, key));
    }

    #[test]
    fn combined_ciphertext_carries_no_proof() {
        let ctx = test_context(2, 3, 4);
        let key = ctx.public_key().unwrap();
        let mut rng = test_rng(24);

        let c1 = ctx.encrypt(1, &[0, 1], &mut rng).unwrap();
        let c2 = ctx.encrypt(0, &[0, 1], &mut rng).unwrap();
        let c3 = c1.combine(&c2, key).unwrap();

        assert_eq!(c3.size(), 2);
        assert!(!c3.has_proof());
        assert!(!c3.verify(0, 1, key));
    }

    #[test]
    fn combining_with_identity_is_a_no_op() {
        let ctx = test_context(2, 3, 5);
        let key = ctx.public_key().unwrap();
        let mut rng = test_rng(25);

        let c = ctx.encrypt(1, &[0, 1], &mut rng).unwrap();
        let seeded = ctx.identity().unwrap().combine(&c, key).unwrap();

        assert_eq!(seeded.g(), c.g());
        assert_eq!(seeded.h(), c.h());
        assert_eq!(seeded.size(), 1);
    }
}
