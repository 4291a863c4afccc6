use crate::*;

use digest::Digest;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use sha2::Sha256;

/// Non-interactive zero-knowledge proof that an exponential-ElGamal
/// ciphertext encrypts a value from a small allowed set, without
/// revealing which one.
///
/// A disjunctive Chaum-Pedersen proof: one real branch per allowed value
/// plus simulated branches, tied together by a SHA-256 challenge over the
/// ciphertext components and all commitments. The challenge binds the
/// proof to the exact `(G, H)` pair, so it cannot be replayed against a
/// different ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipProof {
    commitments_g: Vec<BigModInt>,
    commitments_h: Vec<BigModInt>,
    challenges: Vec<BigModInt>,
    responses: Vec<BigModInt>,
}

impl MembershipProof {
    /// Commit to `plaintext` being one of `domain`, for the ciphertext
    /// `(big_g, big_h)` built with randomness `r`.
    pub fn commit<R: Rng + CryptoRng>(
        big_g: &BigModInt,
        big_h: &BigModInt,
        r: &BigModInt,
        plaintext: u64,
        domain: &[u64],
        key: &ElectionPublicKey,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let real = domain
            .iter()
            .position(|v| *v == plaintext)
            .ok_or(Error::InvalidPlaintext(plaintext))?;

        let q = key.q();
        let mut commitments_g = Vec::with_capacity(domain.len());
        let mut commitments_h = Vec::with_capacity(domain.len());
        let mut challenges = Vec::with_capacity(domain.len());
        let mut responses = Vec::with_capacity(domain.len());

        let mut nonce = BigModInt::zero(q);
        for (i, value) in domain.iter().enumerate() {
            if i == real {
                // Real branch: honest commitment, challenge filled in below.
                nonce = BigModInt::random(q, rng);
                commitments_g.push(key.g().pow(&nonce));
                commitments_h.push(key.h().pow(&nonce));
                challenges.push(BigModInt::zero(q));
                responses.push(BigModInt::zero(q));
            } else {
                // Simulated branch: pick challenge and response, derive
                // commitments that make the verification equations hold.
                let c = BigModInt::random(q, rng);
                let s = BigModInt::random(q, rng);
                let h_over_f = big_h.div(&key.f().pow(&BigModInt::from_u64(*value, q)))?;
                commitments_g.push(key.g().pow(&s).div(&big_g.pow(&c))?);
                commitments_h.push(key.h().pow(&s).div(&h_over_f.pow(&c))?);
                challenges.push(c);
                responses.push(s);
            }
        }

        let total = challenge_hash(big_g, big_h, &commitments_g, &commitments_h, q);
        let mut simulated = BigModInt::zero(q);
        for (i, c) in challenges.iter().enumerate() {
            if i != real {
                simulated = simulated.add(c)?;
            }
        }
        let c_real = total.sub(&simulated)?;
        responses[real] = nonce.add(&c_real.mul(r)?)?;
        challenges[real] = c_real;

        Ok(MembershipProof {
            commitments_g,
            commitments_h,
            challenges,
            responses,
        })
    }

    /// Check the proof against the ciphertext `(big_g, big_h)` and the
    /// inclusive plaintext range `min..=max`.
    ///
    /// Returns `false` (never an error) on any structural defect: wrong
    /// branch count, foreign moduli, or failed verification equations.
    pub fn verify(
        &self,
        big_g: &BigModInt,
        big_h: &BigModInt,
        min: u64,
        max: u64,
        key: &ElectionPublicKey,
    ) -> bool {
        self.verify_inner(big_g, big_h, min, max, key)
            .unwrap_or(false)
    }

    fn verify_inner(
        &self,
        big_g: &BigModInt,
        big_h: &BigModInt,
        min: u64,
        max: u64,
        key: &ElectionPublicKey,
    ) -> Result<bool, Error> {
        if max < min {
            return Ok(false);
        }

        let q = key.q();
        let branches = (max - min + 1) as usize;
        if self.commitments_g.len() != branches
            || self.commitments_h.len() != branches
            || self.challenges.len() != branches
            || self.responses.len() != branches
        {
            return Ok(false);
        }

        let total = challenge_hash(big_g, big_h, &self.commitments_g, &self.commitments_h, q);
        let mut sum = BigModInt::zero(q);
        for c in &self.challenges {
            sum = sum.add(c)?;
        }
        if sum != total {
            return Ok(false);
        }

        for (i, value) in (min..=max).enumerate() {
            let c = &self.challenges[i];
            let s = &self.responses[i];

            if key.g().pow(s) != self.commitments_g[i].mul(&big_g.pow(c))? {
                return Ok(false);
            }
            let h_over_f = big_h.div(&key.f().pow(&BigModInt::from_u64(value, q)))?;
            if key.h().pow(s) != self.commitments_h[i].mul(&h_over_f.pow(c))? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Fiat-Shamir challenge: SHA-256 over the length-prefixed big-endian
/// bytes of the ciphertext pair and every commitment, reduced mod `q`.
fn challenge_hash(
    big_g: &BigModInt,
    big_h: &BigModInt,
    commitments_g: &[BigModInt],
    commitments_h: &[BigModInt],
    q: &BigUint,
) -> BigModInt {
    let mut hasher = Sha256::new();
    let mut absorb = |value: &BigModInt| {
        let bytes = value.to_bytes_be();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(&bytes);
    };

    absorb(big_g);
    absorb(big_h);
    for commitment in commitments_g {
        absorb(commitment);
    }
    for commitment in commitments_h {
        absorb(commitment);
    }

    let digest = hasher.finalize();
    BigModInt::new(BigUint::from_bytes_be(&digest), q.clone())
}
