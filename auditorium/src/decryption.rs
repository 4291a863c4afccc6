use crate::*;

use std::collections::HashSet;

/// One trustee's partial decryption of a ciphertext: `G^x` under that
/// trustee's secret exponent, tagged with the share's polynomial index.
///
/// Ephemeral, produced on demand; a quorum of these reconstructs the
/// mapped plaintext without ever reassembling the private key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDecryption {
    pub index: u32,
    value: BigModInt,
}

impl PartialDecryption {
    pub fn value(&self) -> &BigModInt {
        &self.value
    }
}

impl PrivateKeyShare {
    /// Compute this share's partial decryption of `ciphertext`.
    pub fn partial_decrypt(&self, ciphertext: &ExponentialElgamalCiphertext) -> PartialDecryption {
        PartialDecryption {
            index: self.index(),
            value: ciphertext.g().pow(self.secret()),
        }
    }
}

/// Combine a quorum of partial decryptions into the mapped plaintext
/// `f^m`.
///
/// The Lagrange coefficients are a function of exactly which shares
/// responded, so any subset of size >= `threshold` yields the same
/// result. Fewer partials than the threshold fails fast with
/// `InsufficientShares`; a duplicated share index is rejected rather
/// than silently skewing the interpolation.
pub fn combine_partials(
    partials: &[PartialDecryption],
    ciphertext: &ExponentialElgamalCiphertext,
    threshold: usize,
    key: &ElectionPublicKey,
) -> Result<BigModInt, Error> {
    if partials.len() < threshold {
        return Err(Error::InsufficientShares {
            needed: threshold,
            got: partials.len(),
        });
    }

    let mut seen = HashSet::new();
    for partial in partials {
        if !seen.insert(partial.index) {
            return Err(Error::DuplicateShare(partial.index));
        }
    }

    let indices: Vec<u32> = partials.iter().map(|p| p.index).collect();
    let mut total = BigModInt::one(key.p());
    for partial in partials {
        let lambda = lagrange_coefficient(partial.index, &indices, key)?;
        total = total.mul(&partial.value.pow(&lambda))?;
    }

    // total = h^r, H = h^r * f^m, so H / total = f^m.
    ciphertext.h().div(&total)
}

/// The Lagrange basis polynomial for `index`, evaluated at zero over
/// `Z_q`, relative to the participating indices.
fn lagrange_coefficient(
    index: u32,
    indices: &[u32],
    key: &ElectionPublicKey,
) -> Result<BigModInt, Error> {
    let q = key.q();
    let x_i = BigModInt::from_u64(index as u64, q);

    let mut numerator = BigModInt::one(q);
    let mut denominator = BigModInt::one(q);
    for other in indices {
        if *other == index {
            continue;
        }
        let x_j = BigModInt::from_u64(*other as u64, q);
        numerator = numerator.mul(&x_j)?;
        denominator = denominator.mul(&x_j.sub(&x_i)?)?;
    }

    numerator.div(&denominator)
}

/// Recover the integer tally from a mapped plaintext by bounded search:
/// the first `j` in `0..=max_count` with `f^j == mapped` is the tally.
///
/// A combined ciphertext encodes at most `size` affirmative votes, so
/// callers bound the search with it. Exhausting the range means the
/// ciphertext is forged or corrupted; that is a hard integrity failure,
/// not a retryable condition.
pub fn recover_tally(
    mapped: &BigModInt,
    max_count: u64,
    key: &ElectionPublicKey,
) -> Result<u64, Error> {
    let mut candidate = BigModInt::one(key.p());
    for j in 0..=max_count {
        if candidate == *mapped {
            return Ok(j);
        }
        candidate = candidate.mul(key.f())?;
    }
    Err(Error::SearchSpaceExhausted(max_count))
}

/// Decrypt a ciphertext with an explicit subset of shares.
pub fn decrypt_with_shares(
    ciphertext: &ExponentialElgamalCiphertext,
    shares: &[PrivateKeyShare],
    threshold: usize,
    key: &ElectionPublicKey,
) -> Result<u64, Error> {
    let partials: Vec<PartialDecryption> = shares
        .iter()
        .map(|share| share.partial_decrypt(ciphertext))
        .collect();
    let mapped = combine_partials(&partials, ciphertext, threshold, key)?;
    recover_tally(&mapped, ciphertext.size() as u64, key)
}
