use crate::*;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use rand::{CryptoRng, Rng};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The election public key: prime `p`, sub-prime order `q = (p-1)/2`,
/// generator `g`, message base `f`, and the aggregate public value `h`.
///
/// Produced once during election setup by the trustee ceremony and shared
/// by reference across every ciphertext and proof operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionPublicKey {
    #[serde(with = "decimal")]
    p: BigUint,
    #[serde(with = "decimal")]
    q: BigUint,
    g: BigModInt,
    f: BigModInt,
    h: BigModInt,
}

impl ElectionPublicKey {
    pub fn new(p: BigUint, g: BigUint, f: BigUint, h: BigUint) -> Self {
        let q = (&p - BigUint::one()) / BigUint::from(2u8);
        ElectionPublicKey {
            g: BigModInt::new(g, p.clone()),
            f: BigModInt::new(f, p.clone()),
            h: BigModInt::new(h, p.clone()),
            p,
            q,
        }
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn g(&self) -> &BigModInt {
        &self.g
    }

    pub fn f(&self) -> &BigModInt {
        &self.f
    }

    pub fn h(&self) -> &BigModInt {
        &self.h
    }
}

impl FromStr for ElectionPublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut rest = s.trim();
        let p = take_field(&mut rest, 'p', "p")?;
        let g = take_field(&mut rest, 'g', "g")?;
        let h = take_field(&mut rest, 'h', "h")?;
        let f = take_field(&mut rest, 'f', "f")?;
        if !rest.is_empty() {
            return Err(Error::InvalidKeyFormat("end of input"));
        }
        Ok(ElectionPublicKey::new(p, g, f, h))
    }
}

impl fmt::Display for ElectionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "p{}g{}h{}f{}", self.p, self.g, self.h, self.f)
    }
}

/// One trustee's fragment of the split private key.
///
/// Owns the secret exponent `x` tied to the shared `p, g, f`. Never leaves
/// the host that loaded it; its only use is local partial decryption.
/// `index` is the share's evaluation point in the sharing polynomial's
/// domain (1-based), which the Lagrange combination needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateKeyShare {
    #[serde(with = "decimal")]
    p: BigUint,
    #[serde(with = "decimal")]
    q: BigUint,
    g: BigModInt,
    f: BigModInt,
    x: BigModInt,
    index: u32,
}

impl PrivateKeyShare {
    pub fn new(p: BigUint, g: BigUint, x: BigUint, f: BigUint, index: u32) -> Self {
        let q = (&p - BigUint::one()) / BigUint::from(2u8);
        PrivateKeyShare {
            g: BigModInt::new(g, p.clone()),
            f: BigModInt::new(f, p.clone()),
            x: BigModInt::new(x, q.clone()),
            p,
            q,
            index,
        }
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn secret(&self) -> &BigModInt {
        &self.x
    }
}

impl FromStr for PrivateKeyShare {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut rest = s.trim();
        let p = take_field(&mut rest, 'p', "p")?;
        let g = take_field(&mut rest, 'g', "g")?;
        let x = take_field(&mut rest, 'x', "x")?;
        let f = take_field(&mut rest, 'f', "f")?;
        let index = take_field(&mut rest, 'i', "i")?;
        if !rest.is_empty() {
            return Err(Error::InvalidKeyFormat("end of input"));
        }
        // Index 0 is the polynomial's secret point, never a share.
        let index = index
            .to_u32()
            .filter(|i| *i > 0)
            .ok_or(Error::InvalidKeyFormat("i"))?;
        Ok(PrivateKeyShare::new(p, g, x, f, index))
    }
}

impl fmt::Display for PrivateKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "p{}g{}x{}f{}i{}",
            self.p, self.g, self.x, self.f, self.index
        )
    }
}

fn take_field(rest: &mut &str, marker: char, name: &'static str) -> Result<BigUint, Error> {
    let mut chars = rest.chars();
    if chars.next() != Some(marker) {
        return Err(Error::InvalidKeyFormat(name));
    }
    let digits_end = chars
        .as_str()
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(chars.as_str().len());
    if digits_end == 0 {
        return Err(Error::InvalidKeyFormat(name));
    }
    let digits = &chars.as_str()[..digits_end];
    let value = BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or(Error::InvalidKeyFormat(name))?;
    *rest = &chars.as_str()[digits_end..];
    Ok(value)
}

/// Threshold key material held by one host.
///
/// The not-yet-loaded states are explicit: operations that need the public
/// key or the local shares check for them and fail with `KeyNotLoaded`
/// instead of assuming a prior load succeeded.
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    public: Option<ElectionPublicKey>,
    shares: Vec<PrivateKeyShare>,
}

impl KeyMaterial {
    pub fn new() -> Self {
        KeyMaterial::default()
    }

    /// Load serialized key material: the public key first and exactly once,
    /// followed by any number of private key shares.
    ///
    /// Any other ordering or count is a load-time error. Each share carries
    /// its own polynomial index, so any subset loads in any order. Fewer
    /// shares than the decryption threshold is the one supported
    /// partial-load scenario; it only surfaces later, as
    /// `InsufficientShares` at decryption time.
    pub fn load<S: AsRef<str>>(entries: &[S]) -> Result<Self, Error> {
        let mut entries = entries.iter();
        let first = entries
            .next()
            .ok_or(Error::BadKeyCount("no key material supplied"))?;

        if PrivateKeyShare::from_str(first.as_ref()).is_ok() {
            return Err(Error::BadKeyCount("public key did not come first"));
        }
        let public = ElectionPublicKey::from_str(first.as_ref())?;

        let mut shares: Vec<PrivateKeyShare> = Vec::new();
        for entry in entries {
            if ElectionPublicKey::from_str(entry.as_ref()).is_ok() {
                return Err(Error::BadKeyCount("more than one public key supplied"));
            }
            let share = PrivateKeyShare::from_str(entry.as_ref())?;
            if shares.iter().any(|s| s.index() == share.index()) {
                return Err(Error::DuplicateShare(share.index()));
            }
            shares.push(share);
        }

        Ok(KeyMaterial {
            public: Some(public),
            shares,
        })
    }

    /// Load key material from files in the fixed serialized key encoding.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            entries.push(std::fs::read_to_string(path)?);
        }
        KeyMaterial::load(&entries)
    }

    pub fn set_public(&mut self, public: ElectionPublicKey) {
        self.public = Some(public);
    }

    pub fn add_share(&mut self, share: PrivateKeyShare) {
        self.shares.push(share);
    }

    pub fn public(&self) -> Result<&ElectionPublicKey, Error> {
        self.public
            .as_ref()
            .ok_or(Error::KeyNotLoaded("public key"))
    }

    pub fn shares(&self) -> Result<&[PrivateKeyShare], Error> {
        if self.shares.is_empty() {
            return Err(Error::KeyNotLoaded("private key shares"));
        }
        Ok(&self.shares)
    }
}

/// Deal a fresh threshold key: a Shamir polynomial of degree
/// `threshold - 1` over `Z_q` with secret `x = a_0`, aggregate public
/// value `h = g^x`, and share `i` as the polynomial evaluated at `i`.
///
/// The trustee ceremony proper runs out of band; this dealer backs
/// election setup tooling and tests.
pub fn deal_key_shares<R: Rng + CryptoRng>(
    threshold: usize,
    num_shares: usize,
    p: &BigUint,
    g: &BigUint,
    f: &BigUint,
    rng: &mut R,
) -> Result<(ElectionPublicKey, Vec<PrivateKeyShare>), Error> {
    if threshold == 0 || threshold > num_shares {
        return Err(Error::BadKeyCount("threshold must be in 1..=num_shares"));
    }

    let q = (p - BigUint::one()) / BigUint::from(2u8);
    let coefficients: Vec<BigModInt> = (0..threshold)
        .map(|_| BigModInt::random(&q, rng))
        .collect();

    let generator = BigModInt::new(g.clone(), p.clone());
    let h = generator.pow(&coefficients[0]);
    let public = ElectionPublicKey::new(p.clone(), g.clone(), f.clone(), h.value().clone());

    let mut shares = Vec::with_capacity(num_shares);
    for i in 1..=num_shares {
        let point = BigModInt::from_u64(i as u64, &q);
        // Horner evaluation over Z_q.
        let mut x = coefficients[threshold - 1].clone();
        for coefficient in coefficients[..threshold - 1].iter().rev() {
            x = x.mul(&point)?.add(coefficient)?;
        }
        shares.push(PrivateKeyShare::new(
            p.clone(),
            g.clone(),
            x.value().clone(),
            f.clone(),
            i as u32,
        ));
    }

    Ok((public, shares))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{test_prime, test_rng};

    #[test]
    fn share_round_trip() {
        let share = PrivateKeyShare::new(
            BigUint::from(23u64),
            BigUint::from(4u64),
            BigUint::from(7u64),
            BigUint::from(9u64),
            3,
        );
        let encoded = share.to_string();
        assert_eq!(encoded, "p23g4x7f9i3");

        let decoded = PrivateKeyShare::from_str(&encoded).unwrap();
        assert_eq!(share, decoded);
        assert_eq!(decoded.index(), 3);
    }

    #[test]
    fn malformed_share_names_missing_token() {
        assert!(matches!(
            PrivateKeyShare::from_str("g4x7f9i1"),
            Err(Error::InvalidKeyFormat("p"))
        ));
        assert!(matches!(
            PrivateKeyShare::from_str("p23g4f9i1"),
            Err(Error::InvalidKeyFormat("x"))
        ));
        assert!(matches!(
            PrivateKeyShare::from_str("p23g4x7f9"),
            Err(Error::InvalidKeyFormat("i"))
        ));
        assert!(matches!(
            PrivateKeyShare::from_str("p23g4x7f9i0"),
            Err(Error::InvalidKeyFormat("i"))
        ));
        assert!(matches!(
            PrivateKeyShare::from_str("p23g4x7f9i1junk"),
            Err(Error::InvalidKeyFormat("end of input"))
        ));
    }

    #[test]
    fn public_key_round_trip() {
        let key = ElectionPublicKey::new(
            BigUint::from(23u64),
            BigUint::from(4u64),
            BigUint::from(9u64),
            BigUint::from(13u64),
        );
        let decoded = ElectionPublicKey::from_str(&key.to_string()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn load_requires_public_key_first_and_once() {
        let mut rng = test_rng(7);
        let (public, shares) = deal_key_shares(
            2,
            3,
            &test_prime(),
            &BigUint::from(4u64),
            &BigUint::from(9u64),
            &mut rng,
        )
        .unwrap();

        let pub_str = public.to_string();
        let share_strs: Vec<String> = shares.iter().map(|s| s.to_string()).collect();

        let loaded = KeyMaterial::load(&[
            pub_str.clone(),
            share_strs[0].clone(),
            share_strs[2].clone(),
        ])
        .unwrap();
        assert_eq!(loaded.public().unwrap(), &public);
        assert_eq!(loaded.shares().unwrap().len(), 2);
        // Indices come from the serialized shares, not arrival order.
        assert_eq!(loaded.shares().unwrap()[1].index(), 3);

        assert!(matches!(
            KeyMaterial::load(&[share_strs[0].clone(), pub_str.clone()]),
            Err(Error::BadKeyCount(_))
        ));
        assert!(matches!(
            KeyMaterial::load(&[pub_str.clone(), pub_str.clone()]),
            Err(Error::BadKeyCount(_))
        ));
        assert!(matches!(
            KeyMaterial::load(&[pub_str.clone(), share_strs[1].clone(), share_strs[1].clone()]),
            Err(Error::DuplicateShare(2))
        ));
        assert!(matches!(
            KeyMaterial::load::<String>(&[]),
            Err(Error::BadKeyCount(_))
        ));
    }

    #[test]
    fn loaded_share_subset_decrypts() {
        let mut rng = test_rng(9);
        let (public, shares) = deal_key_shares(
            2,
            3,
            &test_prime(),
            &BigUint::from(4u64),
            &BigUint::from(9u64),
            &mut rng,
        )
        .unwrap();

        // Only shares 1 and 3 survive; the loaded subset must still
        // interpolate at the right polynomial points.
        let loaded = KeyMaterial::load(&[
            public.to_string(),
            shares[0].to_string(),
            shares[2].to_string(),
        ])
        .unwrap();

        let c = loaded
            .public()
            .unwrap()
            .encrypt(1, &[0, 1], &mut rng)
            .unwrap();
        let tally = decrypt_with_shares(&c, loaded.shares().unwrap(), 2, loaded.public().unwrap())
            .unwrap();
        assert_eq!(tally, 1);
    }

    #[test]
    fn unloaded_material_is_an_explicit_state() {
        let empty = KeyMaterial::new();
        assert!(matches!(empty.public(), Err(Error::KeyNotLoaded(_))));
        assert!(matches!(empty.shares(), Err(Error::KeyNotLoaded(_))));
    }

    #[test]
    fn dealer_rejects_bad_threshold() {
        let mut rng = test_rng(8);
        assert!(matches!(
            deal_key_shares(
                4,
                3,
                &test_prime(),
                &BigUint::from(4u64),
                &BigUint::from(9u64),
                &mut rng,
            ),
            Err(Error::BadKeyCount(_))
        ));
    }
}
