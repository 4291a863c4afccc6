use crate::*;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{Num, One, Zero};
use rand::{CryptoRng, Rng};
use std::convert::TryFrom;
use std::fmt;

/// An arbitrary-precision integer reduced into a fixed modulus.
///
/// Every key and ciphertext operation bottoms out here. The invariant
/// `0 <= value < modulus` holds from construction on; arithmetic
/// auto-reduces and values are immutable once built. Combining two
/// values that live under different moduli is a `ModulusMismatch`
/// error rather than a silent wrong answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "BigModIntRepr", try_from = "BigModIntRepr")]
pub struct BigModInt {
    value: BigUint,
    modulus: BigUint,
}

impl BigModInt {
    pub fn new(value: BigUint, modulus: BigUint) -> Self {
        let value = value % &modulus;
        BigModInt { value, modulus }
    }

    pub fn from_u64(value: u64, modulus: &BigUint) -> Self {
        BigModInt::new(BigUint::from(value), modulus.clone())
    }

    pub fn zero(modulus: &BigUint) -> Self {
        BigModInt::new(BigUint::zero(), modulus.clone())
    }

    pub fn one(modulus: &BigUint) -> Self {
        BigModInt::new(BigUint::one(), modulus.clone())
    }

    /// Parse a decimal or hex string under an explicit modulus.
    pub fn from_str_radix(s: &str, radix: u32, modulus: &BigUint) -> Result<Self, Error> {
        let value = BigUint::from_str_radix(s.trim(), radix)
            .map_err(|_| Error::ParseError(s.to_string()))?;
        Ok(BigModInt::new(value, modulus.clone()))
    }

    /// Draw a uniform value below the modulus.
    pub fn random<R: Rng + CryptoRng>(modulus: &BigUint, rng: &mut R) -> Self {
        let value = rng.gen_biguint_below(modulus);
        BigModInt {
            value,
            modulus: modulus.clone(),
        }
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn is_one(&self) -> bool {
        self.value.is_one()
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Big-endian bytes of the reduced value, for hashing.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.value.to_bytes_be()
    }

    fn check_modulus(&self, other: &Self) -> Result<(), Error> {
        if self.modulus != other.modulus {
            return Err(Error::ModulusMismatch);
        }
        Ok(())
    }

    fn with_value(&self, value: BigUint) -> Self {
        BigModInt {
            value: value % &self.modulus,
            modulus: self.modulus.clone(),
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self, Error> {
        self.check_modulus(other)?;
        Ok(self.with_value(&self.value + &other.value))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, Error> {
        self.check_modulus(other)?;
        Ok(self.with_value(&self.value + &self.modulus - &other.value))
    }

    pub fn mul(&self, other: &Self) -> Result<Self, Error> {
        self.check_modulus(other)?;
        Ok(self.with_value(&self.value * &other.value))
    }

    /// Multiply by the inverse of `other`.
    pub fn div(&self, other: &Self) -> Result<Self, Error> {
        self.check_modulus(other)?;
        self.mul(&other.inverse()?)
    }

    pub fn neg(&self) -> Self {
        self.with_value(&self.modulus - &self.value)
    }

    /// Modular exponentiation by square-and-multiply.
    ///
    /// The exponent may live under a different modulus; group elements
    /// are reduced mod `p` while exponents are reduced mod `q`.
    pub fn pow(&self, exponent: &Self) -> Self {
        let value = self.value.modpow(&exponent.value, &self.modulus);
        BigModInt {
            value,
            modulus: self.modulus.clone(),
        }
    }

    /// Modular inverse by the extended Euclidean algorithm.
    pub fn inverse(&self) -> Result<Self, Error> {
        let a = BigInt::from(self.value.clone());
        let m = BigInt::from(self.modulus.clone());
        let e = a.extended_gcd(&m);
        if !e.gcd.is_one() {
            return Err(Error::NotInvertible);
        }
        let x = e.x.mod_floor(&m);
        let value = x.to_biguint().ok_or(Error::NotInvertible)?;
        Ok(BigModInt {
            value,
            modulus: self.modulus.clone(),
        })
    }
}

impl fmt::Display for BigModInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value.to_str_radix(10))
    }
}

#[derive(Serialize, Deserialize)]
struct BigModIntRepr {
    value: String,
    modulus: String,
}

impl From<BigModInt> for BigModIntRepr {
    fn from(item: BigModInt) -> Self {
        BigModIntRepr {
            value: item.value.to_str_radix(10),
            modulus: item.modulus.to_str_radix(10),
        }
    }
}

impl TryFrom<BigModIntRepr> for BigModInt {
    type Error = Error;

    fn try_from(repr: BigModIntRepr) -> Result<Self, Error> {
        let modulus = BigUint::from_str_radix(&repr.modulus, 10)
            .map_err(|_| Error::ParseError(repr.modulus.clone()))?;
        let value = BigUint::from_str_radix(&repr.value, 10)
            .map_err(|_| Error::ParseError(repr.value.clone()))?;
        Ok(BigModInt::new(value, modulus))
    }
}

/// Serde helper serializing a bare `BigUint` as a decimal string.
pub mod decimal {
    use num_bigint::BigUint;
    use num_traits::Num;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::from_str_radix(&s, 10).map_err(de::Error::custom)
    }
}
