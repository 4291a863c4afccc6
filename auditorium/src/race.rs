use crate::*;

use indexmap::IndexMap;
use rand::{CryptoRng, Rng};

/// The plaintext selection made for one race: candidate id to 0 or 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaintextRaceSelection {
    pub title: String,
    pub selections: IndexMap<String, u64>,
}

impl PlaintextRaceSelection {
    pub fn new(title: impl Into<String>, selections: IndexMap<String, u64>) -> Self {
        PlaintextRaceSelection {
            title: title.into(),
            selections,
        }
    }
}

/// The encrypted counterpart: one exponential-ElGamal ciphertext per
/// candidate, each proving its plaintext lies in `{0, 1}`.
///
/// Race selections combine candidate-wise, which is how per-candidate
/// ballot totals accumulate without any intermediate decryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRaceSelection {
    pub title: String,
    selections: IndexMap<String, ExponentialElgamalCiphertext>,
}

impl EncryptedRaceSelection {
    pub fn encrypt<R: Rng + CryptoRng>(
        race: &PlaintextRaceSelection,
        context: &BallotContext,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let mut selections = IndexMap::with_capacity(race.selections.len());
        for (candidate, value) in &race.selections {
            let ciphertext = context.encrypt(*value, &[0, 1], rng)?;
            selections.insert(candidate.clone(), ciphertext);
        }
        Ok(EncryptedRaceSelection {
            title: race.title.clone(),
            selections,
        })
    }

    /// Check every per-candidate membership proof.
    pub fn verify(&self, context: &BallotContext) -> bool {
        let key = match context.public_key() {
            Ok(key) => key,
            Err(_) => return false,
        };
        self.selections
            .values()
            .all(|ciphertext| ciphertext.verify(0, 1, key))
    }

    /// Candidate-wise homomorphic combination of two race selections.
    ///
    /// Both operands must cover exactly the same candidates.
    pub fn combine(&self, other: &Self, context: &BallotContext) -> Result<Self, Error> {
        if self.title != other.title || self.selections.len() != other.selections.len() {
            return Err(Error::RaceMismatch);
        }

        let key = context.public_key()?;
        let mut selections = IndexMap::with_capacity(self.selections.len());
        for (candidate, ciphertext) in &self.selections {
            let theirs = other
                .selections
                .get(candidate)
                .ok_or(Error::RaceMismatch)?;
            selections.insert(candidate.clone(), ciphertext.combine(theirs, key)?);
        }
        Ok(EncryptedRaceSelection {
            title: self.title.clone(),
            selections,
        })
    }

    pub fn candidates(&self) -> impl Iterator<Item = &String> {
        self.selections.keys()
    }

    pub fn ciphertext(&self, candidate: &str) -> Option<&ExponentialElgamalCiphertext> {
        self.selections.get(candidate)
    }
}

/// Decrypted per-candidate totals for one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptedRaceResult {
    pub title: String,
    pub totals: IndexMap<String, u64>,
}

/// Accumulate a set of encrypted race selections into the running total,
/// seeded from the cryptosystem's identity element.
pub fn tally_races(
    races: &[EncryptedRaceSelection],
    context: &BallotContext,
) -> Result<EncryptedRaceSelection, Error> {
    let mut races = races.iter();
    let first = races.next().ok_or(Error::RaceMismatch)?;

    let key = context.public_key()?;
    let mut totals = IndexMap::with_capacity(first.selections.len());
    for (candidate, ciphertext) in &first.selections {
        let seed = context.identity()?;
        totals.insert(candidate.clone(), seed.combine(ciphertext, key)?);
    }
    let mut accumulated = EncryptedRaceSelection {
        title: first.title.clone(),
        selections: totals,
    };

    for race in races {
        accumulated = accumulated.combine(race, context)?;
    }
    Ok(accumulated)
}

/// Threshold-decrypt an accumulated race selection into per-candidate
/// totals, using the context's locally held shares.
pub fn decrypt_race(
    race: &EncryptedRaceSelection,
    threshold: usize,
    context: &BallotContext,
) -> Result<DecryptedRaceResult, Error> {
    let mut totals = IndexMap::with_capacity(race.selections.len());
    for (candidate, ciphertext) in &race.selections {
        totals.insert(candidate.clone(), context.decrypt(ciphertext, threshold)?);
    }
    Ok(DecryptedRaceResult {
        title: race.title.clone(),
        totals,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::{test_context, test_rng};

    fn selection(values: &[(&str, u64)]) -> PlaintextRaceSelection {
        let selections = values
            .iter()
            .map(|(candidate, v)| (candidate.to_string(), *v))
            .collect();
        PlaintextRaceSelection::new("mayor", selections)
    }

    #[test]
    fn tally_and_decrypt_totals() {
        let ctx = test_context(2, 3, 41);
        let mut rng = test_rng(41);

        let ballots = vec![
            selection(&[("alice", 1), ("bob", 0)]),
            selection(&[("alice", 0), ("bob", 1)]),
            selection(&[("alice", 1), ("bob", 0)]),
        ];

        let encrypted: Vec<_> = ballots
            .iter()
            .map(|b| EncryptedRaceSelection::encrypt(b, &ctx, &mut rng).unwrap())
            .collect();
        for race in &encrypted {
            assert!(race.verify(&ctx));
        }

        let accumulated = tally_races(&encrypted, &ctx).unwrap();
        let result = decrypt_race(&accumulated, 2, &ctx).unwrap();

        assert_eq!(result.totals["alice"], 2);
        assert_eq!(result.totals["bob"], 1);
    }

    #[test]
    fn mismatched_candidate_sets_rejected() {
        let ctx = test_context(2, 3, 42);
        let mut rng = test_rng(42);

        let a = EncryptedRaceSelection::encrypt(&selection(&[("alice", 1)]), &ctx, &mut rng)
            .unwrap();
        let b = EncryptedRaceSelection::encrypt(&selection(&[("mallory", 1)]), &ctx, &mut rng)
            .unwrap();

        assert!(matches!(a.combine(&b, &ctx), Err(Error::RaceMismatch)));
    }
}
