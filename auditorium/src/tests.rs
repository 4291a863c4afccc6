//! Shared fixtures and end-to-end tests covering a full precinct run:
//! hosts booting onto the log, encrypted ballots accumulating, chain
//! verification, and the threshold decryption of the final tally.

use crate::*;

use ed25519_dalek::Keypair;
use indexmap::IndexMap;
use num_bigint::BigUint;
use rand_chacha::ChaCha20Rng;

/// 64-bit safe prime `p = 2q + 1`, large enough to exercise the
/// multi-limb paths while keeping tests fast.
pub(crate) fn test_prime() -> BigUint {
    BigUint::from(18446744073709579247u128)
}

pub(crate) fn test_rng(seed: u64) -> ChaCha20Rng {
    use rand::SeedableRng;
    ChaCha20Rng::seed_from_u64(seed)
}

pub(crate) fn test_key_set(
    threshold: usize,
    num_shares: usize,
    seed: u64,
) -> (ElectionPublicKey, Vec<PrivateKeyShare>) {
    let mut rng = test_rng(seed);
    deal_key_shares(
        threshold,
        num_shares,
        &test_prime(),
        &BigUint::from(4u8),
        &BigUint::from(9u8),
        &mut rng,
    )
    .unwrap()
}

pub(crate) fn test_context(threshold: usize, num_shares: usize, seed: u64) -> BallotContext {
    let (public, shares) = test_key_set(threshold, num_shares, seed);
    let mut keys = KeyMaterial::new();
    keys.set_public(public);
    for share in shares {
        keys.add_share(share);
    }
    BallotContext::new(CryptosystemKind::ExponentialElgamal, keys)
}

struct Host {
    id: HostId,
    keypair: Keypair,
    sequence: u64,
}

impl Host {
    fn new(id: &str) -> Self {
        Host {
            id: HostId::from(id),
            keypair: generate_keypair(),
            sequence: 0,
        }
    }

    fn certificate(&self) -> Certificate {
        Certificate::new(self.id.clone(), self.keypair.public)
    }

    fn announce(&mut self, auditorium: &AuditoriumLog, datum: Sexp) -> Announcement {
        let ann = Announcement::sign(
            &self.keypair,
            self.id.clone(),
            self.sequence,
            auditorium.current_frontier(),
            datum,
        );
        self.sequence += 1;
        ann
    }
}

fn vote(race: &str, choice: &str, candidates: &[&str]) -> PlaintextRaceSelection {
    let selections: IndexMap<String, u64> = candidates
        .iter()
        .map(|&c| (c.to_string(), (c == choice) as u64))
        .collect();
    PlaintextRaceSelection::new(race, selections)
}

#[test]
fn three_host_boot_produces_a_verifiable_chain() {
    let supervisor = Host::new("supervisor");
    let mut booth1 = Host::new("booth-1");
    let mut booth2 = Host::new("booth-2");
    let trust: TrustStore = vec![
        supervisor.certificate(),
        booth1.certificate(),
        booth2.certificate(),
    ]
    .into_iter()
    .collect();

    let auditorium = AuditoriumLog::new(supervisor.id.clone(), supervisor.keypair, trust);
    auditorium.log_announcement(Sexp::atom("status")).unwrap();
    let ann = booth1.announce(&auditorium, Sexp::list(vec![Sexp::atom("assign-label"), Sexp::atom("1")]));
    auditorium.receive_announcement(ann).unwrap();
    let ann = booth2.announce(&auditorium, Sexp::list(vec![Sexp::atom("assign-label"), Sexp::atom("2")]));
    auditorium.receive_announcement(ann).unwrap();
    auditorium.log_announcement(Sexp::atom("polls-open")).unwrap();

    assert_eq!(auditorium.entry_count(), 4);
    auditorium.verify_chain().unwrap();

    // Each entry collapsed the frontier back to a single head.
    let frontier = auditorium.current_frontier();
    assert_eq!(frontier.len(), 1);
    assert_eq!(frontier[0].host, HostId::from("supervisor"));
    assert_eq!(frontier[0].sequence, 1);
}

#[test]
fn verify_chain_locates_an_unchained_entry() {
    let supervisor = Host::new("supervisor");
    let trust: TrustStore = std::iter::once(supervisor.certificate()).collect();
    let auditorium = AuditoriumLog::new(supervisor.id.clone(), supervisor.keypair, trust);

    auditorium.log_announcement(Sexp::atom("status")).unwrap();
    auditorium.log_announcement(Sexp::atom("polls-open")).unwrap();
    auditorium
        .log_announcement_no_chain(Sexp::atom("override"))
        .unwrap();
    auditorium.log_announcement(Sexp::atom("polls-closed")).unwrap();

    let failure = auditorium.verify_chain().unwrap_err();
    assert_eq!(failure.index, 2);
    assert_eq!(failure.sequence, 2);
    assert_eq!(failure.reason, ChainFailureReason::Disconnected);
}

#[test]
fn full_precinct_run_tallies_correctly() {
    let context = test_context(2, 3, 97);
    let mut rng = test_rng(97);

    let supervisor = Host::new("supervisor");
    let mut booth = Host::new("booth-1");
    let trust: TrustStore = vec![supervisor.certificate(), booth.certificate()]
        .into_iter()
        .collect();
    let auditorium = AuditoriumLog::new(supervisor.id.clone(), supervisor.keypair, trust);

    auditorium.log_announcement(Sexp::atom("polls-open")).unwrap();

    // Three voters: two for mercury, one for venus.
    let candidates = ["mercury", "venus"];
    let choices = ["mercury", "venus", "mercury"];
    let mut cast = Vec::new();
    for choice in &choices {
        let encrypted = EncryptedRaceSelection::encrypt(
            &vote("governor", choice, &candidates),
            &context,
            &mut rng,
        )
        .unwrap();
        assert!(encrypted.verify(&context));

        let datum = Sexp::list(vec![
            Sexp::atom("cast-ballot"),
            Sexp::bytes(serde_json::to_vec(&encrypted).unwrap()),
        ]);
        let ann = booth.announce(&auditorium, datum);
        auditorium.receive_announcement(ann).unwrap();
        cast.push(encrypted);
    }

    auditorium.log_announcement(Sexp::atom("polls-closed")).unwrap();
    auditorium.verify_chain().unwrap();

    // Recover the cast ballots from the log itself, not from memory.
    let logged: Vec<EncryptedRaceSelection> = auditorium.with_log(|log| {
        log.entries()
            .filter_map(|entry| match entry.announcement.datum.as_list() {
                Some([tag, payload]) if tag.as_atom() == Some("cast-ballot") => {
                    Some(serde_json::from_slice(payload.as_bytes().unwrap()).unwrap())
                }
                _ => None,
            })
            .collect()
    });
    assert_eq!(logged, cast);

    let accumulated = tally_races(&logged, &context).unwrap();
    let result = decrypt_race(&accumulated, 2, &context).unwrap();
    assert_eq!(result.title, "governor");
    assert_eq!(result.totals["mercury"], 2);
    assert_eq!(result.totals["venus"], 1);
}

#[test]
fn any_two_of_three_shares_decrypt_the_tally() {
    let (key, shares) = test_key_set(2, 3, 55);
    let mut rng = test_rng(55);

    let mut total = ExponentialElgamalCiphertext::identity(&key);
    for value in &[1u64, 0, 1, 1] {
        let ciphertext = key.encrypt(*value, &[0, 1], &mut rng).unwrap();
        total = total.combine(&ciphertext, &key).unwrap();
    }

    for subset in &[[0usize, 1], [0, 2], [1, 2]] {
        let partials: Vec<PartialDecryption> = subset
            .iter()
            .map(|&i| shares[i].partial_decrypt(&total))
            .collect();
        let mapped = combine_partials(&partials, &total, 2, &key).unwrap();
        assert_eq!(recover_tally(&mapped, total.size() as u64, &key).unwrap(), 3);
    }
}
