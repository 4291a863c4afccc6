use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("auditorium: cannot parse integer: {0}")]
    ParseError(String),

    #[error("auditorium: modulus mismatch between operands")]
    ModulusMismatch,

    #[error("auditorium: value has no inverse under its modulus")]
    NotInvertible,

    #[error("auditorium: invalid key encoding: expected token `{0}`")]
    InvalidKeyFormat(&'static str),

    #[error("auditorium: bad key material: {0}")]
    BadKeyCount(&'static str),

    #[error("auditorium: key material not loaded: {0}")]
    KeyNotLoaded(&'static str),

    #[error("auditorium: plaintext {0} is outside the allowed set")]
    InvalidPlaintext(u64),

    #[error("auditorium: tally search space exhausted after {0} candidates")]
    SearchSpaceExhausted(u64),

    #[error("auditorium: not enough decryption shares: need {needed}, got {got}")]
    InsufficientShares { needed: usize, got: usize },

    #[error("auditorium: duplicate decryption share for index {0}")]
    DuplicateShare(u32),

    #[error("auditorium: race selections do not cover the same candidates")]
    RaceMismatch,

    #[error("auditorium: malformed s-expression: {0}")]
    MalformedSexp(&'static str),

    #[error("auditorium: malformed message: {0}")]
    MalformedMessage(&'static str),

    #[error("auditorium: unknown signer: {0}")]
    UnknownSigner(HostId),

    #[error("auditorium: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("auditorium: announcement signature rejected for host {0}")]
    BadAnnouncementSignature(HostId),

    #[error("auditorium: succeeds-clause names an entry never logged: {0}")]
    UnknownPredecessor(EntryPointer),

    #[error("auditorium: succeeds-clause digest mismatch for entry {0}")]
    PredecessorDigestMismatch(EntryPointer),

    #[error("auditorium: stale announcement: succeeds-clause does not extend the frontier")]
    StaleAnnouncement,

    #[error("auditorium: sequence {0} already logged for this host")]
    DuplicateSequence(u64),

    #[error("auditorium: io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// The precise location and reason of the first chain-verification failure.
///
/// Chain violations are reported, never auto-repaired.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("auditorium: chain verification failed at entry {index} ({host}:{sequence}): {reason}")]
pub struct ChainFailure {
    pub index: usize,
    pub host: HostId,
    pub sequence: u64,
    pub reason: ChainFailureReason,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainFailureReason {
    #[error("signature does not verify")]
    BadSignature,

    #[error("signer has no enrolled certificate")]
    UnknownSigner,

    #[error("succeeds-clause names an entry never logged: {0}")]
    OrphanedPredecessor(EntryPointer),

    #[error("succeeds-clause names a later entry: {0}")]
    ForwardReference(EntryPointer),

    #[error("succeeds-clause digest mismatch for entry {0}")]
    DigestMismatch(EntryPointer),

    #[error("entry is not reachable from the chain roots")]
    Disconnected,
}
