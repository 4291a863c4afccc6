use crate::*;

use digest::Digest;
use ed25519_dalek::{ExpandedSecretKey, Keypair, Signature, Verifier};
use sha2::Sha256;
use std::convert::TryFrom;
use std::fmt;

/// A host identifier: supervisor, vote-casting terminal, or scanner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(pub String);

impl HostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        HostId(s.to_string())
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a prior log entry by its author, the author's sequence
/// number, and the SHA-256 digest of the entry's full wire encoding.
///
/// The digest binds both the predecessor's content and its signature, so
/// a succeeds-pointer cannot be redirected to an altered entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPointer {
    pub host: HostId,
    pub sequence: u64,

    #[serde(with = "hex_serde")]
    pub digest: Vec<u8>,
}

impl EntryPointer {
    pub fn to_sexp(&self) -> Sexp {
        Sexp::list(vec![
            Sexp::atom("ptr"),
            Sexp::atom(self.host.as_str()),
            Sexp::atom(self.sequence.to_string()),
            Sexp::bytes(self.digest.clone()),
        ])
    }

    pub fn from_sexp(sexp: &Sexp) -> Result<Self, Error> {
        let items = sexp
            .as_list()
            .ok_or(Error::MalformedMessage("pointer is not a list"))?;
        match items {
            [tag, host, sequence, digest] if tag.as_atom() == Some("ptr") => {
                let host = host
                    .as_atom()
                    .ok_or(Error::MalformedMessage("pointer host is not an atom"))?;
                let sequence = sequence
                    .as_atom()
                    .and_then(|s| s.parse().ok())
                    .ok_or(Error::MalformedMessage("bad pointer sequence number"))?;
                let digest = digest
                    .as_bytes()
                    .ok_or(Error::MalformedMessage("pointer digest is not a byte atom"))?;
                Ok(EntryPointer {
                    host: HostId::from(host),
                    sequence,
                    digest: digest.to_vec(),
                })
            }
            _ => Err(Error::MalformedMessage("bad pointer shape")),
        }
    }
}

impl fmt::Display for EntryPointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.sequence)
    }
}

/// A signed log announcement.
///
/// Wire shape: `(announce (host seq) (signature sig) (succeeds ptr*)
/// datum)`. The signature covers the succeeds-clause and the datum, so
/// altering either invalidates it. The datum itself is opaque to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub host: HostId,
    pub sequence: u64,
    pub succeeds: Vec<EntryPointer>,
    pub datum: Sexp,

    #[serde(with = "EdSignatureHex")]
    pub signature: Signature,
}

impl Announcement {
    /// Sign a new announcement over the canonical encoding of its
    /// content and succeeds-clause.
    pub fn sign(
        keypair: &Keypair,
        host: HostId,
        sequence: u64,
        succeeds: Vec<EntryPointer>,
        datum: Sexp,
    ) -> Self {
        let content = signed_content(&host, sequence, &succeeds, &datum);
        let expanded: ExpandedSecretKey = (&keypair.secret).into();
        let signature = expanded.sign(&content.canonical_bytes(), &keypair.public);

        Announcement {
            host,
            sequence,
            succeeds,
            datum,
            signature,
        }
    }

    /// Verify the signature against the author's enrolled certificate.
    ///
    /// Recomputes over the same canonical encoding; any re-serialization
    /// mismatch rejects.
    pub fn verify_signature(&self, certificate: &Certificate) -> bool {
        let content = signed_content(&self.host, self.sequence, &self.succeeds, &self.datum);
        certificate
            .public_key
            .verify(&content.canonical_bytes(), &self.signature)
            .is_ok()
    }

    pub fn to_sexp(&self) -> Sexp {
        Sexp::list(vec![
            Sexp::atom("announce"),
            Sexp::list(vec![
                Sexp::atom(self.host.as_str()),
                Sexp::atom(self.sequence.to_string()),
            ]),
            Sexp::list(vec![
                Sexp::atom("signature"),
                Sexp::bytes(self.signature.to_bytes().to_vec()),
            ]),
            succeeds_clause(&self.succeeds),
            self.datum.clone(),
        ])
    }

    pub fn from_sexp(sexp: &Sexp) -> Result<Self, Error> {
        let items = sexp
            .as_list()
            .ok_or(Error::MalformedMessage("announcement is not a list"))?;
        let (tag, origin, signature, succeeds, datum) = match items {
            [tag, origin, signature, succeeds, datum] => (tag, origin, signature, succeeds, datum),
            _ => return Err(Error::MalformedMessage("bad announcement shape")),
        };
        if tag.as_atom() != Some("announce") {
            return Err(Error::MalformedMessage("missing announce tag"));
        }

        let (host, sequence) = match origin.as_list() {
            Some([host, sequence]) => {
                let host = host
                    .as_atom()
                    .ok_or(Error::MalformedMessage("host is not an atom"))?;
                let sequence = sequence
                    .as_atom()
                    .and_then(|s| s.parse().ok())
                    .ok_or(Error::MalformedMessage("bad sequence number"))?;
                (HostId::from(host), sequence)
            }
            _ => return Err(Error::MalformedMessage("bad origin shape")),
        };

        let signature = match signature.as_list() {
            Some([tag, bytes]) if tag.as_atom() == Some("signature") => {
                let bytes = bytes
                    .as_bytes()
                    .ok_or(Error::MalformedMessage("signature is not a byte atom"))?;
                Signature::try_from(bytes)
                    .map_err(|_| Error::MalformedMessage("bad signature bytes"))?
            }
            _ => return Err(Error::MalformedMessage("bad signature shape")),
        };

        let succeeds = match succeeds.as_list() {
            Some([tag, pointers @ ..]) if tag.as_atom() == Some("succeeds") => pointers
                .iter()
                .map(EntryPointer::from_sexp)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(Error::MalformedMessage("bad succeeds clause")),
        };

        Ok(Announcement {
            host,
            sequence,
            succeeds,
            datum: datum.clone(),
            signature,
        })
    }

    /// SHA-256 of the full wire encoding, signature included.
    pub fn digest(&self) -> Vec<u8> {
        Sha256::digest(&self.to_sexp().canonical_bytes()).to_vec()
    }

    pub fn pointer(&self) -> EntryPointer {
        EntryPointer {
            host: self.host.clone(),
            sequence: self.sequence,
            digest: self.digest(),
        }
    }
}

fn signed_content(host: &HostId, sequence: u64, succeeds: &[EntryPointer], datum: &Sexp) -> Sexp {
    Sexp::list(vec![
        Sexp::atom("announce"),
        Sexp::list(vec![
            Sexp::atom(host.as_str()),
            Sexp::atom(sequence.to_string()),
        ]),
        succeeds_clause(succeeds),
        datum.clone(),
    ])
}

fn succeeds_clause(succeeds: &[EntryPointer]) -> Sexp {
    let mut items = vec![Sexp::atom("succeeds")];
    items.extend(succeeds.iter().map(EntryPointer::to_sexp));
    Sexp::list(items)
}
