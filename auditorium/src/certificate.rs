use crate::*;

use ed25519_dalek::{Keypair, PublicKey};
use std::collections::HashMap;

/// Binds a host identifier to its signature-verification key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub host: HostId,

    #[serde(with = "EdPublicKeyHex")]
    pub public_key: PublicKey,
}

impl Certificate {
    pub fn new(host: HostId, public_key: PublicKey) -> Self {
        Certificate { host, public_key }
    }
}

/// The host-id to certificate mapping, prepared out of band and loaded
/// once per run. Immutable for the run's duration.
///
/// Unknown host identifiers resolve to `UnknownSigner` rather than being
/// silently accepted.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: HashMap<HostId, Certificate>,
}

impl TrustStore {
    pub fn new() -> Self {
        TrustStore::default()
    }

    pub fn enroll(&mut self, certificate: Certificate) {
        self.certificates
            .insert(certificate.host.clone(), certificate);
    }

    pub fn resolve(&self, host: &HostId) -> Result<&Certificate, Error> {
        self.certificates
            .get(host)
            .ok_or_else(|| Error::UnknownSigner(host.clone()))
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl std::iter::FromIterator<Certificate> for TrustStore {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        let mut store = TrustStore::new();
        for certificate in iter {
            store.enroll(certificate);
        }
        store
    }
}

pub fn generate_keypair() -> Keypair {
    let mut csprng = rand::rngs::OsRng {};
    Keypair::generate(&mut csprng)
}
