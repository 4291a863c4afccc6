use crate::*;

use ed25519_dalek::Keypair;
use std::sync::RwLock;

/// Signs outgoing announcements and authenticates incoming ones against
/// the trust store. Holds this host's long-term keypair.
pub struct IntegrityLayer {
    host: HostId,
    keypair: Keypair,
    trust: TrustStore,
}

impl IntegrityLayer {
    pub fn new(host: HostId, keypair: Keypair, trust: TrustStore) -> Self {
        IntegrityLayer {
            host,
            keypair,
            trust,
        }
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    pub fn sign(&self, sequence: u64, succeeds: Vec<EntryPointer>, datum: Sexp) -> Announcement {
        Announcement::sign(&self.keypair, self.host.clone(), sequence, succeeds, datum)
    }

    /// Check an incoming announcement's signature before it reaches the
    /// log. Unsigned or mis-signed traffic never gets recorded.
    pub fn authenticate(&self, announcement: &Announcement) -> Result<(), Error> {
        let certificate = self.trust.resolve(&announcement.host)?;
        if !announcement.verify_signature(certificate) {
            return Err(Error::BadAnnouncementSignature(announcement.host.clone()));
        }
        Ok(())
    }
}

/// The full auditing stack of one host: an integrity layer over a
/// hash-chained announcement log, safe to share across threads.
pub struct AuditoriumLog {
    integrity: IntegrityLayer,
    log: RwLock<Log>,
}

impl AuditoriumLog {
    pub fn new(host: HostId, keypair: Keypair, trust: TrustStore) -> Self {
        let log = RwLock::new(Log::new(host.clone()));
        AuditoriumLog {
            integrity: IntegrityLayer::new(host, keypair, trust),
            log,
        }
    }

    pub fn host(&self) -> &HostId {
        self.integrity.host()
    }

    /// Sign and append a local announcement chained to the whole
    /// current frontier.
    ///
    /// Frontier read, signing, and append happen under one write lock,
    /// so concurrent callers cannot race each other onto the same
    /// sequence number.
    pub fn log_announcement(&self, datum: Sexp) -> Result<EntryPointer, Error> {
        let mut log = self.log.write().unwrap();
        let announcement = self
            .integrity
            .sign(log.next_sequence(), log.frontier(), datum);
        log.append(announcement)
    }

    /// Sign and append a local announcement with an empty
    /// succeeds-clause, bypassing the chaining checks.
    pub fn log_announcement_no_chain(&self, datum: Sexp) -> Result<EntryPointer, Error> {
        let mut log = self.log.write().unwrap();
        let announcement = self.integrity.sign(log.next_sequence(), vec![], datum);
        log.append_no_chain(announcement)
    }

    /// Authenticate and append an announcement received from another
    /// host.
    pub fn receive_announcement(&self, announcement: Announcement) -> Result<EntryPointer, Error> {
        self.integrity.authenticate(&announcement)?;
        let mut log = self.log.write().unwrap();
        log.append(announcement)
    }

    pub fn verify_chain(&self) -> Result<(), ChainFailure> {
        let log = self.log.read().unwrap();
        log.verify_chain(self.integrity.trust())
    }

    pub fn current_frontier(&self) -> Vec<EntryPointer> {
        self.log.read().unwrap().frontier()
    }

    pub fn entry_count(&self) -> usize {
        self.log.read().unwrap().len()
    }

    /// Run a closure over the underlying log without cloning it.
    pub fn with_log<T>(&self, f: impl FnOnce(&Log) -> T) -> T {
        let log = self.log.read().unwrap();
        f(&log)
    }
}
