use crate::*;

use indexmap::IndexSet;
use std::collections::HashMap;

/// A stored announcement together with its cached wire digest.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub announcement: Announcement,
    pub digest: Vec<u8>,
}

/// The append-only announcement log of a single host.
///
/// Entries form a DAG through their succeeds-clauses. The frontier is
/// the set of entries nothing has succeeded yet; a new chained entry
/// must point at the whole frontier, collapsing concurrent branches
/// back into a single head.
#[derive(Debug)]
pub struct Log {
    host: HostId,
    entries: Vec<LogEntry>,
    index: HashMap<(HostId, u64), usize>,
    frontier: IndexSet<usize>,
    next_sequence: u64,
}

impl Log {
    pub fn new(host: HostId) -> Self {
        Log {
            host,
            entries: Vec::new(),
            index: HashMap::new(),
            frontier: IndexSet::new(),
            next_sequence: 0,
        }
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The sequence number the next local announcement should carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Pointers to every entry nothing has succeeded yet, in insertion
    /// order.
    pub fn frontier(&self) -> Vec<EntryPointer> {
        self.frontier
            .iter()
            .map(|&i| self.entries[i].announcement.pointer())
            .collect()
    }

    /// Append a chained announcement, local or received from the wire.
    ///
    /// Every succeeds-pointer must resolve to a logged entry with a
    /// matching digest, and on a non-empty log at least one pointer
    /// must name a frontier entry. An announcement that fails any check
    /// is not recorded.
    pub fn append(&mut self, announcement: Announcement) -> Result<EntryPointer, Error> {
        let key = (announcement.host.clone(), announcement.sequence);
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateSequence(announcement.sequence));
        }

        let mut succeeded = Vec::with_capacity(announcement.succeeds.len());
        let mut extends_frontier = false;
        for pointer in &announcement.succeeds {
            let target = match self.index.get(&(pointer.host.clone(), pointer.sequence)) {
                Some(&i) => i,
                None => return Err(Error::UnknownPredecessor(pointer.clone())),
            };
            if self.entries[target].digest != pointer.digest {
                return Err(Error::PredecessorDigestMismatch(pointer.clone()));
            }
            if self.frontier.contains(&target) {
                extends_frontier = true;
            }
            succeeded.push(target);
        }
        if !self.entries.is_empty() && !extends_frontier {
            return Err(Error::StaleAnnouncement);
        }

        for target in succeeded {
            self.frontier.remove(&target);
        }
        Ok(self.insert(announcement))
    }

    /// Append without any chaining checks. The entry is recorded with
    /// whatever succeeds-clause it carries, resolvable or not, and
    /// joins the frontier.
    ///
    /// Chain verification will flag such entries; this path exists for
    /// recovery tooling and for exercising the verifier.
    pub fn append_no_chain(&mut self, announcement: Announcement) -> Result<EntryPointer, Error> {
        let key = (announcement.host.clone(), announcement.sequence);
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateSequence(announcement.sequence));
        }
        Ok(self.insert(announcement))
    }

    fn insert(&mut self, announcement: Announcement) -> EntryPointer {
        let position = self.entries.len();
        let digest = announcement.digest();
        let pointer = announcement.pointer();

        self.index
            .insert((announcement.host.clone(), announcement.sequence), position);
        if announcement.host == self.host && announcement.sequence >= self.next_sequence {
            self.next_sequence = announcement.sequence + 1;
        }
        self.entries.push(LogEntry {
            announcement,
            digest,
        });
        self.frontier.insert(position);
        pointer
    }

    /// Replay the whole log in arrival order and check every entry's
    /// signature and succeeds-clause against the trust store.
    ///
    /// Stops at the first violation and reports its position, never
    /// repairing anything.
    pub fn verify_chain(&self, trust: &TrustStore) -> Result<(), ChainFailure> {
        let mut seen: HashMap<(HostId, u64), usize> = HashMap::new();

        for (position, entry) in self.entries.iter().enumerate() {
            let ann = &entry.announcement;
            let fail = |reason| ChainFailure {
                index: position,
                host: ann.host.clone(),
                sequence: ann.sequence,
                reason,
            };

            let certificate = match trust.resolve(&ann.host) {
                Ok(c) => c,
                Err(_) => return Err(fail(ChainFailureReason::UnknownSigner)),
            };
            if !ann.verify_signature(certificate) {
                return Err(fail(ChainFailureReason::BadSignature));
            }

            if position > 0 && ann.succeeds.is_empty() {
                return Err(fail(ChainFailureReason::Disconnected));
            }
            for pointer in &ann.succeeds {
                let key = (pointer.host.clone(), pointer.sequence);
                match seen.get(&key) {
                    Some(&target) => {
                        if self.entries[target].digest != pointer.digest {
                            return Err(fail(ChainFailureReason::DigestMismatch(pointer.clone())));
                        }
                    }
                    None if self.index.contains_key(&key) => {
                        return Err(fail(ChainFailureReason::ForwardReference(pointer.clone())));
                    }
                    None => {
                        return Err(fail(ChainFailureReason::OrphanedPredecessor(
                            pointer.clone(),
                        )));
                    }
                }
            }

            seen.insert((ann.host.clone(), ann.sequence), position);
        }
        Ok(())
    }
}
