//! Three-way diff between stored rows and a device listing.

use std::collections::HashMap;
use std::hash::Hash;

use crate::database::SyncKind;

/// What happens to a stored row the device no longer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsencePolicy {
    /// Keep the row, flag it not alive; it may come back
    MarkNotAlive,
    /// Tombstone the row
    SoftDelete,
    /// Leave the last known values
    Retain,
}

pub fn absence_policy(kind: SyncKind) -> AbsencePolicy {
    match kind {
        SyncKind::Endpoints => AbsencePolicy::MarkNotAlive,
        SyncKind::Subscribers => AbsencePolicy::MarkNotAlive,
        SyncKind::Bandwidths => AbsencePolicy::SoftDelete,
        SyncKind::Ports => AbsencePolicy::Retain,
    }
}

#[derive(Debug)]
pub struct Diff<'s, S, I> {
    /// Stored row and the incoming item with the same key
    pub matched: Vec<(&'s S, I)>,
    /// Incoming items with no stored row
    pub new: Vec<I>,
    /// Stored rows whose key was not reported
    pub missing: Vec<&'s S>,
}

/// Split `incoming` against `stored` by key. Duplicate incoming keys keep
/// the last item; stored rows without a key can only end up missing.
pub fn three_way_diff<'s, S, I, K>(
    stored: &'s [S],
    incoming: Vec<I>,
    stored_key: impl Fn(&S) -> Option<K>,
    incoming_key: impl Fn(&I) -> K,
) -> Diff<'s, S, I>
where
    K: Eq + Hash,
{
    let mut order: Vec<K> = Vec::new();
    let mut latest: HashMap<K, I> = HashMap::new();
    for item in incoming {
        let key = incoming_key(&item);
        if latest.contains_key(&key) {
            latest.insert(key, item);
        } else {
            order.push(incoming_key(&item));
            latest.insert(key, item);
        }
    }

    let mut by_key: HashMap<K, &'s S> = HashMap::new();
    let mut missing = Vec::new();
    for row in stored {
        match stored_key(row) {
            Some(key) if latest.contains_key(&key) && !by_key.contains_key(&key) => {
                by_key.insert(key, row);
            }
            _ => missing.push(row),
        }
    }

    let mut matched = Vec::new();
    let mut new = Vec::new();
    for key in order {
        let Some(item) = latest.remove(&key) else {
            continue;
        };
        match by_key.get(&key) {
            Some(row) => matched.push((*row, item)),
            None => new.push(item),
        }
    }

    Diff {
        matched,
        new,
        missing,
    }
}
