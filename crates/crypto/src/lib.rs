//! Hashing and deterministic owner selection.
//!
//! Everything that has to be bit-identical across peers lives here: content
//! hashing, canonical JSON, Hamming distance and the selection function that
//! maps (clock head, task hash, roster) to the peer responsible for a task.

use meshkit_primitives::{PeerId, WorkflowId};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("no peers available for task assignment")]
    NoPeersAvailable,
}

/// Lowercase 64-hex-char sha256 of the input.
///
/// The only hash function used anywhere in the coordination core.
#[must_use]
pub fn content_hash(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

/// Canonical JSON encoding: UTF-8, object keys sorted bytewise, no
/// insignificant whitespace. Array order is preserved.
///
/// Merkle-node hashes are computed over this encoding, so two peers
/// serializing the same logical value must produce the same bytes
/// regardless of map insertion order.
#[must_use]
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String((*key).clone()), out);
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    serde_json::to_writer(&mut *out, value)
        .expect("JSON scalars serialize infallibly into memory");
}

/// Count of positions where two strings differ.
///
/// If the inputs differ in length the shorter one is right-padded with
/// `'0'`: a deliberate convention so the function is total, not an error.
#[must_use]
pub fn hamming(a: &str, b: &str) -> usize {
    let mut lhs = a.chars();
    let mut rhs = b.chars();
    let mut distance = 0;

    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return distance,
            (l, r) => {
                if l.unwrap_or('0') != r.unwrap_or('0') {
                    distance += 1;
                }
            }
        }
    }
}

/// Deterministically selects the peer responsible for a task.
///
/// `combined = sha256(merkle_head ":" task_hash)` is matched against each
/// peer's `sha256(peer_id)` by Hamming distance; the minimum wins, ties
/// broken by lexicographic peer-id. Given the same clock head and roster,
/// every peer computes the same owner: this is the consensus hook.
pub fn select_owner(
    merkle_head: &str,
    task_hash: &str,
    peers: &[PeerId],
) -> Result<(PeerId, usize), SelectionError> {
    let combined = content_hash(format!("{merkle_head}:{task_hash}"));

    peers
        .iter()
        .map(|peer| (hamming(&combined, &content_hash(peer.as_str())), peer))
        .min_by(|(da, pa), (db, pb)| da.cmp(db).then_with(|| pa.as_str().cmp(pb.as_str())))
        .map(|(distance, peer)| (peer.clone(), distance))
        .ok_or(SelectionError::NoPeersAvailable)
}

/// Hash of a workflow's coordination-relevant fields: the task input to
/// [`select_owner`]. Priority is included so it is part of the audit trail,
/// even though the selection itself does not depend on it.
#[must_use]
pub fn task_hash(workflow_id: &WorkflowId, name: &str, priority: f64) -> String {
    let payload = json!({
        "workflow_id": workflow_id,
        "name": name,
        "priority": priority,
    });

    content_hash(canonical_json(&payload))
}

/// Derives a workflow identifier from the submitting peer, the submission
/// instant in Unix nanoseconds and the source reference. The timestamp
/// keeps re-submissions of the same source from colliding.
#[must_use]
pub fn derive_workflow_id(peer: &PeerId, submit_nanos: u64, source_ref: &str) -> WorkflowId {
    let digest = content_hash(format!("{peer}:{submit_nanos}:{source_ref}"));
    WorkflowId::new(&digest[..WorkflowId::LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_lowercase_hex() {
        let hash = content_hash(b"meshkit");

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = serde_json::json!({
            "zeta": {"b": 2, "a": 1},
            "alpha": [3, {"y": true, "x": false}],
        });

        let encoded = String::from_utf8(canonical_json(&value)).unwrap();

        assert_eq!(
            encoded,
            r#"{"alpha":[3,{"x":false,"y":true}],"zeta":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn canonical_json_ignores_insertion_order() {
        let mut forward = serde_json::Map::new();
        forward.insert("a".to_owned(), 1.into());
        forward.insert("b".to_owned(), 2.into());

        let mut backward = serde_json::Map::new();
        backward.insert("b".to_owned(), 2.into());
        backward.insert("a".to_owned(), 1.into());

        assert_eq!(
            canonical_json(&Value::Object(forward)),
            canonical_json(&Value::Object(backward))
        );
    }

    #[test]
    fn hamming_basics() {
        assert_eq!(hamming("abc123", "abc123"), 0);
        assert_eq!(hamming("abc123", "xyz789"), 6);
        assert_eq!(hamming("abc", "axc"), 1);
    }

    #[test]
    fn hamming_pads_shorter_input_with_zeroes() {
        // "ab" is treated as "ab00": only position 2 differs ('1' vs '0');
        // the padded position 3 matches.
        assert_eq!(hamming("ab10", "ab"), 1);
        assert_eq!(hamming("ab", "ab10"), 1);
        assert_eq!(hamming("", "000"), 0);
        assert_eq!(hamming("", "111"), 3);
    }

    #[test]
    fn select_owner_is_deterministic() -> eyre::Result<()> {
        let peers: Vec<PeerId> = ["peer-1", "peer-2", "peer-3"]
            .into_iter()
            .map(PeerId::from)
            .collect();

        let (first_peer, first_distance) = select_owner("abc123", "def456", &peers)?;

        for _ in 0..10 {
            let (peer, distance) = select_owner("abc123", "def456", &peers)?;
            assert_eq!(peer, first_peer);
            assert_eq!(distance, first_distance);
        }

        // Distance is a count over two 64-char hex digests.
        assert!(first_distance <= 64);

        Ok(())
    }

    #[test]
    fn select_owner_ignores_roster_order() -> eyre::Result<()> {
        let forward: Vec<PeerId> = ["peer-1", "peer-2", "peer-3"]
            .into_iter()
            .map(PeerId::from)
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(
            select_owner("abc123", "def456", &forward)?,
            select_owner("abc123", "def456", &backward)?
        );

        Ok(())
    }

    #[test]
    fn select_owner_breaks_ties_lexicographically() -> eyre::Result<()> {
        let a = PeerId::from("peer-a");
        let b = PeerId::from("peer-b");

        let (_, distance_a) = select_owner("head", "task", &[a.clone()])?;
        let (_, distance_b) = select_owner("head", "task", &[b.clone()])?;

        let (winner, distance) = select_owner("head", "task", &[b, a.clone()])?;

        if distance_a == distance_b {
            // An exact tie must fall to the lexicographically smaller id,
            // not to roster position.
            assert_eq!(winner, a);
        } else {
            assert_eq!(distance, distance_a.min(distance_b));
        }

        Ok(())
    }

    #[test]
    fn select_owner_requires_peers() {
        let result = select_owner("abc123", "def456", &[]);

        assert!(matches!(result, Err(SelectionError::NoPeersAvailable)));
    }

    #[test]
    fn task_hash_is_stable_and_priority_sensitive() {
        let id = WorkflowId::new("deadbeef00112233");

        let a = task_hash(&id, "scrape", 3.0);
        let b = task_hash(&id, "scrape", 3.0);
        let c = task_hash(&id, "scrape", 1.0);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn workflow_ids_are_short_hashes() {
        let peer = PeerId::from("peer-alpha");

        let id = derive_workflow_id(&peer, 1_700_000_000_000_000_000, "scrape.yml");

        assert_eq!(id.as_str().len(), WorkflowId::LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        // A later submission of the same source must not collide.
        let later = derive_workflow_id(&peer, 1_700_000_000_000_000_001, "scrape.yml");
        assert_ne!(id, later);
    }
}
