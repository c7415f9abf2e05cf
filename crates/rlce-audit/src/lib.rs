//! rlce-audit
//!
//! Append-only, tamper-evident event log. One JSON object per line, keys
//! sorted, each line carrying `hash_prev` (the previous line's `hash_self`)
//! and `hash_self` (SHA-256 over the canonical line without `hash_self`).
//!
//! The log survives restarts: [`AuditWriter::open`] re-reads the tail of an
//! existing file and continues the chain from it. A final line left torn
//! or doubled by an interrupted append is cut off first.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for deterministic event ids.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1e_5a0d_2b7f_4c1a_9e3d_71f0_8a42_c5b9);

/// Append-only hash-chained writer.
pub struct AuditWriter {
    path: PathBuf,
    session_id: Uuid,
    last_hash: Option<String>,
    /// Number of events in the file; the next event's `seq`.
    seq: u64,
    /// Written but not confirmed durable. A retry of the same append only
    /// re-syncs instead of writing the record twice.
    unsynced: Option<AuditEvent>,
    repaired: Option<TailRepair>,
}

/// Damage at the end of the log removed by [`AuditWriter::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailRepair {
    /// 1-based line that was cut.
    pub line: usize,
    pub reason: String,
    pub dropped_bytes: u64,
}

impl AuditWriter {
    /// Open (or create) the log at `path` and resume its chain.
    ///
    /// Damage confined to the final line is what an interrupted append
    /// leaves behind: a torn line, or a re-append of the previous record.
    /// That line is cut off and reported through [`AuditWriter::repaired`].
    /// A break anywhere else is refused with `AUDIT_CHAIN_BROKEN`:
    /// appending to it would make the break indistinguishable from later
    /// tampering.
    pub fn open(path: impl AsRef<Path>, session_id: Uuid) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let mut writer = Self {
            path,
            session_id,
            last_hash: None,
            seq: 0,
            unsynced: None,
            repaired: None,
        };
        if !writer.path.exists() {
            return Ok(writer);
        }

        let content = fs::read_to_string(&writer.path)
            .with_context(|| format!("read audit log {:?}", writer.path))?;
        let (lines, last_hash) = match verify_hash_chain_str(&content)? {
            VerifyResult::Valid { lines, last_hash } => (lines, last_hash),
            VerifyResult::Broken { line, reason } => {
                let Some(keep) = interrupted_tail(&content, line) else {
                    bail!(
                        "AUDIT_CHAIN_BROKEN {:?} at line {line}: {reason}",
                        writer.path
                    );
                };
                truncate(&writer.path, keep)?;
                writer.repaired = Some(TailRepair {
                    line,
                    reason,
                    dropped_bytes: content.len() as u64 - keep,
                });
                match verify_hash_chain_str(&content[..keep as usize])? {
                    VerifyResult::Valid { lines, last_hash } => (lines, last_hash),
                    VerifyResult::Broken { line, reason } => bail!(
                        "AUDIT_CHAIN_BROKEN {:?} at line {line}: {reason}",
                        writer.path
                    ),
                }
            }
        };
        writer.seq = lines as u64;
        writer.last_hash = last_hash;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Number of events in the log (including those from earlier sessions).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Tail damage cut off when the log was opened.
    pub fn repaired(&self) -> Option<&TailRepair> {
        self.repaired.as_ref()
    }

    /// Append one event.
    ///
    /// A failed write is rolled back so no partial line stays in the file.
    /// If the line was written but the sync failed, retrying the same
    /// `kind` and `payload` only repeats the sync.
    pub fn append(&mut self, kind: &str, payload: Value) -> Result<AuditEvent> {
        if let Some(pending) = self.unsynced.take() {
            if pending.kind == kind && pending.payload == payload {
                sync(&self.path)?;
                return Ok(pending);
            }
            // A different record follows; the earlier line is already in
            // the chain and its durability rides on the next sync.
        }

        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;
        let mut ev = AuditEvent {
            event_id,
            session_id: self.session_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            kind: kind.to_string(),
            payload,
            hash_prev: self.last_hash.clone(),
            hash_self: None,
        };
        let self_hash = compute_event_hash(&ev)?;
        ev.hash_self = Some(self_hash.clone());
        let line = canonical(&ev)?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {:?}", self.path))?;
        let len_before = f
            .metadata()
            .with_context(|| format!("stat {:?}", self.path))?
            .len();
        if let Err(e) = f.write_all(format!("{line}\n").as_bytes()) {
            let rollback = f.set_len(len_before);
            return Err(anyhow::Error::new(e)
                .context(format!("append to {:?}", self.path))
                .context(match rollback {
                    Ok(()) => "partial line rolled back".to_string(),
                    Err(r) => format!("rollback failed: {r}"),
                }));
        }

        // The line is in the file: the chain has moved on either way.
        self.last_hash = Some(self_hash);
        self.seq += 1;
        if let Err(e) = f.sync_data() {
            self.unsynced = Some(ev);
            return Err(anyhow::Error::new(e).context(format!("sync {:?}", self.path)));
        }
        Ok(ev)
    }
}

/// Byte length of the valid prefix when the only damage is on the final
/// non-blank line `broken_line`: an unparseable fragment, or an exact copy
/// of the line before it.
fn interrupted_tail(content: &str, broken_line: usize) -> Option<u64> {
    let pieces: Vec<&str> = content.split_inclusive('\n').collect();
    let idx = broken_line.checked_sub(1)?;
    let broken = pieces.get(idx)?.trim();
    if pieces[idx + 1..].iter().any(|p| !p.trim().is_empty()) {
        return None;
    }

    let torn = serde_json::from_str::<AuditEvent>(broken).is_err();
    let repeated = pieces[..idx]
        .iter()
        .rev()
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .is_some_and(|prev| prev == broken);
    if !(torn || repeated) {
        return None;
    }
    Some(pieces[..idx].iter().map(|p| p.len() as u64).sum())
}

fn truncate(path: &Path, len: u64) -> Result<()> {
    let f = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open {:?} for repair", path))?;
    f.set_len(len)
        .with_context(|| format!("truncate {:?} to {len}", path))?;
    f.sync_all().with_context(|| format!("sync {:?}", path))
}

fn sync(path: &Path) -> Result<()> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|f| f.sync_data())
        .with_context(|| format!("sync {:?}", path))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// One session per process start.
    pub session_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Event id derived from chain position and payload, no RNG.
fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let material = format!(
        "{}|{}|{}",
        prev_hash.unwrap_or("GENESIS"),
        seq,
        canonical(payload)?
    );
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, material.as_bytes()))
}

/// Compact JSON with object keys in sorted order at every depth.
fn canonical<T: Serialize>(v: &T) -> Result<String> {
    fn ordered(v: Value) -> Value {
        match v {
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Value::Object(entries.into_iter().map(|(k, v)| (k, ordered(v))).collect())
            }
            Value::Array(items) => Value::Array(items.into_iter().map(ordered).collect()),
            other => other,
        }
    }
    let value = serde_json::to_value(v).context("encode audit event")?;
    serde_json::to_string(&ordered(value)).context("render audit event")
}

/// SHA-256 of the canonical event with `hash_self` left out.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let unsealed = AuditEvent {
        hash_self: None,
        ..ev.clone()
    };
    Ok(hex::encode(Sha256::digest(canonical(&unsealed)?.as_bytes())))
}

/// Verify the chain of the log at `path`.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("read audit log {:?}", path))?;
    verify_hash_chain_str(&content)
}

/// [`verify_hash_chain`] over JSONL already in memory. Blank lines are
/// skipped but still count toward reported line numbers.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut expected_prev: Option<String> = None;
    let mut events = 0u64;

    let numbered = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    for (line, raw) in numbered {
        let broken = |reason: String| Ok(VerifyResult::Broken { line, reason });

        let ev: AuditEvent = match serde_json::from_str(raw) {
            Ok(ev) => ev,
            Err(e) => return broken(format!("unparseable event: {e}")),
        };
        if ev.hash_prev != expected_prev {
            return broken(format!(
                "hash_prev mismatch: expected {:?}, got {:?}",
                expected_prev, ev.hash_prev
            ));
        }
        if ev.seq != events {
            return broken(format!("seq mismatch: expected {events}, got {}", ev.seq));
        }
        let recomputed = compute_event_hash(&ev)?;
        match ev.hash_self {
            None => return broken("hash_self missing".to_string()),
            Some(claimed) if claimed != recomputed => {
                return broken(format!(
                    "hash_self mismatch: claimed {claimed}, recomputed {recomputed}"
                ))
            }
            Some(claimed) => expected_prev = Some(claimed),
        }
        events += 1;
    }

    Ok(VerifyResult::Valid {
        lines: events as usize,
        last_hash: expected_prev,
    })
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid {
        lines: usize,
        last_hash: Option<String>,
    },
    /// The chain is broken at the given (1-based) line.
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}
