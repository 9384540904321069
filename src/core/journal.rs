//! Append-only audit trail of block/unblock attempts.

use std::net::IpAddr;
use std::sync::Arc;

use log::warn;

use crate::core::storage::{Storage, StorageError};
use crate::models::{Action, ActionLogEntry};
use crate::utils::current_timestamp;

/// Action journal over a single text file, one entry per line
#[derive(Clone)]
pub struct ActionJournal {
    storage: Arc<dyn Storage>,
    key: String,
}

impl ActionJournal {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self { storage, key: key.into() }
    }

    /// Append one entry stamped with the current time
    pub fn record(&self, actor: &str, action: Action, address: IpAddr) -> Result<ActionLogEntry, StorageError> {
        let entry = ActionLogEntry {
            timestamp: current_timestamp(),
            actor: actor.to_string(),
            action,
            source_address: address.to_string(),
        };
        self.append(&entry)?;
        Ok(entry)
    }

    pub fn append(&self, entry: &ActionLogEntry) -> Result<(), StorageError> {
        self.storage.append_line(&self.key, &format_entry(entry))
    }

    /// All parseable entries in append order
    pub fn entries(&self) -> Result<Vec<ActionLogEntry>, StorageError> {
        let contents = self.storage.read(&self.key)?.unwrap_or_default();
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = parse_entry(line);
                if entry.is_none() {
                    warn!("Ignoring unreadable journal line: {}", line);
                }
                entry
            })
            .collect())
    }
}

/// `[timestamp] actor ACTION address`, without the line terminator
pub fn format_entry(entry: &ActionLogEntry) -> String {
    format!(
        "[{}] {} {} {}",
        entry.timestamp, entry.actor, entry.action, entry.source_address
    )
}

/// Inverse of `format_entry`
///
/// Fields are taken from the right so the actor may contain spaces.
pub fn parse_entry(line: &str) -> Option<ActionLogEntry> {
    let rest = line.trim().strip_prefix('[')?;
    let (timestamp, rest) = rest.split_once(']')?;
    let (rest, source_address) = rest.trim_end().rsplit_once(char::is_whitespace)?;
    let (actor, action) = rest.trim_end().rsplit_once(char::is_whitespace)?;
    let action = Action::parse(action)?;
    let actor = actor.trim();
    if actor.is_empty() || source_address.is_empty() {
        return None;
    }
    Some(ActionLogEntry {
        timestamp: timestamp.to_string(),
        actor: actor.to_string(),
        action,
        source_address: source_address.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStorage;

    #[test]
    fn test_line_format() {
        let entry = ActionLogEntry {
            timestamp: "2024-05-01 10:00:00".to_string(),
            actor: "admin".to_string(),
            action: Action::SimulatedBlock,
            source_address: "203.0.113.7".to_string(),
        };
        let line = format_entry(&entry);
        assert_eq!(line, "[2024-05-01 10:00:00] admin SIMULATED_BLOCK 203.0.113.7");
        assert_eq!(parse_entry(&line), Some(entry));
    }

    #[test]
    fn test_append_order_preserved() {
        let storage = Arc::new(MemoryStorage::new());
        let journal = ActionJournal::new(storage.clone(), "data/actions.log");
        let addr: IpAddr = "10.0.0.5".parse().unwrap();

        journal.record("system", Action::BlockFailed, addr).unwrap();
        journal.record("admin", Action::Unblock, addr).unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, Action::BlockFailed);
        assert_eq!(entries[0].actor, "system");
        assert_eq!(entries[1].action, Action::Unblock);
    }

    #[test]
    fn test_actor_with_spaces_round_trips() {
        let storage = Arc::new(MemoryStorage::new());
        let journal = ActionJournal::new(storage.clone(), "data/actions.log");
        let addr: IpAddr = "10.0.0.5".parse().unwrap();

        journal.record("Jane Doe", Action::SimulatedBlock, addr).unwrap();
        journal.record("system", Action::Block, addr).unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].actor, "Jane Doe");
        assert_eq!(entries[0].action, Action::SimulatedBlock);
        assert_eq!(entries[0].source_address, "10.0.0.5");
        assert_eq!(entries[1].actor, "system");
    }

    #[test]
    fn test_append_after_unterminated_line() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .rewrite("j.log", "[2024-05-01 10:00:00] admin BLOCK 10.0.0.1")
            .unwrap();
        let journal = ActionJournal::new(storage, "j.log");
        journal.record("admin", Action::Unblock, "10.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(journal.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_unreadable_lines_skipped() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .append("j.log", "garbage\n[2024-05-01 10:00:00] admin BLOCK 10.0.0.1\n")
            .unwrap();
        let journal = ActionJournal::new(storage, "j.log");
        assert_eq!(journal.entries().unwrap().len(), 1);
    }
}
