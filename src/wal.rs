use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only write-ahead log. The WAL is the store's durable form: every
/// mutation appends its event batch here before touching in-memory state,
/// and `Engine::open` rebuilds all collections by replaying it.
///
/// Entry framing: `[u32: len][bincode: Event][u32: crc32]`, little-endian.
/// `len` covers the bincode payload only. A crash mid-append leaves a
/// truncated tail that replay detects and discards via the length prefix and
/// CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl Wal {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append a batch of events: every entry is buffered, then the
    /// whole batch is committed with one flush + fsync. A mutation's main
    /// event and its audit record land in the same sync.
    pub fn append_batch(&mut self, events: &[Event]) -> io::Result<()> {
        for event in events {
            write_entry(&mut self.writer, event)?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Append a single event. Shorthand for a one-element batch.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_batch(std::slice::from_ref(event))
    }

    /// Replay the WAL from disk, returning all intact events in append
    /// order. A truncated or CRC-corrupt tail is silently discarded; a
    /// missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        while let Some(event) = read_entry(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}

fn write_entry(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Read one entry. `Ok(None)` means end of intact log: clean EOF, a
/// truncated entry, or a corrupt payload — replay stops at the first of any.
fn read_entry(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    let mut crc_buf = [0u8; 4];
    for buf in [payload.as_mut_slice(), &mut crc_buf[..]] {
        match reader.read_exact(buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
    }

    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditRecord, SlotKey};

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_wal");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn slot_added(id: u32) -> Event {
        Event::SlotAdded {
            id,
            label: format!("{:02}:00 - {:02}:00", 9 + id, 11 + id),
            capacity: 3,
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![
            slot_added(1),
            Event::WaitlistLeft {
                id: 99,
                slot_key: SlotKey::new("2026-08-06", 1),
            },
        ];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn batch_commits_in_order() {
        let path = tmp_path("batch.wal");
        let batch = vec![
            slot_added(1),
            Event::AuditRecorded {
                record: AuditRecord {
                    id: 1,
                    action: "SLOT_ADD".into(),
                    details: "added slot 1".into(),
                    timestamp: 1_000,
                },
            },
        ];

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append_batch(&batch).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), batch);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_discards_truncated_tail() {
        let path = tmp_path("truncated.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&slot_added(1)).unwrap();
        }
        {
            // Partial length prefix + a few payload bytes.
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 6]).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![slot_added(1)]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_corrupt_crc() {
        let path = tmp_path("corrupt_crc.wal");
        let good = slot_added(1);
        let bad = slot_added(2);

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        {
            let payload = bincode::serialize(&bad).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }

        // Only the intact prefix survives.
        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn append_after_reopen_extends_log() {
        let path = tmp_path("reopen.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&slot_added(1)).unwrap();
        }
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&slot_added(2)).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![slot_added(1), slot_added(2)]);
        let _ = std::fs::remove_file(&path);
    }
}
