use std::{
    collections::VecDeque,
    fs::{self, File, OpenOptions},
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::error::{Error, Result};

/// Length prefix of each entry
const LEN_PREFIX: usize = 4;

/// Delivered bytes left at the head of the file before it gets compacted,
/// provided they also make up half of it.
const COMPACTION_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Location of one entry in the queue file
#[derive(Debug, Clone, Copy, PartialEq)]
struct Record {
    offset: u64,
    size: u32,
}

impl Record {
    fn end(&self) -> u64 {
        self.offset + LEN_PREFIX as u64 + self.size as u64
    }
}

/// Length prefix of a `len` bytes entry.
fn record_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::Oversized {
        size: len,
        max: u32::MAX as usize,
    })
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// [DurableQueue] stores undelivered batches in a file, as
/// `length:u32 LE | payload` records, oldest first.
///
/// Appends go straight to the end of the file. Removing the oldest entry
/// only moves a cursor, stored in the `<path>.head` sibling as the offset
/// (u64 LE) of the first live record. The file is truncated once the queue
/// is empty, and compacted when delivered records pile up at its head.
///
/// Insertions and compactions rewrite the file into a temporary sibling,
/// renamed over the queue. The cursor is removed first: an interruption
/// may replay delivered batches, but never loses one.
#[derive(Debug)]
pub struct DurableQueue {
    path: PathBuf,
    head_path: PathBuf,
    records: VecDeque<Record>,
    /// End of the last complete record
    end: u64,
    compaction_threshold: u64,
}

impl DurableQueue {
    /// Opens the queue stored at `path`, which may not exist yet.
    /// A truncated trailing record (interrupted append) is discarded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let head_path = sibling(&path, ".head");

        let (mut records, end, file_len) = match Self::scan(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => (VecDeque::new(), 0, 0),
            Err(e) => return Err(e.into()),
        };

        if end < file_len {
            warn!(
                "{}: ignoring {} trailing bytes of incomplete record",
                path.display(),
                file_len - end
            );
            OpenOptions::new().write(true).open(&path)?.set_len(end)?;
        }

        let head = match fs::read(&head_path) {
            Ok(bytes) => <[u8; 8]>::try_from(bytes.as_slice())
                .map(u64::from_le_bytes)
                .ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => Some(0),
            Err(e) => return Err(e.into()),
        };

        let delivered = match head {
            Some(0) => Some(0),
            Some(head) if head == end => Some(records.len()),
            Some(head) => records.iter().position(|record| record.offset == head),
            None => None,
        };

        match delivered {
            Some(count) => {
                records.drain(..count);
            },
            None => {
                warn!(
                    "{}: invalid cursor, replaying all {} entries",
                    path.display(),
                    records.len()
                );
                remove_if_exists(&head_path)?;
            },
        }

        if !records.is_empty() {
            debug!("{}: {} queued batches", path.display(), records.len());
        }

        Ok(Self {
            path,
            head_path,
            records,
            end,
            compaction_threshold: COMPACTION_THRESHOLD,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a new entry at the end of the queue.
    pub fn push_back(&mut self, payload: &[u8]) -> Result<()> {
        let size = record_size(payload.len())?;

        let mut fd = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut bytes = Vec::with_capacity(LEN_PREFIX + payload.len());
        bytes.extend(size.to_le_bytes());
        bytes.extend_from_slice(payload);

        fd.write_all(&bytes)?;
        fd.sync_data()?;

        let record = Record {
            offset: self.end,
            size,
        };

        self.end = record.end();
        self.records.push_back(record);
        Ok(())
    }

    /// Oldest entry, if any.
    pub fn front(&self) -> Result<Option<Vec<u8>>> {
        let Some(record) = self.records.front() else {
            return Ok(None);
        };

        let mut fd = File::open(&self.path)?;
        Ok(Some(Self::read_record(&mut fd, record)?))
    }

    /// Removes the oldest entry.
    pub fn pop_front(&mut self) -> Result<()> {
        if self.records.pop_front().is_none() {
            return Ok(());
        }

        match self.records.front().map(|record| record.offset) {
            None => self.clear(),
            Some(head)
                if head >= self.compaction_threshold && head >= self.end - head =>
            {
                debug!(
                    "{}: compacting {} delivered bytes",
                    self.path.display(),
                    head
                );
                let entries = self.entries()?;
                self.store(&entries)
            },
            Some(head) => self.write_head(head),
        }
    }

    /// Inserts an entry at `index`, clamped to the queue length.
    pub fn insert(&mut self, index: usize, payload: &[u8]) -> Result<()> {
        let mut entries = self.entries()?;

        let index = index.min(entries.len());
        entries.insert(index, payload.to_vec());

        self.store(&entries)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<Vec<u8>>> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut fd = BufReader::new(File::open(&self.path)?);

        self.records
            .iter()
            .map(|record| Self::read_record(&mut fd, record))
            .collect()
    }

    /// Indexes the complete records of the queue file.
    /// Returns the records, the end of the last one and the file size.
    fn scan(path: &Path) -> std::io::Result<(VecDeque<Record>, u64, u64)> {
        let fd = File::open(path)?;
        let file_len = fd.metadata()?.len();

        let mut reader = BufReader::new(fd);
        let mut records = VecDeque::new();
        let mut offset = 0;
        let mut prefix = [0u8; LEN_PREFIX];

        while file_len - offset >= LEN_PREFIX as u64 {
            reader.read_exact(&mut prefix)?;

            let record = Record {
                offset,
                size: u32::from_le_bytes(prefix),
            };

            if record.end() > file_len {
                break;
            }

            reader.seek_relative(record.size as i64)?;
            records.push_back(record);
            offset = record.end();
        }

        Ok((records, offset, file_len))
    }

    fn read_record<R: Read + Seek>(fd: &mut R, record: &Record) -> Result<Vec<u8>> {
        fd.seek(SeekFrom::Start(record.offset + LEN_PREFIX as u64))?;

        let mut payload = vec![0u8; record.size as usize];
        fd.read_exact(&mut payload)?;
        Ok(payload)
    }

    fn write_head(&self, head: u64) -> Result<()> {
        let mut fd = File::create(&self.head_path)?;
        fd.write_all(&head.to_le_bytes())?;
        fd.sync_data()?;
        Ok(())
    }

    /// Empties the queue file.
    fn clear(&mut self) -> Result<()> {
        remove_if_exists(&self.head_path)?;

        match OpenOptions::new().write(true).open(&self.path) {
            Ok(fd) => {
                fd.set_len(0)?;
                fd.sync_all()?;
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }

        self.records.clear();
        self.end = 0;
        Ok(())
    }

    /// Replaces the queue content.
    fn store(&mut self, entries: &[Vec<u8>]) -> Result<()> {
        let mut records = VecDeque::with_capacity(entries.len());
        let mut end = 0;

        for entry in entries {
            let record = Record {
                offset: end,
                size: record_size(entry.len())?,
            };
            end = record.end();
            records.push_back(record);
        }

        remove_if_exists(&self.head_path)?;

        let tmp_path = sibling(&self.path, ".tmp");
        {
            let mut fd = File::create(&tmp_path)?;
            for (entry, record) in entries.iter().zip(&records) {
                fd.write_all(&record.size.to_le_bytes())?;
                fd.write_all(entry)?;
            }
            fd.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;

        self.records = records;
        self.end = end;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let queue = DurableQueue::open(dir.path().join("harv-rawgps.queue")).unwrap();

        assert!(queue.is_empty());
        assert!(queue.front().unwrap().is_none());
        assert!(!queue.path().exists());
    }

    #[test]
    fn fifo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-rawgps.queue");

        let mut queue = DurableQueue::open(&path).unwrap();
        queue.push_back(b"first").unwrap();
        queue.push_back(b"second").unwrap();
        assert_eq!(queue.len(), 2);

        let mut expected = vec![5, 0, 0, 0];
        expected.extend(b"first");
        expected.extend([6, 0, 0, 0]);
        expected.extend(b"second");
        assert_eq!(fs::read(&path).unwrap(), expected);

        assert_eq!(queue.front().unwrap().unwrap(), b"first");
        queue.pop_front().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front().unwrap().unwrap(), b"second");
        queue.pop_front().unwrap();
        assert!(queue.is_empty());
        assert!(queue.front().unwrap().is_none());
    }

    #[test]
    fn insertion() {
        let dir = TempDir::new().unwrap();
        let mut queue = DurableQueue::open(dir.path().join("harv-posgps.queue")).unwrap();

        queue.insert(0, b"c").unwrap();
        queue.insert(0, b"a").unwrap();
        queue.insert(1, b"b").unwrap();
        queue.insert(10, b"d").unwrap();

        assert_eq!(
            queue.entries().unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-rawgps.queue");

        {
            let mut queue = DurableQueue::open(&path).unwrap();
            queue.push_back(&[1, 2, 3]).unwrap();
            queue.push_back(&[]).unwrap();
        }

        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.entries().unwrap(), vec![vec![1, 2, 3], vec![]]);
    }

    #[test]
    fn incomplete_record_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-rawgps.queue");

        let mut content = vec![2, 0, 0, 0, 0xaa, 0xbb];
        // interrupted append: 8 bytes announced, 3 written
        content.extend([8, 0, 0, 0, 1, 2, 3]);
        fs::write(&path, content).unwrap();

        let mut queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), vec![2, 0, 0, 0, 0xaa, 0xbb]);

        queue.push_back(&[0xcc]).unwrap();
        assert_eq!(
            queue.entries().unwrap(),
            vec![vec![0xaa, 0xbb], vec![0xcc]]
        );
    }

    #[test]
    fn pops_move_the_cursor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-rawgps.queue");
        let head_path = dir.path().join("harv-rawgps.queue.head");

        let mut queue = DurableQueue::open(&path).unwrap();
        for entry in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            queue.push_back(entry).unwrap();
        }

        let content = fs::read(&path).unwrap();

        queue.pop_front().unwrap();
        assert_eq!(fs::read(&path).unwrap(), content);
        assert_eq!(fs::read(&head_path).unwrap(), 9u64.to_le_bytes());
        assert_eq!(queue.front().unwrap().unwrap(), b"second");

        queue.pop_front().unwrap();
        assert_eq!(fs::read(&path).unwrap(), content);
        assert_eq!(fs::read(&head_path).unwrap(), 19u64.to_le_bytes());

        let mut queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries().unwrap(), vec![b"third".to_vec()]);

        // emptied: file truncated, cursor removed
        queue.pop_front().unwrap();
        assert!(queue.is_empty());
        assert!(fs::read(&path).unwrap().is_empty());
        assert!(!head_path.exists());

        queue.push_back(b"fourth").unwrap();
        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.entries().unwrap(), vec![b"fourth".to_vec()]);
    }

    #[test]
    fn delivered_records_are_compacted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-rawgps.queue");

        let mut queue = DurableQueue::open(&path).unwrap();
        queue.compaction_threshold = 20;

        for entry in 0..4u8 {
            queue.push_back(&[entry; 6]).unwrap();
        }

        // 10 delivered bytes: below threshold
        queue.pop_front().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 40);

        // 20 delivered bytes out of 40
        queue.pop_front().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 20);
        assert!(!dir.path().join("harv-rawgps.queue.head").exists());
        assert_eq!(queue.entries().unwrap(), vec![vec![2; 6], vec![3; 6]]);

        queue.push_back(&[4; 6]).unwrap();
        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(
            queue.entries().unwrap(),
            vec![vec![2; 6], vec![3; 6], vec![4; 6]]
        );
    }

    #[test]
    fn invalid_cursor_replays_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harv-posgps.queue");
        let head_path = dir.path().join("harv-posgps.queue.head");

        {
            let mut queue = DurableQueue::open(&path).unwrap();
            queue.push_back(b"first").unwrap();
            queue.push_back(b"second").unwrap();
        }

        // not on a record boundary
        fs::write(&head_path, 3u64.to_le_bytes()).unwrap();
        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);
        assert!(!head_path.exists());

        // malformed
        fs::write(&head_path, [9, 0]).unwrap();
        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);

        // at the end of the last record
        fs::write(&head_path, 19u64.to_le_bytes()).unwrap();
        let queue = DurableQueue::open(&path).unwrap();
        assert!(queue.is_empty());
        assert!(queue.front().unwrap().is_none());
    }

    #[test]
    fn length_prefix_bounds() {
        assert_eq!(record_size(0).unwrap(), 0);
        assert_eq!(record_size(u32::MAX as usize).unwrap(), u32::MAX);

        match record_size(u32::MAX as usize + 1) {
            Err(Error::Oversized { size, max }) => {
                assert_eq!(size, u32::MAX as usize + 1);
                assert_eq!(max, u32::MAX as usize);
            },
            other => panic!("unexpected {:?}", other),
        }
    }
}
