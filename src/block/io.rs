//! block/io - примитивы ввода/вывода файла данных:
//! - read_at: ровно `buf.len()` байт по смещению (короткое чтение - ошибка);
//! - write_at: запись «как есть»;
//! - truncate: усечение/расширение файла (set_len);
//! - len / sync.
//!
//! Ретраев нет: ошибка ввода-вывода считается признаком более глубокой проблемы.
//! Все методы берут &self: &File реализует Read/Write/Seek.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct BlockFile {
    file: File,
    path: PathBuf,
    // fsync после write_at/truncate.
    data_fsync: bool,
}

impl BlockFile {
    /// Создать новый файл. Ошибка, если уже существует.
    pub fn create(path: &Path, data_fsync: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("create block file {}", path.display()))?;
        Ok(Self { file, path: path.to_path_buf(), data_fsync })
    }

    /// Открыть существующий файл на чтение/запись.
    pub fn open(path: &Path, data_fsync: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open block file {}", path.display()))?;
        Ok(Self { file, path: path.to_path_buf(), data_fsync })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Текущая длина файла.
    pub fn len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()))?
            .len())
    }

    /// Прочитать ровно buf.len() байт с offset.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {} in {}", offset, self.path.display()))?;
        f.read_exact(buf).with_context(|| {
            format!(
                "read {}B at offset {} in {}",
                buf.len(),
                offset,
                self.path.display()
            )
        })?;
        Ok(())
    }

    /// Записать bytes с offset (+ fsync, если включён data_fsync).
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {} in {}", offset, self.path.display()))?;
        f.write_all(bytes).with_context(|| {
            format!(
                "write {}B at offset {} in {}",
                bytes.len(),
                offset,
                self.path.display()
            )
        })?;
        if self.data_fsync {
            self.sync()?;
        }
        Ok(())
    }

    /// Установить длину файла.
    pub fn truncate(&self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .with_context(|| format!("truncate {} to {}", self.path.display(), len))?;
        if self.data_fsync {
            self.sync()?;
        }
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("fsync {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("bs-io-{}-{}-{}", name, std::process::id(), t))
    }

    #[test]
    fn write_read_truncate() {
        let p = tmp_path("rw");
        let f = BlockFile::create(&p, false).unwrap();
        f.write_at(10, b"abcdef").unwrap();
        assert_eq!(f.len().unwrap(), 16);

        let mut buf = [0u8; 3];
        f.read_at(12, &mut buf).unwrap();
        assert_eq!(&buf, b"cde");

        f.truncate(12).unwrap();
        assert_eq!(f.len().unwrap(), 12);

        // Короткое чтение у конца файла - ошибка.
        let mut big = [0u8; 8];
        assert!(f.read_at(8, &mut big).is_err());

        assert!(BlockFile::create(&p, false).is_err());
        let _ = std::fs::remove_file(&p);
    }
}
