//! free - учёт свободного пространства (allocation tracker).
//!
//! - FreeTracker - граница с трекером аллокаций: salvage сообщает сюда каждый
//!   отвергнутый allocation unit, а при неуспешном завершении просит всё забыть.
//! - ExtentList - трекер по умолчанию: упорядоченный список экстентов в памяти,
//!   смежные/перекрывающиеся диапазоны сливаются.
//!
//! Сохранение на диск (save/load) - отдельный side-файл, формат (LE):
//! - Header (16 B): [magic8="BSFREE01"][ver u32=1][count u32]
//! - Tail: count x [offset u64][len u64], по возрастанию offset.
//! Запись атомарная: tmp+rename (как у meta).
//!
//! Примечание:
//! - Однопоточный API; синхронизация - на уровне владельца Block.

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::consts::{FREE_EXT, FREE_HDR_SIZE, FREE_MAGIC, FREE_VER};

/// Приёмник освобождённых диапазонов.
pub trait FreeTracker {
    /// Пометить [offset, offset+len) как свободный. Носит рекомендательный характер.
    fn report_free(&mut self, offset: u64, len: u64) -> Result<()>;

    /// Выбросить всё накопленное (неуспешный salvage).
    fn discard_all(&mut self);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtentList {
    // offset -> len; экстенты не пересекаются и не соприкасаются.
    extents: BTreeMap<u64, u64>,
}

impl ExtentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить диапазон со слиянием соседей.
    pub fn insert(&mut self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let mut start = offset;
        let mut end = offset
            .checked_add(len)
            .ok_or_else(|| anyhow!("free extent {}+{} overflows u64", offset, len))?;

        // Левый сосед, который касается/перекрывает начало.
        if let Some((&o, &l)) = self.extents.range(..=start).next_back() {
            if o + l >= start {
                start = o;
                end = end.max(o + l);
                self.extents.remove(&o);
            }
        }
        // Все экстенты, начинающиеся внутри [start, end].
        let swallowed: Vec<u64> = self.extents.range(start..=end).map(|(&o, _)| o).collect();
        for o in swallowed {
            if let Some(l) = self.extents.remove(&o) {
                end = end.max(o + l);
            }
        }
        self.extents.insert(start, end - start);
        Ok(())
    }

    /// Экстенты по возрастанию offset.
    pub fn extents(&self) -> Vec<(u64, u64)> {
        self.extents.iter().map(|(&o, &l)| (o, l)).collect()
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Суммарный объём свободного места.
    pub fn total_bytes(&self) -> u64 {
        self.extents.values().sum()
    }

    /// Попадает ли offset в какой-либо экстент.
    pub fn contains(&self, offset: u64) -> bool {
        self.extents
            .range(..=offset)
            .next_back()
            .map(|(&o, &l)| offset < o + l)
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.extents.clear();
    }

    /// Сохранить список в side-файл (tmp+rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = tmp_path(path);
        let _ = fs::remove_file(&tmp); // best‑effort

        {
            let f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)
                .with_context(|| format!("open free tmp {}", tmp.display()))?;
            let mut w = BufWriter::new(f);
            w.write_all(FREE_MAGIC)?;
            w.write_u32::<LittleEndian>(FREE_VER)?;
            w.write_u32::<LittleEndian>(self.extents.len() as u32)?;
            for (&o, &l) in &self.extents {
                w.write_u64::<LittleEndian>(o)?;
                w.write_u64::<LittleEndian>(l)?;
            }
            let f = w
                .into_inner()
                .map_err(|e| anyhow!("flush free tmp {}: {}", tmp.display(), e))?;
            f.sync_all()?;
        }

        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    /// Загрузить список из side-файла (с проверкой заголовка).
    pub fn load(path: &Path) -> Result<Self> {
        let f = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open free {}", path.display()))?;
        let len = f.metadata()?.len();
        let mut r = BufReader::new(f);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != FREE_MAGIC {
            return Err(anyhow!("bad FREE magic in {}", path.display()));
        }
        let ver = r.read_u32::<LittleEndian>()?;
        if ver != FREE_VER {
            return Err(anyhow!(
                "unsupported FREE version {} in {}",
                ver,
                path.display()
            ));
        }
        let count = r.read_u32::<LittleEndian>()? as u64;
        let need = FREE_HDR_SIZE as u64 + count * 16;
        if len != need {
            return Err(anyhow!(
                "free file {} length {} does not match count {} (need {})",
                path.display(),
                len,
                count,
                need
            ));
        }

        let mut list = Self::new();
        for _ in 0..count {
            let o = r.read_u64::<LittleEndian>()?;
            let l = r.read_u64::<LittleEndian>()?;
            list.insert(o, l)?;
        }
        Ok(list)
    }
}

impl FreeTracker for ExtentList {
    fn report_free(&mut self, offset: u64, len: u64) -> Result<()> {
        self.insert(offset, len)
    }

    fn discard_all(&mut self) {
        self.clear();
    }
}

/// Путь side-файла свободных экстентов для файла данных: `<path>.free`.
pub fn free_file_path(data_path: &Path) -> PathBuf {
    let mut s = data_path.as_os_str().to_owned();
    s.push(".");
    s.push(FREE_EXT);
    PathBuf::from(s)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_and_overlapping() {
        let mut l = ExtentList::new();
        l.insert(512, 512).unwrap();
        l.insert(1024, 512).unwrap(); // смежный справа
        l.insert(0, 512).unwrap(); // смежный слева
        assert_eq!(l.extents(), vec![(0, 1536)]);

        l.insert(4096, 512).unwrap();
        l.insert(8192, 512).unwrap();
        assert_eq!(l.len(), 3);

        // Перекрывает второй и касается третьего.
        l.insert(4000, 4192).unwrap();
        assert_eq!(l.extents(), vec![(0, 1536), (4000, 4704)]);
        assert_eq!(l.total_bytes(), 1536 + 4704);

        assert!(l.contains(0));
        assert!(l.contains(1535));
        assert!(!l.contains(1536));
        assert!(l.contains(8703));
        assert!(!l.contains(8704));
    }

    #[test]
    fn zero_len_and_overflow() {
        let mut l = ExtentList::new();
        l.insert(100, 0).unwrap();
        assert!(l.is_empty());
        assert!(l.insert(u64::MAX, 2).is_err());
    }

    #[test]
    fn discard_all_clears() {
        let mut l = ExtentList::new();
        l.report_free(512, 512).unwrap();
        l.discard_all();
        assert!(l.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("bs-free-{}-{}", std::process::id(), t));

        let mut l = ExtentList::new();
        l.insert(512, 4096).unwrap();
        l.insert(1 << 33, 8192).unwrap();
        l.save(&path).unwrap();

        let l2 = ExtentList::load(&path).unwrap();
        assert_eq!(l, l2);

        // Порча длины файла обнаруживается.
        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(FREE_HDR_SIZE as u64 + 8).unwrap();
        assert!(ExtentList::load(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
