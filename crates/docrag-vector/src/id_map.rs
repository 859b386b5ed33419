//! Position <-> chunk id table stored next to the vector index as
//! `position<TAB>chunk_id` lines, in position order.

use std::collections::HashMap;

use docrag_core::error::{Error, Result};
use docrag_core::types::ChunkId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    ids: Vec<ChunkId>,
    positions: HashMap<ChunkId, usize>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` at the next position. Positions must be pushed densely and
    /// ids must be unique.
    pub fn push(&mut self, position: usize, id: ChunkId) -> Result<()> {
        if position != self.ids.len() {
            return Err(Error::CorruptIndex(format!(
                "id map position {position} out of order, expected {}",
                self.ids.len()
            )));
        }
        if id.contains(['\t', '\n', '\r']) {
            return Err(Error::InvalidConfig(format!("chunk id {id:?} contains a tab or newline")));
        }
        if self.positions.insert(id.clone(), position).is_some() {
            return Err(Error::CorruptIndex(format!("duplicate chunk id '{id}' in id map")));
        }
        self.ids.push(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn chunk_id(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Entries in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.ids.iter().enumerate().map(|(p, id)| (p, id.as_str()))
    }

    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for (position, id) in self.iter() {
            out.push_str(&format!("{position}\t{id}\n"));
        }
        out
    }

    /// Parse a table for an index holding `index_len` vectors. Every position in
    /// `0..index_len` must appear exactly once.
    pub fn from_tsv(text: &str, index_len: usize) -> Result<Self> {
        let mut slots: Vec<Option<ChunkId>> = vec![None; index_len];
        for (line_no, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (position, id) = line.split_once('\t').ok_or_else(|| {
                Error::CorruptIndex(format!("id map line {} has no tab separator", line_no + 1))
            })?;
            let position: usize = position.trim().parse().map_err(|_| {
                Error::CorruptIndex(format!(
                    "id map line {} has a bad position {position:?}",
                    line_no + 1
                ))
            })?;
            let slot = slots.get_mut(position).ok_or_else(|| {
                Error::CorruptIndex(format!(
                    "id map references position {position}, index holds {index_len} vectors"
                ))
            })?;
            if slot.is_some() {
                return Err(Error::CorruptIndex(format!("id map lists position {position} twice")));
            }
            *slot = Some(id.to_string());
        }

        let mut map = Self::new();
        for (position, slot) in slots.into_iter().enumerate() {
            let id = slot.ok_or_else(|| {
                Error::CorruptIndex(format!("index position {position} has no id map entry"))
            })?;
            map.push(position, id)?;
        }
        Ok(map)
    }

    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(self.to_tsv().as_bytes()).as_bytes()
    }
}
