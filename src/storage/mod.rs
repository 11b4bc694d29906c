//! Flat-file persistence for the canonical chain.
//!
//! Two directories under the node's data path: `blocks/` holds the longest
//! chain, one file per height named by a 16-hex zero-padded index, and
//! `mined/` records, per locally mined block, the 64-bit random draw that
//! produced it (64-hex hash file name, 16-hex contents).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::bits;
use crate::chain::ChainStore;
use crate::core::{Block, Hash};

pub struct Storage {
    blocks_dir: PathBuf,
    mined_dir: PathBuf,
}

impl Storage {
    /// Open (creating if needed) the storage layout under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let blocks_dir = data_dir.join("blocks");
        let mined_dir = data_dir.join("mined");
        fs::create_dir_all(&blocks_dir)
            .with_context(|| format!("creating {}", blocks_dir.display()))?;
        fs::create_dir_all(&mined_dir)
            .with_context(|| format!("creating {}", mined_dir.display()))?;
        Ok(Self { blocks_dir, mined_dir })
    }

    /// Rewrite the longest chain, one file per height.
    pub fn save_chain(&self, chain: &ChainStore) -> Result<()> {
        for (index, hash) in chain.longest_chain().iter().enumerate() {
            let block = chain.get_block(hash).expect("chain walk admitted");
            let path = self.blocks_dir.join(format!("{index:016x}"));
            fs::write(&path, bits::block_bytes(block))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        Ok(())
    }

    /// Record the winning draw for a locally mined block.
    pub fn save_mined(&self, hash: Hash, rand: u64) -> Result<()> {
        let mut be = [0u8; 32];
        hash.to_big_endian(&mut be);
        let path = self.mined_dir.join(hex::encode(be));
        fs::write(&path, format!("{rand:016x}"))
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Read the saved chain back in filename order. Fatal at startup: a
    /// corrupt chain file is not something a running node can recover from.
    pub fn load_blocks(&self) -> Result<Vec<Block>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.blocks_dir)
            .with_context(|| format!("reading {}", self.blocks_dir.display()))?
        {
            names.push(entry?.file_name());
        }
        names.sort();

        let mut blocks = Vec::with_capacity(names.len());
        for name in names {
            let path = self.blocks_dir.join(&name);
            let bytes =
                fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let block = bits::block_from_bytes(&bytes)
                .with_context(|| format!("decoding {}", path.display()))?;
            blocks.push(block);
        }
        Ok(blocks)
    }
}
