// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Winner index derivation.
//!
//! The seed comes from public block data, so anyone who can see the block
//! being built can compute the winner before the draw executes. This is
//! pseudo-randomness for fairness between honest callers only.

use linera_sdk::linera_base_types::{BlockHeight, ChainId, Timestamp};
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::error::LotteryError;

/// Supplies the public seed material for a draw.
pub trait EntropySource {
    fn seed_material(&self) -> Result<Vec<u8>, LotteryError>;
}

/// Seed material taken from the block executing the draw.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlockEntropy {
    pub chain_id: ChainId,
    pub block_height: BlockHeight,
    pub timestamp: Timestamp,
}

impl EntropySource for BlockEntropy {
    fn seed_material(&self) -> Result<Vec<u8>, LotteryError> {
        bincode::serialize(self).map_err(|e| LotteryError::EntropyUnavailable(e.to_string()))
    }
}

/// Keccak-256 of `material || player_count`, first 16 bytes read as a little-endian `u128`.
pub fn derive_seed(material: &[u8], player_count: u64) -> u128 {
    let mut hasher = Keccak256::new();
    hasher.update(material);
    hasher.update(player_count.to_le_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_le_bytes(head)
}

/// Index of the winning entry among `player_count` entries.
pub fn select_index(seed: u128, player_count: u64) -> usize {
    debug_assert!(player_count > 0);
    (seed % u128::from(player_count)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = "e476187f6ddfeb9d588c7b45d3df334d5501d6499b3f9ad5595cae86cce16a65";

    fn block(height: u64, micros: u64) -> BlockEntropy {
        BlockEntropy {
            chain_id: CHAIN.parse().expect("valid chain id"),
            block_height: BlockHeight(height),
            timestamp: Timestamp::from(micros),
        }
    }

    #[test]
    fn same_block_gives_same_seed() {
        let material = block(7, 1_000).seed_material().unwrap();
        assert_eq!(derive_seed(&material, 5), derive_seed(&material, 5));
    }

    #[test]
    fn seed_depends_on_block_and_player_count() {
        let first = block(7, 1_000).seed_material().unwrap();
        let second = block(8, 1_000).seed_material().unwrap();
        assert_ne!(derive_seed(&first, 5), derive_seed(&second, 5));
        assert_ne!(derive_seed(&first, 5), derive_seed(&first, 6));
    }

    #[test]
    fn selected_index_is_in_range() {
        for height in 0..50 {
            let material = block(height, height * 13).seed_material().unwrap();
            for count in 1..=12u64 {
                let index = select_index(derive_seed(&material, count), count);
                assert!((index as u64) < count);
            }
        }
    }
}
