//! Single-point correlated OT from punctured GGM trees.
//!
//! The sender expands a random seed into a depth-`d` GGM tree with a
//! fixed-key two-key PRP and publishes, per level, the XOR of all left
//! children and the XOR of all right children as a 1-of-2 OT pair. A
//! receiver holding the complement of the path bits of `α` learns every
//! leaf except leaf `α`: at each level the received XOR sum minus the
//! already-known nodes yields exactly the off-path sibling.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::block::Block;

/// Fixed two-key PRP expanding one tree node into its two children.
///
/// The keys are public constants; both parties must expand identically.
pub(crate) struct TwoKeyPrp {
    aes0: Aes128,
    aes1: Aes128,
}

impl TwoKeyPrp {
    pub(crate) fn new() -> Self {
        let k0: aes::cipher::Key<Aes128> = 0u128.to_le_bytes().into();
        let k1: aes::cipher::Key<Aes128> = 1u128.to_le_bytes().into();
        Self {
            aes0: Aes128::new(&k0),
            aes1: Aes128::new(&k1),
        }
    }

    /// Expands `parent` into its `(left, right)` children.
    pub(crate) fn expand(&self, parent: Block) -> (Block, Block) {
        let mut left: aes::Block = parent.to_le_bytes().into();
        let mut right: aes::Block = parent.to_le_bytes().into();
        self.aes0.encrypt_block(&mut left);
        self.aes1.encrypt_block(&mut right);
        (
            Block::from_le_bytes(left.into()) ^ parent,
            Block::from_le_bytes(right.into()) ^ parent,
        )
    }
}

/// Sender-side GGM tree: all leaves plus one OT message pair per level.
pub(crate) struct SenderTree {
    /// The `2^depth` leaves.
    pub(crate) leaves: Vec<Block>,
    /// Per level, the XOR of all left children and of all right children.
    pub(crate) ot_msgs: Vec<[Block; 2]>,
}

pub(crate) fn sender_tree(prp: &TwoKeyPrp, seed: Block, depth: usize) -> SenderTree {
    let mut nodes = vec![seed];
    let mut ot_msgs = Vec::with_capacity(depth);
    for _ in 0..depth {
        let mut next = Vec::with_capacity(nodes.len() * 2);
        let mut sums = [Block::ZERO; 2];
        for &node in &nodes {
            let (l, r) = prp.expand(node);
            sums[0] ^= l;
            sums[1] ^= r;
            next.push(l);
            next.push(r);
        }
        ot_msgs.push(sums);
        nodes = next;
    }
    SenderTree {
        leaves: nodes,
        ot_msgs,
    }
}

/// Receiver-side reconstruction of all leaves except leaf `alpha`.
///
/// `msgs[l]` must be the OT message at index `1 − alpha_l`, where `alpha_l`
/// is the l-th path bit of `alpha`, MSB first. The punctured leaf is left
/// zero.
pub(crate) fn receiver_tree(
    prp: &TwoKeyPrp,
    alpha: usize,
    depth: usize,
    msgs: &[Block],
) -> Vec<Block> {
    debug_assert_eq!(msgs.len(), depth);
    let mut nodes = vec![Block::ZERO];
    let mut pos = 0;
    for (level, &msg) in msgs.iter().enumerate() {
        let a = (alpha >> (depth - 1 - level)) & 1;
        let side = 1 - a;
        let mut next = vec![Block::ZERO; nodes.len() * 2];
        // The received sum minus all known nodes on that side is exactly
        // the off-path sibling of the punctured node.
        let mut acc = msg;
        for (i, &node) in nodes.iter().enumerate() {
            if i == pos {
                continue;
            }
            let (l, r) = prp.expand(node);
            next[2 * i] = l;
            next[2 * i + 1] = r;
            acc ^= if side == 0 { l } else { r };
        }
        next[2 * pos + side] = acc;
        pos = 2 * pos + a;
        nodes = next;
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_recovers_all_but_alpha() {
        let prp = TwoKeyPrp::new();
        let depth = 5;
        let seed: Block = rand::random();
        let tree = sender_tree(&prp, seed, depth);
        assert_eq!(tree.leaves.len(), 1 << depth);
        for alpha in [0, 7, 19, (1 << depth) - 1] {
            let msgs: Vec<Block> = (0..depth)
                .map(|l| {
                    let a = (alpha >> (depth - 1 - l)) & 1;
                    tree.ot_msgs[l][1 - a]
                })
                .collect();
            let leaves = receiver_tree(&prp, alpha, depth, &msgs);
            for (i, leaf) in leaves.iter().enumerate() {
                if i == alpha {
                    assert_eq!(*leaf, Block::ZERO);
                } else {
                    assert_eq!(*leaf, tree.leaves[i], "leaf {i} for alpha {alpha}");
                }
            }
        }
    }
}
