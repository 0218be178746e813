//! 1-of-N random OT with online correction, after the batched related-key
//! OPRF of Kolesnikov-Kumaresan-Rosulek-Trieu
//! (cf. <https://eprint.iacr.org/2016/799>, Figure 2).
//!
//! The receiver commits to one choice per slot through a correction word;
//! the sender can then encode every possible choice for that slot, and the
//! encodings agree exactly on the receiver's choice. Corrections stream in
//! caller-sized batches so the two sides can pipeline encoding against
//! communication. Each side keeps a blake3 transcript of all correction
//! traffic; `check` mixes in a seed and compares digests, aborting the
//! session on mismatch.
//!
//! Codewords are 512 bits wide, which leaves more than enough Hamming
//! distance for 7-bit inputs at the statistical security levels used here.

use rand::{CryptoRng, Rng, RngCore, SeedableRng};

use super::{
    cointoss_recv, cointoss_send, iknp, utils, Error, OtReceiver, OtSender, RandomOtReceiver,
    RandomOtSender,
};
use crate::aes_rng::AesRng;
use crate::block::Block;
use crate::channel::{recv_from, recv_vec_from, send_to, Channel};
use crate::crypto::PseudorandomCode;

/// Width of the code matrix in bits.
const CODE_WIDTH: usize = 512;

/// One 512-bit row of the code matrix.
type Row = [Block; 4];

fn row_from_bytes(bytes: &[u8]) -> Row {
    let mut row = [Block::ZERO; 4];
    for (block, chunk) in row.iter_mut().zip(bytes.chunks_exact(Block::BYTES)) {
        *block = Block::from_le_bytes(chunk.try_into().unwrap());
    }
    row
}

fn xor_row(a: &mut Row, b: &Row) {
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= *y;
    }
}

fn and_row(a: &mut Row, b: &Row) {
    for (x, y) in a.iter_mut().zip(b) {
        *x &= *y;
    }
}

/// Hashes slot index and row down to the 128-bit OT output.
fn hash_row(i: usize, row: &Row) -> Block {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(i as u64).to_le_bytes());
    for block in row {
        hasher.update(&block.to_le_bytes());
    }
    let mut out = [0u8; 16];
    hasher.finalize_xof().fill(&mut out);
    Block::from_le_bytes(out)
}

fn expand_columns(seeds: impl Iterator<Item = Block>, col_bytes: usize) -> Vec<u8> {
    let mut matrix = vec![0u8; CODE_WIDTH * col_bytes];
    for (j, seed) in seeds.enumerate() {
        AesRng::from_seed(seed).fill_bytes(&mut matrix[j * col_bytes..(j + 1) * col_bytes]);
    }
    matrix
}

fn rows_from_matrix(matrix: &[u8], col_bytes: usize, count: usize) -> Vec<Row> {
    let transposed = utils::transpose(matrix, CODE_WIDTH, col_bytes * 8);
    let mut rows: Vec<Row> = transposed
        .chunks_exact(CODE_WIDTH / 8)
        .map(row_from_bytes)
        .collect();
    rows.truncate(count);
    rows
}

fn validate_config(stat_sec: usize, input_bits: u32) -> Result<(), Error> {
    if input_bits == 0 || input_bits > 7 || stat_sec > 128 {
        return Err(Error::UnsupportedParameters);
    }
    Ok(())
}

/// 1-of-N OT sender: holds one encoding per slot and choice.
pub struct Sender {
    code: Option<PseudorandomCode>,
    s_mask: Row,
    rows: Vec<Row>,
    qs: Vec<Row>,
    transcript: blake3::Hasher,
}

impl Sender {
    /// Creates an unconfigured sender after validating the parameters.
    pub fn configure(stat_sec: usize, input_bits: u32) -> Result<Self, Error> {
        validate_config(stat_sec, input_bits)?;
        Ok(Self {
            code: None,
            s_mask: [Block::ZERO; 4],
            rows: vec![],
            qs: vec![],
            transcript: blake3::Hasher::new(),
        })
    }

    /// Base-OT bootstrap and column expansion for `count` slots.
    pub async fn init<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        count: usize,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<(), Error> {
        let keys = cointoss_send(channel, rng, 4).await?;
        self.code = Some(PseudorandomCode::new([keys[0], keys[1], keys[2], keys[3]]));
        let s: Vec<bool> = (0..CODE_WIDTH).map(|_| rng.gen()).collect();
        let mut ot = iknp::Receiver::init(channel, rng).await?;
        let seeds = ot.recv_random(channel, &s, rng).await?;
        let col_bytes = count.div_ceil(8);
        let matrix = expand_columns(seeds.into_iter(), col_bytes);
        self.rows = rows_from_matrix(&matrix, col_bytes, count);
        self.s_mask = row_from_bytes(&utils::boolvec_to_u8vec(&s));
        Ok(())
    }

    /// Receives the next `count` corrections from the receiver.
    pub async fn recv_correction<C: Channel>(
        &mut self,
        channel: &mut C,
        count: usize,
    ) -> Result<(), Error> {
        let us: Vec<Row> = recv_vec_from(channel, "kkrt correction", count).await?;
        for u in us {
            let i = self.qs.len();
            if i >= self.rows.len() {
                return Err(Error::InvalidLength);
            }
            for block in &u {
                self.transcript.update(&block.to_le_bytes());
            }
            let mut masked = u;
            and_row(&mut masked, &self.s_mask);
            let mut q = self.rows[i];
            xor_row(&mut q, &masked);
            self.qs.push(q);
        }
        Ok(())
    }

    /// Encodes choice `input` at slot `i`. The slot's correction must have
    /// been received.
    pub fn encode(&self, i: usize, input: u32) -> Result<Block, Error> {
        let code = self.code.as_ref().ok_or(Error::NotConfigured)?;
        let q = self.qs.get(i).ok_or(Error::MissingCorrection)?;
        let mut c = code.encode(Block::from(input as u128));
        and_row(&mut c, &self.s_mask);
        xor_row(&mut c, q);
        Ok(hash_row(i, &c))
    }

    /// Compares correction transcripts with the receiver.
    pub async fn check<C: Channel>(&mut self, channel: &mut C) -> Result<(), Error> {
        let (seed, their_digest): (Block, [u8; 32]) = recv_from(channel, "kkrt check").await?;
        self.transcript.update(&seed.to_le_bytes());
        let digest = *self.transcript.finalize().as_bytes();
        send_to(channel, "kkrt check digest", &digest).await?;
        if digest != their_digest {
            return Err(Error::ConsistencyCheckFailed);
        }
        Ok(())
    }
}

/// 1-of-N OT receiver: commits to one choice per slot.
pub struct Receiver {
    code: Option<PseudorandomCode>,
    arows: Vec<Row>,
    brows: Vec<Row>,
    pending: Vec<Row>,
    encoded: usize,
    transcript: blake3::Hasher,
}

impl Receiver {
    /// Creates an unconfigured receiver after validating the parameters.
    pub fn configure(stat_sec: usize, input_bits: u32) -> Result<Self, Error> {
        validate_config(stat_sec, input_bits)?;
        Ok(Self {
            code: None,
            arows: vec![],
            brows: vec![],
            pending: vec![],
            encoded: 0,
            transcript: blake3::Hasher::new(),
        })
    }

    /// Base-OT bootstrap and column expansion for `count` slots.
    pub async fn init<C: Channel, RNG: CryptoRng + Rng>(
        &mut self,
        count: usize,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<(), Error> {
        let keys = cointoss_recv(channel, rng, 4).await?;
        self.code = Some(PseudorandomCode::new([keys[0], keys[1], keys[2], keys[3]]));
        let mut ot = iknp::Sender::init(channel, rng).await?;
        let pairs = ot.send_random(channel, CODE_WIDTH, rng).await?;
        let col_bytes = count.div_ceil(8);
        let a_matrix = expand_columns(pairs.iter().map(|p| p[0]), col_bytes);
        let b_matrix = expand_columns(pairs.iter().map(|p| p[1]), col_bytes);
        self.arows = rows_from_matrix(&a_matrix, col_bytes, count);
        self.brows = rows_from_matrix(&b_matrix, col_bytes, count);
        Ok(())
    }

    /// Encodes choice `input` at slot `i` and buffers its correction. Slots
    /// must be encoded in order.
    pub fn encode(&mut self, i: usize, input: u32) -> Result<Block, Error> {
        let code = self.code.as_ref().ok_or(Error::NotConfigured)?;
        if i != self.encoded {
            return Err(Error::OutOfOrderEncode);
        }
        if i >= self.arows.len() {
            return Err(Error::InvalidLength);
        }
        let mut u = code.encode(Block::from(input as u128));
        xor_row(&mut u, &self.arows[i]);
        xor_row(&mut u, &self.brows[i]);
        self.pending.push(u);
        self.encoded += 1;
        Ok(hash_row(i, &self.arows[i]))
    }

    /// Sends the next `count` buffered corrections to the sender.
    pub async fn send_correction<C: Channel>(
        &mut self,
        channel: &mut C,
        count: usize,
    ) -> Result<(), Error> {
        if self.pending.len() < count {
            return Err(Error::InvalidLength);
        }
        let batch: Vec<Row> = self.pending.drain(..count).collect();
        for row in &batch {
            for block in row {
                self.transcript.update(&block.to_le_bytes());
            }
        }
        send_to(channel, "kkrt correction", &batch).await?;
        Ok(())
    }

    /// Compares correction transcripts with the sender.
    pub async fn check<C: Channel>(&mut self, channel: &mut C, seed: Block) -> Result<(), Error> {
        self.transcript.update(&seed.to_le_bytes());
        let digest = *self.transcript.finalize().as_bytes();
        send_to(channel, "kkrt check", &(seed, digest)).await?;
        let their_digest: [u8; 32] = recv_from(channel, "kkrt check digest").await?;
        if digest != their_digest {
            return Err(Error::ConsistencyCheckFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SimpleChannel;

    const N: u32 = 16;
    const SLOTS: usize = 40;
    const STRIDE: usize = 16;

    async fn run_sender(channel: &mut impl Channel) -> Vec<Vec<Block>> {
        let mut rng = AesRng::new();
        let mut sender = Sender::configure(40, 4).unwrap();
        sender.init(SLOTS, channel, &mut rng).await.unwrap();
        let mut done = 0;
        let mut out = Vec::with_capacity(SLOTS);
        while done < SLOTS {
            let batch = (SLOTS - done).min(STRIDE);
            sender.recv_correction(channel, batch).await.unwrap();
            for i in done..done + batch {
                out.push((0..N).map(|k| sender.encode(i, k).unwrap()).collect());
            }
            done += batch;
        }
        sender.check(channel).await.unwrap();
        out
    }

    #[tokio::test]
    async fn sender_encodings_match_receiver_outputs() {
        let (mut a, mut b) = SimpleChannel::pair();
        let sender = tokio::spawn(async move { run_sender(&mut a).await });
        let mut rng = AesRng::new();
        let mut receiver = Receiver::configure(40, 4).unwrap();
        receiver.init(SLOTS, &mut b, &mut rng).await.unwrap();
        let mut choices = Vec::with_capacity(SLOTS);
        let mut outputs = Vec::with_capacity(SLOTS);
        let mut done = 0;
        while done < SLOTS {
            let batch = (SLOTS - done).min(STRIDE);
            for i in done..done + batch {
                let choice = rng.gen_range(0..N);
                outputs.push(receiver.encode(i, choice).unwrap());
                choices.push(choice);
            }
            receiver.send_correction(&mut b, batch).await.unwrap();
            done += batch;
        }
        receiver.check(&mut b, rng.gen()).await.unwrap();
        let encodings = sender.await.unwrap();
        for i in 0..SLOTS {
            assert_eq!(encodings[i][choices[i] as usize], outputs[i]);
            for k in 0..N {
                if k != choices[i] {
                    assert_ne!(encodings[i][k as usize], outputs[i]);
                }
            }
        }
    }

    /// Channel wrapper flipping one byte of the `flip_msg`-th outgoing
    /// message.
    struct Tamper<C> {
        inner: C,
        flip_msg: usize,
        sent: usize,
    }

    impl<C: Channel> Channel for Tamper<C> {
        type Error = C::Error;

        async fn send_bytes(&mut self, mut msg: Vec<u8>) -> Result<(), Self::Error> {
            if self.sent == self.flip_msg {
                let last = msg.len() - 1;
                msg[last] ^= 1;
            }
            self.sent += 1;
            self.inner.send_bytes(msg).await
        }

        async fn recv_bytes(&mut self) -> Result<Vec<u8>, Self::Error> {
            self.inner.recv_bytes().await
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            self.inner.flush().await
        }

        fn bytes_sent(&self) -> u64 {
            self.inner.bytes_sent()
        }

        fn bytes_received(&self) -> u64 {
            self.inner.bytes_received()
        }
    }

    #[tokio::test]
    async fn tampered_correction_fails_check() {
        let (mut a, b) = SimpleChannel::pair();
        let sender = tokio::spawn(async move {
            let mut rng = AesRng::new();
            let mut sender = Sender::configure(40, 4).unwrap();
            sender.init(SLOTS, &mut a, &mut rng).await.unwrap();
            let mut done = 0;
            while done < SLOTS {
                let batch = (SLOTS - done).min(STRIDE);
                sender.recv_correction(&mut a, batch).await.unwrap();
                done += batch;
            }
            sender.check(&mut a).await
        });
        // The receiver's sends are: cointoss seeds, base-OT pks, then the
        // correction batches. Flip a byte in the first correction batch.
        let mut channel = Tamper {
            inner: b,
            flip_msg: 2,
            sent: 0,
        };
        let mut rng = AesRng::new();
        let mut receiver = Receiver::configure(40, 4).unwrap();
        receiver.init(SLOTS, &mut channel, &mut rng).await.unwrap();
        let mut done = 0;
        while done < SLOTS {
            let batch = (SLOTS - done).min(STRIDE);
            for i in done..done + batch {
                receiver.encode(i, rng.gen_range(0..N)).unwrap();
            }
            receiver.send_correction(&mut channel, batch).await.unwrap();
            done += batch;
        }
        let receiver_check = receiver.check(&mut channel, rng.gen()).await;
        assert!(matches!(
            receiver_check,
            Err(Error::ConsistencyCheckFailed)
        ));
        assert!(matches!(
            sender.await.unwrap(),
            Err(Error::ConsistencyCheckFailed)
        ));
    }
}
