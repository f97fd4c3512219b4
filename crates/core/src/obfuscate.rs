//! Deterministic noise-injection codec.
//!
//! The forward transform streams the input to the output, inserting
//! pseudo-random noise blocks at offsets derived from a ChaCha20 keystream
//! seeded with a single-use 32-byte seed. The inverse recomputes the same
//! offsets from the seed and strips the blocks, restoring the original
//! stream bit-for-bit. The only extra quantity the inverse needs is the
//! original length, carried in the key file.
//!
//! This is not a cipher: it resists casual inspection of any single chunk,
//! not a determined adversary.

use crate::keyfile::ObfuscationMetadata;
use crate::{Error, Result};
use base64::Engine;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::RngCore;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Length of an obfuscation seed in bytes.
pub const SEED_LEN: usize = 32;

/// Stream copy buffer size.
const COPY_BUF_SIZE: usize = 32 * 1024;

/// Identifier of the noise-derivation algorithm recorded in key files.
pub const ALGORITHM: &str = "ChaCha20-DRBG";

/// A 32-byte obfuscation seed, single-use per file.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Generate a fresh random seed from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SEED_LEN] = bytes.try_into().map_err(|_| Error::InvalidSeed {
            expected: SEED_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Decode from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| Error::Obfuscation(format!("failed to decode seed: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print seed material.
        write!(f, "Seed(..)")
    }
}

/// Codec parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObfuscationParams {
    /// Noise block size in bytes.
    pub block_size: u32,
    /// Target overhead as a percentage of the original size.
    pub overhead_pct: f64,
    /// Minimum distance kept between the last candidate offset and EOF.
    pub min_gap: u64,
}

impl Default for ObfuscationParams {
    fn default() -> Self {
        Self {
            block_size: 256,
            overhead_pct: 8.0,
            min_gap: 4096,
        }
    }
}

impl ObfuscationParams {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidParams("block_size must be positive".into()));
        }
        if self.overhead_pct <= 0.0 || !self.overhead_pct.is_finite() {
            return Err(Error::InvalidParams(format!(
                "overhead_pct must be a positive number, got {}",
                self.overhead_pct
            )));
        }
        Ok(())
    }

    /// Number of noise blocks injected for an input of `original_size` bytes.
    ///
    /// `k = max(1, ⌊original_size · overhead_pct / 100⌋ / block_size)`.
    pub fn injection_count(&self, original_size: u64) -> u64 {
        let target = (original_size as f64 * (self.overhead_pct / 100.0)) as u64;
        (target / u64::from(self.block_size)).max(1)
    }

    /// Output length of the forward transform for an input of `original_size`.
    pub fn processed_size(&self, original_size: u64) -> u64 {
        original_size + self.injection_count(original_size) * u64::from(self.block_size)
    }
}

/// Deterministic keystream over ChaCha20.
///
/// The nonce is fixed all-zero: the seed is single-use per file, so the
/// (key, nonce) pair never repeats.
struct KeyStream(ChaCha20);

impl KeyStream {
    fn new(seed: &Seed) -> Self {
        let nonce = [0u8; 12];
        let key = chacha20::Key::from_slice(seed.as_bytes());
        Self(ChaCha20::new(key, chacha20::Nonce::from_slice(&nonce)))
    }

    /// Fill `buf` with the next keystream bytes.
    fn fill(&mut self, buf: &mut [u8]) {
        buf.fill(0);
        self.0.apply_keystream(buf);
    }
}

/// Derive the sorted logical injection offsets.
///
/// Consumes exactly `8 · count` keystream bytes, interpreted as big-endian
/// u64 values reduced modulo `max(1, original_size − min_gap)`. Offsets are
/// in pre-obfuscation coordinates; duplicates are retained.
fn injection_offsets(ks: &mut KeyStream, original_size: u64, count: u64, min_gap: u64) -> Vec<u64> {
    let mut raw = vec![0u8; (count as usize) * 8];
    ks.fill(&mut raw);

    let modulus = original_size.saturating_sub(min_gap).max(1);
    let mut offsets: Vec<u64> = raw
        .chunks_exact(8)
        .map(|c| u64::from_be_bytes(c.try_into().expect("8-byte chunk")) % modulus)
        .collect();
    offsets.sort_unstable();
    offsets
}

/// Convert logical offsets to post-obfuscation coordinates.
///
/// Every earlier injection shifts downstream bytes by one full block, so
/// `adjusted[i] = logical[i] + i · block_size`. Sound for sorted offsets
/// including duplicates: two injections at the same logical point become
/// two consecutive noise blocks.
fn adjust_offsets(logical: &[u64], block_size: u32) -> Vec<u64> {
    logical
        .iter()
        .enumerate()
        .map(|(i, off)| off + (i as u64) * u64::from(block_size))
        .collect()
}

/// Copy exactly `n` bytes from reader to writer.
fn copy_exact<R: Read, W: Write>(reader: &mut R, writer: &mut W, mut n: u64) -> Result<()> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    while n > 0 {
        let want = (n as usize).min(COPY_BUF_SIZE);
        let got = reader.read(&mut buf[..want])?;
        if got == 0 {
            return Err(Error::Obfuscation(format!(
                "unexpected end of input, {n} bytes missing"
            )));
        }
        writer.write_all(&buf[..got])?;
        n -= got as u64;
    }
    Ok(())
}

/// Read and discard exactly `n` bytes.
fn skip_exact<R: Read>(reader: &mut R, mut n: u64) -> Result<()> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    while n > 0 {
        let want = (n as usize).min(COPY_BUF_SIZE);
        let got = reader.read(&mut buf[..want])?;
        if got == 0 {
            return Err(Error::Obfuscation(format!(
                "unexpected end of input while skipping noise, {n} bytes missing"
            )));
        }
        n -= got as u64;
    }
    Ok(())
}

/// Stream the input to the output, emitting a noise block before the byte at
/// each logical offset. Offsets beyond the input are appended at the tail.
fn inject_noise<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    original_size: u64,
    offsets: &[u64],
    ks: &mut KeyStream,
    block_size: u32,
) -> Result<u64> {
    let mut noise = vec![0u8; block_size as usize];
    let mut pos = 0u64;
    let mut written = 0u64;

    for &offset in offsets {
        let offset = offset.min(original_size);
        copy_exact(reader, writer, offset - pos)?;
        written += offset - pos;
        pos = offset;

        ks.fill(&mut noise);
        writer.write_all(&noise)?;
        written += u64::from(block_size);
    }

    copy_exact(reader, writer, original_size - pos)?;
    written += original_size - pos;
    writer.flush()?;
    Ok(written)
}

/// Stream the obfuscated input to the output, skipping one block at each
/// adjusted offset.
fn strip_noise<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    processed_size: u64,
    adjusted: &[u64],
    block_size: u32,
) -> Result<()> {
    let mut pos = 0u64;

    for &offset in adjusted {
        copy_exact(reader, writer, offset - pos)?;
        skip_exact(reader, u64::from(block_size))?;
        pos = offset + u64::from(block_size);
    }

    copy_exact(reader, writer, processed_size - pos)?;
    writer.flush()?;
    Ok(())
}

/// Forward transform over streams. Returns the number of bytes emitted,
/// always `original_size + k · block_size`.
pub fn obfuscate<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    original_size: u64,
    seed: &Seed,
    params: &ObfuscationParams,
) -> Result<u64> {
    params.validate()?;
    if original_size == 0 {
        return Err(Error::InvalidParams("original size must be positive".into()));
    }

    let mut ks = KeyStream::new(seed);
    let count = params.injection_count(original_size);
    let offsets = injection_offsets(&mut ks, original_size, count, params.min_gap);
    inject_noise(reader, writer, original_size, &offsets, &mut ks, params.block_size)
}

/// Inverse transform over streams.
///
/// Fails if `processed_size < original_size` or the difference is not a
/// multiple of the block size.
pub fn deobfuscate<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    original_size: u64,
    processed_size: u64,
    seed: &Seed,
    params: &ObfuscationParams,
) -> Result<()> {
    params.validate()?;
    if original_size == 0 {
        return Err(Error::InvalidParams("original size must be positive".into()));
    }
    if processed_size < original_size {
        return Err(Error::Obfuscation(format!(
            "original size {original_size} exceeds processed size {processed_size}"
        )));
    }

    let noise_bytes = processed_size - original_size;
    let block = u64::from(params.block_size);
    if noise_bytes % block != 0 {
        return Err(Error::Obfuscation(format!(
            "noise bytes ({noise_bytes}) not aligned to block size ({block})"
        )));
    }

    let count = noise_bytes / block;
    if count == 0 {
        return copy_exact(reader, writer, processed_size).and_then(|()| Ok(writer.flush()?));
    }

    let mut ks = KeyStream::new(seed);
    let logical = injection_offsets(&mut ks, original_size, count, params.min_gap);
    let adjusted = adjust_offsets(&logical, params.block_size);
    strip_noise(reader, writer, processed_size, &adjusted, params.block_size)
}

/// Obfuscate a file on disk.
///
/// Returns the key-file metadata block and the processed size. A partial
/// output file is removed on error.
pub fn obfuscate_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    seed: &Seed,
    params: &ObfuscationParams,
) -> Result<(ObfuscationMetadata, u64)> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let original_size = fs::metadata(input_path)?.len();
    let mut reader = BufReader::new(fs::File::open(input_path)?);
    let mut writer = BufWriter::new(fs::File::create(output_path)?);

    match obfuscate(&mut reader, &mut writer, original_size, seed, params) {
        Ok(processed_size) => Ok((
            ObfuscationMetadata {
                algorithm: ALGORITHM.to_string(),
                seed_b64: seed.to_base64(),
                block_size: params.block_size,
                overhead_pct: params.overhead_pct,
                min_gap: params.min_gap,
            },
            processed_size,
        )),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

/// Invert a file on disk using the key-file metadata block.
///
/// A partial output file is removed on error.
pub fn deobfuscate_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    metadata: &ObfuscationMetadata,
    original_size: u64,
) -> Result<()> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let seed = Seed::from_base64(&metadata.seed_b64)?;
    let params = ObfuscationParams {
        block_size: metadata.block_size,
        overhead_pct: metadata.overhead_pct,
        min_gap: metadata.min_gap,
    };

    let processed_size = fs::metadata(input_path)?.len();
    let mut reader = BufReader::new(fs::File::open(input_path)?);
    let mut writer = BufWriter::new(fs::File::create(output_path)?);

    match deobfuscate(
        &mut reader,
        &mut writer,
        original_size,
        processed_size,
        &seed,
        &params,
    ) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}
