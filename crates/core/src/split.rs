//! File splitting and joining along a chunk plan.

use crate::plan::ChunkPlan;
use crate::{chunk_filename, Error, FileId, Result};
use std::fs;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const COPY_BUF_SIZE: usize = 32 * 1024;

/// Split the file at `input_path` into one chunk file per plan entry.
///
/// Each chunk is written to `output_dir/{file_id}_{chunk_id:02}.2xpfm` by
/// seeking to the entry's start offset and copying exactly its size.
/// On any error, all chunk files written so far are deleted and the error
/// is surfaced.
pub fn split_file(
    input_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    plan: &[ChunkPlan],
    file_id: &FileId,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    let mut input = fs::File::open(input_path.as_ref())?;
    let mut chunk_paths: Vec<PathBuf> = Vec::with_capacity(plan.len());

    for chunk in plan {
        let chunk_path = output_dir.join(chunk_filename(file_id, chunk.chunk_id));

        let result = write_chunk(&mut input, &chunk_path, chunk.start_offset, chunk.size);
        if let Err(e) = result {
            let _ = fs::remove_file(&chunk_path);
            for path in &chunk_paths {
                let _ = fs::remove_file(path);
            }
            return Err(e);
        }

        chunk_paths.push(chunk_path);
    }

    Ok(chunk_paths)
}

fn write_chunk(
    input: &mut fs::File,
    chunk_path: &Path,
    start_offset: u64,
    size: u64,
) -> Result<()> {
    input.seek(SeekFrom::Start(start_offset))?;
    let mut writer = BufWriter::new(fs::File::create(chunk_path)?);

    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let want = (remaining as usize).min(COPY_BUF_SIZE);
        let got = input.read(&mut buf[..want])?;
        if got == 0 {
            return Err(Error::Split(format!(
                "short read: expected {size} bytes, {remaining} missing"
            )));
        }
        writer.write_all(&buf[..got])?;
        remaining -= got as u64;
    }

    writer.flush()?;
    Ok(())
}

/// Concatenate chunk files into a single output file.
///
/// Each entry pairs a chunk path with its size as previously measured; a
/// mismatch against the on-disk length is a reconstruction error.
pub fn join_chunks(
    chunks: &[(PathBuf, u64)],
    output_path: impl AsRef<Path>,
) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(output_path.as_ref())?);

    for (i, (chunk_path, expected_size)) in chunks.iter().enumerate() {
        let actual = fs::metadata(chunk_path)
            .map_err(|e| Error::Reconstruction(format!("failed to stat chunk {}: {e}", i + 1)))?
            .len();
        if actual != *expected_size {
            return Err(Error::Reconstruction(format!(
                "chunk {} size mismatch: expected {expected_size}, found {actual}",
                i + 1
            )));
        }

        let mut reader = fs::File::open(chunk_path)
            .map_err(|e| Error::Reconstruction(format!("failed to open chunk {}: {e}", i + 1)))?;
        let written = std::io::copy(&mut reader, &mut writer)
            .map_err(|e| Error::Reconstruction(format!("failed to copy chunk {}: {e}", i + 1)))?;

        if written != *expected_size {
            return Err(Error::Reconstruction(format!(
                "chunk {} size mismatch: expected {expected_size}, wrote {written}",
                i + 1
            )));
        }
    }

    writer.flush()?;
    Ok(())
}
