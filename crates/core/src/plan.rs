//! Space-aware chunk distribution planner.
//!
//! Maps a byte length onto an ordered list of (drive, size) assignments.
//! Entries sum exactly to the file size, fit within each drive's free
//! space, and carry dense 1-based chunk ids with prefix-sum offsets.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How to split a file across drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fill the largest drive first.
    Greedy,
    /// Even split, last drive absorbs the remainder.
    Balanced,
    /// Proportional to each drive's free space.
    Proportional,
    /// User-supplied per-drive sizes.
    Manual,
}

/// Available space on one linked drive, as reported by the gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveSpace {
    pub account_id: Uuid,
    pub display_name: String,
    /// Bytes.
    pub total_space: i64,
    /// Bytes.
    pub used_space: i64,
    /// Bytes.
    pub free_space: i64,
    /// Whether this drive can currently be used.
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One planned assignment. Ephemeral: holds only during a single finalize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunk_id: u32,
    pub drive_account_id: Uuid,
    pub size: u64,
    pub start_offset: u64,
    pub end_offset: u64,
}

/// Compute a chunk plan for `file_size` bytes across the given drives.
///
/// Drives marked unavailable or without free space are filtered out up
/// front; the plan fails if nothing remains or total free space is short.
pub fn calculate_plan(
    file_size: u64,
    drive_spaces: &[DriveSpace],
    strategy: ChunkingStrategy,
    manual_sizes: Option<&[u64]>,
) -> Result<Vec<ChunkPlan>> {
    if file_size == 0 {
        return Err(Error::Plan("file size must be positive".into()));
    }

    let available: Vec<&DriveSpace> = drive_spaces
        .iter()
        .filter(|d| d.available && d.free_space > 0)
        .collect();

    if available.is_empty() {
        return Err(Error::Plan("no available drives".into()));
    }

    let total_available: u64 = available.iter().map(|d| d.free_space as u64).sum();
    if total_available < file_size {
        return Err(Error::InsufficientSpace {
            needed: file_size,
            available: total_available,
        });
    }

    let assignments = match strategy {
        ChunkingStrategy::Greedy => greedy_plan(file_size, &available)?,
        ChunkingStrategy::Balanced => balanced_plan(file_size, &available)?,
        ChunkingStrategy::Proportional => proportional_plan(file_size, &available)?,
        ChunkingStrategy::Manual => {
            let sizes = manual_sizes
                .ok_or_else(|| Error::Plan("manual strategy requires chunk sizes".into()))?;
            manual_plan(file_size, &available, sizes)?
        }
    };

    Ok(number_chunks(assignments))
}

/// Turn (drive, size) assignments into numbered plan entries, dropping
/// zero-size assignments and computing offsets by prefix sum.
fn number_chunks(assignments: Vec<(Uuid, u64)>) -> Vec<ChunkPlan> {
    let mut chunks = Vec::with_capacity(assignments.len());
    let mut offset = 0u64;
    let mut chunk_id = 1u32;

    for (drive_account_id, size) in assignments {
        if size == 0 {
            continue;
        }
        chunks.push(ChunkPlan {
            chunk_id,
            drive_account_id,
            size,
            start_offset: offset,
            end_offset: offset + size,
        });
        offset += size;
        chunk_id += 1;
    }

    chunks
}

/// Largest drive first, each consuming min(remaining, free).
fn greedy_plan(file_size: u64, drives: &[&DriveSpace]) -> Result<Vec<(Uuid, u64)>> {
    let mut sorted: Vec<&DriveSpace> = drives.to_vec();
    sorted.sort_by(|a, b| b.free_space.cmp(&a.free_space));

    let mut assignments = Vec::new();
    let mut remaining = file_size;

    for drive in sorted {
        if remaining == 0 {
            break;
        }
        let size = remaining.min(drive.free_space as u64);
        assignments.push((drive.account_id, size));
        remaining -= size;
    }

    if remaining > 0 {
        return Err(Error::Plan(format!(
            "failed to allocate all chunks, {remaining} bytes remaining"
        )));
    }

    Ok(assignments)
}

/// Even split in input drive order; the last drive absorbs the remainder.
/// Falls back to greedy on the same drive list when any assignment exceeds
/// its drive's free space.
fn balanced_plan(file_size: u64, drives: &[&DriveSpace]) -> Result<Vec<(Uuid, u64)>> {
    let count = drives.len() as u64;
    let target = file_size / count;

    let mut assignments = Vec::with_capacity(drives.len());
    let mut remaining = file_size;

    for (i, drive) in drives.iter().enumerate() {
        let size = if i as u64 == count - 1 { remaining } else { target };
        if size > drive.free_space as u64 {
            return greedy_plan(file_size, drives);
        }
        assignments.push((drive.account_id, size));
        remaining -= size;
    }

    Ok(assignments)
}

/// Split proportional to free space; the last drive absorbs rounding
/// residue. Errors rather than redistributing if clamping leaves a
/// shortfall.
fn proportional_plan(file_size: u64, drives: &[&DriveSpace]) -> Result<Vec<(Uuid, u64)>> {
    let total_space: u64 = drives.iter().map(|d| d.free_space as u64).sum();

    let mut assignments = Vec::with_capacity(drives.len());
    let mut allocated = 0u64;

    for (i, drive) in drives.iter().enumerate() {
        let free = drive.free_space as u64;
        let mut size = if i == drives.len() - 1 {
            file_size - allocated
        } else {
            ((file_size as u128 * free as u128) / total_space as u128) as u64
        };
        size = size.min(free);

        assignments.push((drive.account_id, size));
        allocated += size;
    }

    if allocated < file_size {
        return Err(Error::Plan(format!(
            "failed to allocate all chunks, {} bytes short",
            file_size - allocated
        )));
    }

    Ok(assignments)
}

/// User-supplied sizes: one per drive, each within its drive's free space,
/// summing exactly to the file size.
fn manual_plan(
    file_size: u64,
    drives: &[&DriveSpace],
    sizes: &[u64],
) -> Result<Vec<(Uuid, u64)>> {
    if sizes.len() != drives.len() {
        return Err(Error::Plan(format!(
            "number of manual sizes ({}) must match number of drives ({})",
            sizes.len(),
            drives.len()
        )));
    }

    let mut total = 0u64;
    for (i, (&size, drive)) in sizes.iter().zip(drives).enumerate() {
        if size > drive.free_space as u64 {
            return Err(Error::Plan(format!(
                "chunk {} size {} exceeds drive capacity {}",
                i + 1,
                size,
                drive.free_space
            )));
        }
        total += size;
    }

    if total != file_size {
        return Err(Error::Plan(format!(
            "sum of manual sizes ({total}) does not match file size ({file_size})"
        )));
    }

    Ok(sizes
        .iter()
        .zip(drives)
        .map(|(&size, drive)| (drive.account_id, size))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: i64 = 1024 * 1024 * 1024;
    const MIB: i64 = 1024 * 1024;

    fn drive(free: i64) -> DriveSpace {
        DriveSpace {
            account_id: Uuid::new_v4(),
            display_name: "Google Drive".to_string(),
            total_space: free * 2,
            used_space: free,
            free_space: free,
            available: true,
            error: None,
        }
    }

    fn assert_invariants(plan: &[ChunkPlan], file_size: u64, drives: &[DriveSpace]) {
        let total: u64 = plan.iter().map(|c| c.size).sum();
        assert_eq!(total, file_size, "chunk sizes must sum to file size");

        let mut offset = 0u64;
        for (i, chunk) in plan.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i as u32 + 1, "ids must be dense from 1");
            assert!(chunk.size > 0, "no zero-size entries");
            assert_eq!(chunk.start_offset, offset, "offsets must be contiguous");
            assert_eq!(chunk.end_offset, chunk.start_offset + chunk.size);
            offset = chunk.end_offset;

            let drive = drives
                .iter()
                .find(|d| d.account_id == chunk.drive_account_id)
                .expect("chunk references a known drive");
            assert!(chunk.size <= drive.free_space as u64, "chunk must fit its drive");
        }
    }

    #[test]
    fn test_balanced_two_drives() {
        let drives = vec![drive(10 * GIB), drive(10 * GIB)];
        let plan = calculate_plan(1000, &drives, ChunkingStrategy::Balanced, None).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[0],
            ChunkPlan {
                chunk_id: 1,
                drive_account_id: drives[0].account_id,
                size: 500,
                start_offset: 0,
                end_offset: 500,
            }
        );
        assert_eq!(
            plan[1],
            ChunkPlan {
                chunk_id: 2,
                drive_account_id: drives[1].account_id,
                size: 500,
                start_offset: 500,
                end_offset: 1000,
            }
        );
        assert_invariants(&plan, 1000, &drives);
    }

    #[test]
    fn test_balanced_preserves_input_order() {
        let drives = vec![drive(GIB), drive(10 * GIB), drive(GIB)];
        let plan = calculate_plan(900, &drives, ChunkingStrategy::Balanced, None).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].drive_account_id, drives[0].account_id);
        assert_eq!(plan[1].drive_account_id, drives[1].account_id);
        assert_eq!(plan[2].drive_account_id, drives[2].account_id);
        assert_invariants(&plan, 900, &drives);
    }

    #[test]
    fn test_balanced_falls_back_to_greedy() {
        // Target per drive is 700 but the first drive only holds 100, so
        // the plan degrades to greedy over the same drive list.
        let drives = vec![drive(100), drive(2000)];
        let plan = calculate_plan(1400, &drives, ChunkingStrategy::Balanced, None).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].drive_account_id, drives[1].account_id);
        assert_eq!(plan[0].size, 1400);
        assert_invariants(&plan, 1400, &drives);
    }

    #[test]
    fn test_greedy_spillover() {
        let drives = vec![drive(GIB), drive(500 * MIB), drive(10 * GIB)];
        let file_size = (14 * GIB / 10) as u64; // 1.4 GiB
        let plan = calculate_plan(file_size, &drives, ChunkingStrategy::Greedy, None).unwrap();

        // Sorted descending, the 10 GiB drive swallows the whole file.
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].drive_account_id, drives[2].account_id);
        assert_eq!(plan[0].size, file_size);
        assert_invariants(&plan, file_size, &drives);
    }

    #[test]
    fn test_greedy_spans_drives() {
        let drives = vec![drive(1000), drive(600)];
        let plan = calculate_plan(1400, &drives, ChunkingStrategy::Greedy, None).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].size, 1000);
        assert_eq!(plan[1].size, 400);
        assert_invariants(&plan, 1400, &drives);
    }

    #[test]
    fn test_proportional_allocates_exactly() {
        let drives = vec![drive(3000), drive(1000)];
        let plan = calculate_plan(1000, &drives, ChunkingStrategy::Proportional, None).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].size, 750);
        assert_eq!(plan[1].size, 250);
        assert_invariants(&plan, 1000, &drives);
    }

    #[test]
    fn test_proportional_residue_goes_to_last_drive() {
        let drives = vec![drive(1000), drive(1000), drive(1000)];
        let plan = calculate_plan(1000, &drives, ChunkingStrategy::Proportional, None).unwrap();

        // 333 + 333 + 334
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[2].size, 334);
        assert_invariants(&plan, 1000, &drives);
    }

    #[test]
    fn test_manual_exact() {
        let drives = vec![drive(200), drive(200)];
        let plan =
            calculate_plan(100, &drives, ChunkingStrategy::Manual, Some(&[60, 40])).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].size, 60);
        assert_eq!(plan[1].size, 40);
        assert_invariants(&plan, 100, &drives);
    }

    #[test]
    fn test_manual_sum_mismatch_rejected() {
        let drives = vec![drive(200), drive(200)];
        let err = calculate_plan(100, &drives, ChunkingStrategy::Manual, Some(&[60, 30]))
            .unwrap_err();
        assert!(err.to_string().contains("does not match file size"));
    }

    #[test]
    fn test_manual_zero_entries_omitted_and_renumbered() {
        let drives = vec![drive(200), drive(200), drive(200)];
        let plan =
            calculate_plan(100, &drives, ChunkingStrategy::Manual, Some(&[60, 0, 40])).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].chunk_id, 1);
        assert_eq!(plan[1].chunk_id, 2);
        assert_eq!(plan[1].drive_account_id, drives[2].account_id);
        assert_invariants(&plan, 100, &drives);
    }

    #[test]
    fn test_manual_over_capacity_rejected() {
        let drives = vec![drive(50), drive(200)];
        let err = calculate_plan(100, &drives, ChunkingStrategy::Manual, Some(&[60, 40]))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds drive capacity"));
    }

    #[test]
    fn test_manual_length_mismatch_rejected() {
        let drives = vec![drive(200), drive(200)];
        let err =
            calculate_plan(100, &drives, ChunkingStrategy::Manual, Some(&[100])).unwrap_err();
        assert!(err.to_string().contains("must match number of drives"));
    }

    #[test]
    fn test_insufficient_space_rejected_for_all_strategies() {
        let drives = vec![drive(3), drive(6)];
        for strategy in [
            ChunkingStrategy::Greedy,
            ChunkingStrategy::Balanced,
            ChunkingStrategy::Proportional,
            ChunkingStrategy::Manual,
        ] {
            let err = calculate_plan(10, &drives, strategy, Some(&[5, 5])).unwrap_err();
            assert!(
                matches!(err, Error::InsufficientSpace { needed: 10, available: 9 }),
                "strategy {strategy:?} must reject on total space"
            );
        }
    }

    #[test]
    fn test_unavailable_drives_filtered() {
        let mut offline = drive(10 * GIB);
        offline.available = false;
        let mut empty = drive(0);
        empty.free_space = 0;
        let online = drive(GIB);

        let drives = vec![offline, empty, online.clone()];
        let plan = calculate_plan(1000, &drives, ChunkingStrategy::Greedy, None).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].drive_account_id, online.account_id);
    }

    #[test]
    fn test_no_available_drives_rejected() {
        let mut d = drive(GIB);
        d.available = false;
        let err = calculate_plan(10, &[d], ChunkingStrategy::Greedy, None).unwrap_err();
        assert!(err.to_string().contains("no available drives"));
    }

    #[test]
    fn test_strategy_serde_tags() {
        assert_eq!(
            serde_json::to_string(&ChunkingStrategy::Proportional).unwrap(),
            "\"proportional\""
        );
        let s: ChunkingStrategy = serde_json::from_str("\"greedy\"").unwrap();
        assert_eq!(s, ChunkingStrategy::Greedy);
    }
}
