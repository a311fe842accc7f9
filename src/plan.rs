//! The partition layout planner.
//!
//! Given a target disk size and a validated swap request, computes the full
//! GPT layout as an ordered list of partition specs. The order is a contract:
//! the executor creates partitions in list order, and the spec at index `i`
//! becomes partition `i + 1` on the device.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
	error::InstallError,
	filesystem::FilesystemType,
	size::{validate_swap_request, ParsedSize},
};

/// Fixed size of the EFI system partition, in MiB.
pub const EFI_SIZE_MIB: u64 = 1000;
/// Smallest root filesystem worth installing a system into, in MiB.
pub const MIN_ROOT_SIZE_MIB: u64 = 5000;
/// Disks below this cannot hold even the no-swap layout.
pub const MIN_DISK_SIZE_MIB: u64 = EFI_SIZE_MIB + MIN_ROOT_SIZE_MIB;
/// The first MiB is left free for the partition table and bootloader grain.
pub const LAYOUT_START_MIB: u64 = 1;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
	Efi,
	Swap,
	Root,
}

/// Where a partition ends. The last partition runs to the end of the disk,
/// wherever that is; everything else has an explicit boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionEnd {
	Mib(u64),
	DiskEnd,
}

impl fmt::Display for PartitionEnd {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Mib(n) => write!(f, "{}MiB", n),
			Self::DiskEnd => write!(f, "100%"),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionSpec {
	pub role: PartitionRole,
	pub filesystem: FilesystemType,
	pub start_mib: u64,
	pub end: PartitionEnd,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionPlan {
	pub partitions: Vec<PartitionSpec>,
}

impl PartitionPlan {
	pub fn has_swap(&self) -> bool {
		self.partitions
			.iter()
			.any(|p| p.role == PartitionRole::Swap)
	}

	pub fn get(&self, role: PartitionRole) -> Option<&PartitionSpec> {
		self.partitions.iter().find(|p| p.role == role)
	}

	/// 1-based on-disk partition number for a role, by plan position.
	pub fn number_of(&self, role: PartitionRole) -> Option<u32> {
		self.partitions
			.iter()
			.position(|p| p.role == role)
			.map(|i| i as u32 + 1)
	}
}

/// The fit check, performed before anything touches the disk: the fixed EFI
/// partition, the requested swap and a minimum useful root must all fit.
fn check_fit(disk_size_mib: u64, swap_mib: u64) -> Result<(), InstallError> {
	if EFI_SIZE_MIB + MIN_ROOT_SIZE_MIB + swap_mib > disk_size_mib {
		return Err(InstallError::SwapTooLarge {
			swap_mib,
			free_mib: disk_size_mib.saturating_sub(EFI_SIZE_MIB + swap_mib),
		});
	}
	Ok(())
}

/// Validate an operator-supplied swap request against both the strict size
/// format and the fit check for the chosen disk.
pub fn validate_swap(text: &str, disk_size_mib: u64) -> Result<ParsedSize, InstallError> {
	let parsed = validate_swap_request(text)?;
	check_fit(disk_size_mib, parsed.mib())?;
	Ok(parsed)
}

/// Compute the partition layout.
///
/// Without swap the disk carries `[EFI][ROOT..100%]`; with swap the swap
/// partition sits between the two. A request that truncates to zero MiB
/// disables swap, so partition boundaries stay strictly increasing.
pub fn plan_layout(
	disk_size_mib: u64,
	swap: ParsedSize,
) -> Result<PartitionPlan, InstallError> {
	let swap_mib = swap.mib();
	check_fit(disk_size_mib, swap_mib)?;
	let mut partitions = vec![PartitionSpec {
		role: PartitionRole::Efi,
		filesystem: FilesystemType::Fat32,
		start_mib: LAYOUT_START_MIB,
		end: PartitionEnd::Mib(EFI_SIZE_MIB),
	}];
	let mut root_start = EFI_SIZE_MIB;
	if swap_mib > 0 {
		partitions.push(PartitionSpec {
			role: PartitionRole::Swap,
			filesystem: FilesystemType::Swap,
			start_mib: EFI_SIZE_MIB,
			end: PartitionEnd::Mib(EFI_SIZE_MIB + swap_mib),
		});
		root_start = EFI_SIZE_MIB + swap_mib;
	}
	partitions.push(PartitionSpec {
		role: PartitionRole::Root,
		filesystem: FilesystemType::Ext4,
		start_mib: root_start,
		end: PartitionEnd::DiskEnd,
	});
	Ok(PartitionPlan { partitions })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_increasing(plan: &PartitionPlan) {
		let mut previous_end = 0;
		for part in &plan.partitions {
			assert!(part.start_mib >= previous_end);
			match part.end {
				PartitionEnd::Mib(end) => {
					assert!(end > part.start_mib);
					previous_end = end;
				}
				PartitionEnd::DiskEnd => {}
			}
		}
	}

	#[test]
	fn test_layout_with_swap() -> anyhow::Result<()> {
		// 20000 MiB disk, 4GiB swap: 1000 + 5000 + 4096 fits.
		let swap = validate_swap("4GiB", 20000)?;
		let plan = plan_layout(20000, swap)?;
		assert!(plan.has_swap());
		assert_eq!(plan.partitions.len(), 3);
		let roles: Vec<_> = plan.partitions.iter().map(|p| p.role).collect();
		assert_eq!(
			roles,
			[PartitionRole::Efi, PartitionRole::Swap, PartitionRole::Root]
		);
		assert_eq!(plan.partitions[0].start_mib, 1);
		assert_eq!(plan.partitions[0].end, PartitionEnd::Mib(1000));
		assert_eq!(plan.partitions[1].start_mib, 1000);
		assert_eq!(plan.partitions[1].end, PartitionEnd::Mib(5096));
		assert_eq!(plan.partitions[2].start_mib, 5096);
		assert_eq!(plan.partitions[2].end, PartitionEnd::DiskEnd);
		assert_increasing(&plan);
		Ok(())
	}

	#[test]
	fn test_swap_too_large() {
		// 8000 MiB disk cannot hold a 4096 MiB swap next to a useful root.
		let err = validate_swap("4GiB", 8000).unwrap_err();
		match err {
			InstallError::SwapTooLarge { swap_mib, free_mib } => {
				assert_eq!(swap_mib, 4096);
				assert_eq!(free_mib, 2904);
			}
			other => panic!("expected SwapTooLarge, got {:?}", other),
		}
	}

	#[test]
	fn test_invalid_swap_format_rejected() {
		assert!(matches!(
			validate_swap("4X", 20000),
			Err(InstallError::InvalidSwapFormat(_))
		));
	}

	#[test]
	fn test_disabled_swap_yields_two_partitions() -> anyhow::Result<()> {
		let plan = plan_layout(20000, validate_swap("0", 20000)?)?;
		assert!(!plan.has_swap());
		assert_eq!(plan.partitions.len(), 2);
		assert_eq!(plan.partitions[0].role, PartitionRole::Efi);
		assert_eq!(plan.partitions[1].role, PartitionRole::Root);
		assert_eq!(plan.partitions[1].start_mib, EFI_SIZE_MIB);
		assert_eq!(plan.partitions[1].end, PartitionEnd::DiskEnd);
		assert_increasing(&plan);
		Ok(())
	}

	#[test]
	fn test_root_always_terminal() -> anyhow::Result<()> {
		for (disk, swap) in [
			(6000u64, "0"),
			(10096, "4GiB"),
			(20000, "512MiB"),
			(1000000, "16GiB"),
		] {
			let plan = plan_layout(disk, validate_swap(swap, disk)?)?;
			let last = plan.partitions.last().unwrap();
			assert_eq!(last.role, PartitionRole::Root);
			assert_eq!(last.end, PartitionEnd::DiskEnd);
			assert_increasing(&plan);
		}
		Ok(())
	}

	#[test]
	fn test_positional_numbering() -> anyhow::Result<()> {
		let with_swap = plan_layout(20000, validate_swap("4GiB", 20000)?)?;
		assert_eq!(with_swap.number_of(PartitionRole::Swap), Some(2));
		assert_eq!(with_swap.number_of(PartitionRole::Root), Some(3));
		let without = plan_layout(20000, validate_swap("0", 20000)?)?;
		assert_eq!(without.number_of(PartitionRole::Swap), None);
		assert_eq!(without.number_of(PartitionRole::Root), Some(2));
		Ok(())
	}

	#[test]
	fn test_sub_mib_swap_degenerates_to_disabled() -> anyhow::Result<()> {
		let plan = plan_layout(20000, validate_swap("4KiB", 20000)?)?;
		assert!(!plan.has_swap());
		Ok(())
	}
}
