//! The partitioning executor: writes the planned layout to the target disk.
//!
//! This is the first irreversible step. Creating the fresh GPT alone
//! destroys whatever was on the device, and a failure part-way leaves it
//! partially partitioned with no rollback.

use std::{collections::HashMap, fs::File};

use anyhow::{Context, Result};
use gptman::{GPTPartitionEntry, GPT};
use log::{debug, info};
use uuid::{uuid, Uuid};

use crate::{
	error::InstallError,
	plan::{PartitionEnd, PartitionPlan, PartitionRole},
	utils::refresh_partition_table,
};

pub const PARTTYPE_EFI_UUID: Uuid = uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B");
pub const PARTTYPE_LINUX_UUID: Uuid = uuid!("0FC63DAF-8483-4772-8E79-3D69D8477DE4");
pub const PARTTYPE_SWAP_UUID: Uuid = uuid!("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F");

impl PartitionRole {
	fn type_guid(&self) -> Uuid {
		match self {
			Self::Efi => PARTTYPE_EFI_UUID,
			Self::Swap => PARTTYPE_SWAP_UUID,
			Self::Root => PARTTYPE_LINUX_UUID,
		}
	}
}

/// Device node of the num-th partition. Devices whose names end in a digit
/// (nvme0n1, mmcblk0) separate the partition number with a `p`.
pub fn partition_path(disk_path: &str, num: u32) -> String {
	if disk_path.ends_with(|c: char| c.is_ascii_digit()) {
		format!("{}p{}", disk_path, num)
	} else {
		format!("{}{}", disk_path, num)
	}
}

/// Write a fresh GPT holding the planned partitions onto the device, then
/// have the kernel reread it. Returns the role-to-device-node mapping
/// derived from the plan order.
pub fn apply(
	disk_path: &str,
	plan: &PartitionPlan,
) -> Result<HashMap<PartitionRole, String>> {
	// Partition tables must be written through a write-only fd, anything
	// else gets EBADF.
	let mut fd = File::options()
		.write(true)
		.open(disk_path)
		.context(format!("Unable to open {} for partitioning", disk_path))?;
	// Sector sizes can not be assumed; ask the kernel.
	let sector_size = gptman::linux::get_sector_size(&mut fd)?;
	debug!("Sector size of '{}': {} bytes", disk_path, sector_size);
	let sectors_per_mib = (1 << 20) / sector_size;

	let disk_uuid = Uuid::new_v4();
	// UUIDs in GPT are "mixed-endian"; Uuid::to_bytes_le() produces the
	// byte array the on-disk format wants.
	let mut table = GPT::new_from(&mut fd, sector_size, disk_uuid.to_bytes_le())
		.context("Unable to create a new partition table")?;
	// 1MiB aligned
	table.align = sectors_per_mib;
	let last_usable = table.header.last_usable_lba;
	info!("Created new GPT partition table on {}:", disk_path);
	info!("UUID: {}", disk_uuid);
	info!("Total LBA: {}", last_usable);

	for (idx, part) in plan.partitions.iter().enumerate() {
		let num = idx as u32 + 1;
		let starting_lba = part.start_mib * sectors_per_mib;
		let ending_lba = match part.end {
			PartitionEnd::Mib(end) => end * sectors_per_mib - 1,
			PartitionEnd::DiskEnd => last_usable,
		};
		if starting_lba >= ending_lba || ending_lba > last_usable {
			return Err(InstallError::PartitionCreateFailed {
				num,
				role: part.role.to_string(),
				disk: disk_path.to_string(),
			}
			.into());
		}
		let part_uuid = Uuid::new_v4();
		info!(
			"Creating a {} partition with PARTUUID {}:",
			part.role, part_uuid
		);
		info!(
			"Start = {}, End = {}, Size in LBA: {}",
			starting_lba,
			ending_lba,
			ending_lba - starting_lba + 1
		);
		table[num] = GPTPartitionEntry {
			partition_type_guid: part.role.type_guid().to_bytes_le(),
			unique_partition_guid: part_uuid.to_bytes_le(),
			starting_lba,
			ending_lba,
			attribute_bits: 0,
			partition_name: part.role.to_string().as_str().into(),
		};
	}

	info!("Writing changes ...");
	// The protective MBR keeps partitioning tools from treating the disk
	// as empty.
	GPT::write_protective_mbr_into(&mut fd, sector_size)?;
	table
		.write_into(&mut fd)
		.context("Unable to write the partition table")?;
	fd.sync_all()?;
	drop(fd);

	refresh_partition_table(disk_path)?;

	// The plan's order is the numbering contract: the entry at index i is
	// partition i + 1 on the device.
	let by_role = plan
		.partitions
		.iter()
		.filter_map(|part| {
			plan.number_of(part.role)
				.map(|num| (part.role, partition_path(disk_path, num)))
		})
		.collect();
	Ok(by_role)
}
