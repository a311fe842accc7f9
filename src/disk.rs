//! Disk inventory and target selection.
//!
//! Enumerates whole-disk block devices via lsblk(8), lets the operator pick
//! one from a numbered menu, and will not hand a disk to the rest of the
//! pipeline without the size gate and an explicit destructive-action
//! confirmation.

use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use log::warn;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
	cli::ListFormat,
	error::InstallError,
	input::InputSource,
	plan::MIN_DISK_SIZE_MIB,
	size::{parse_size, ParsedSize},
};

/// One entry of `lsblk --json` output. Only whole disks are interesting;
/// partitions, loop devices and optical drives are filtered out by `type`.
#[derive(Clone, Debug, Deserialize)]
struct LsblkDevice {
	name: String,
	/// Plain string in older util-linux, a JSON number since 2.37.
	#[serde(default)]
	size: Value,
	#[serde(rename = "type", default)]
	kind: String,
}

#[derive(Debug, Deserialize)]
struct LsblkReport {
	blockdevices: Vec<LsblkDevice>,
}

/// A block device eligible as an installation target.
#[derive(Clone, Debug, Serialize)]
pub struct Disk {
	/// Device node, e.g. /dev/sda.
	pub path: String,
	/// Size exactly as lsblk reported it.
	pub raw_size: String,
	/// Size resolved to the canonical unit.
	pub size_mib: u64,
}

impl Disk {
	fn from_entry(entry: &LsblkDevice) -> Self {
		let raw_size = match &entry.size {
			Value::String(s) => s.clone(),
			other => other.to_string(),
		};
		let parsed = parse_size(&raw_size);
		if parsed == ParsedSize::Failed {
			warn!(
				"Unable to parse reported size '{}' for /dev/{}, treating it as zero",
				raw_size, entry.name
			);
		}
		Disk {
			path: format!("/dev/{}", entry.name),
			raw_size,
			size_mib: parsed.mib(),
		}
	}
}

fn decode_inventory(json: &[u8]) -> Result<Vec<Disk>> {
	let report: LsblkReport =
		serde_json::from_slice(json).context("Unable to parse lsblk JSON output")?;
	Ok(report
		.blockdevices
		.iter()
		.filter(|d| d.kind == "disk")
		.map(Disk::from_entry)
		.collect())
}

/// Query the block devices present on this machine.
pub fn inventory() -> Result<Vec<Disk>> {
	let output = Command::new("lsblk")
		.args(["--json", "--bytes", "--nodeps", "--output", "NAME,SIZE,TYPE"])
		.stderr(Stdio::inherit())
		.output()
		.context("Failed to run lsblk(8) to enumerate block devices")?;
	if !output.status.success() {
		bail!(
			"lsblk exited with non-zero status {:?}",
			output.status.code()
		);
	}
	decode_inventory(&output.stdout)
}

fn ensure_size(disk: &Disk) -> Result<(), InstallError> {
	if disk.size_mib < MIN_DISK_SIZE_MIB {
		return Err(InstallError::DiskTooSmall {
			path: disk.path.clone(),
			size_mib: disk.size_mib,
			min_mib: MIN_DISK_SIZE_MIB,
		});
	}
	Ok(())
}

/// The last gate before the device's contents are destroyed. Only an
/// explicit `y` proceeds; anything else aborts the whole run.
fn confirm_erase(disk: &Disk, input: &mut dyn InputSource) -> Result<()> {
	println!(
		"{}: all data on {} will be {}!",
		"WARNING".bright_red(),
		disk.path.bright_cyan(),
		"DELETED".bright_red()
	);
	let answer = input.read_line("Continue? (y/N): ")?;
	if answer.eq_ignore_ascii_case("y") {
		Ok(())
	} else {
		Err(InstallError::UserDeclined.into())
	}
}

/// Present the 1-based selection menu. Invalid input re-prompts without
/// limit; a valid choice still has to pass the size gate and the
/// confirmation.
pub fn select_disk(disks: &[Disk], input: &mut dyn InputSource) -> Result<Disk> {
	if disks.is_empty() {
		bail!("No disks found to install to");
	}
	println!("Available disks:");
	for (i, disk) in disks.iter().enumerate() {
		println!("{}. {} ({} MiB)", i + 1, disk.path, disk.size_mib);
	}
	let chosen = loop {
		let answer = input.read_line(&format!("Select a disk [1-{}]: ", disks.len()))?;
		match answer.parse::<usize>() {
			Ok(n) if (1..=disks.len()).contains(&n) => break disks[n - 1].clone(),
			_ => println!(
				"Incorrect number. Enter a number between 1 and {}.",
				disks.len()
			),
		}
	};
	ensure_size(&chosen)?;
	confirm_erase(&chosen, input)?;
	Ok(chosen)
}

/// Non-menu path for a device preselected on the command line. The size
/// gate and the confirmation still apply.
pub fn lookup(disks: &[Disk], path: &str, input: &mut dyn InputSource) -> Result<Disk> {
	let found = disks
		.iter()
		.find(|d| d.path == path)
		.with_context(|| format!("'{}' is not an available disk", path))?
		.clone();
	ensure_size(&found)?;
	confirm_erase(&found, input)?;
	Ok(found)
}

/// Print the inventory. `simple` is tab-separated for scripts.
pub fn list_disks(disks: &[Disk], format: ListFormat) {
	if disks.is_empty() {
		println!("No disks found.");
		return;
	}
	for disk in disks {
		match format {
			ListFormat::Pretty => println!(
				"{}\t{} MiB\t(reported: {})",
				disk.path.bright_cyan(),
				disk.size_mib,
				disk.raw_size
			),
			ListFormat::Simple => {
				println!("{}\t{}\t{}", disk.path, disk.size_mib, disk.raw_size)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::input::Scripted;

	// util-linux < 2.37 quotes the sizes, newer versions emit numbers.
	const LSBLK_STRINGS: &str = r#"{"blockdevices": [
		{"name": "sda", "size": "500107862016", "type": "disk"},
		{"name": "sda1", "size": "1048576", "type": "part"},
		{"name": "sr0", "size": "1073741824", "type": "rom"},
		{"name": "loop0", "size": "4096", "type": "loop"}
	]}"#;
	const LSBLK_NUMBERS: &str = r#"{"blockdevices": [
		{"name": "nvme0n1", "size": 500107862016, "type": "disk"},
		{"name": "sdb", "size": 2097152, "type": "disk"}
	]}"#;

	#[test]
	fn test_decode_keeps_only_disks() -> Result<()> {
		let disks = decode_inventory(LSBLK_STRINGS.as_bytes())?;
		assert_eq!(disks.len(), 1);
		assert_eq!(disks[0].path, "/dev/sda");
		assert_eq!(disks[0].size_mib, 476940);
		Ok(())
	}

	#[test]
	fn test_decode_numeric_sizes() -> Result<()> {
		let disks = decode_inventory(LSBLK_NUMBERS.as_bytes())?;
		assert_eq!(disks.len(), 2);
		assert_eq!(disks[0].path, "/dev/nvme0n1");
		assert_eq!(disks[0].size_mib, 476940);
		assert_eq!(disks[1].size_mib, 2);
		Ok(())
	}

	fn big_disk() -> Disk {
		Disk {
			path: "/dev/sda".into(),
			raw_size: "500107862016".into(),
			size_mib: 476940,
		}
	}

	fn small_disk() -> Disk {
		Disk {
			path: "/dev/sdb".into(),
			raw_size: "2097152".into(),
			size_mib: 2,
		}
	}

	#[test]
	fn test_menu_reprompts_until_valid() -> Result<()> {
		let disks = vec![big_disk(), small_disk()];
		let mut input = Scripted::new(["nope", "0", "3", "1", "y"]);
		let chosen = select_disk(&disks, &mut input)?;
		assert_eq!(chosen.path, "/dev/sda");
		Ok(())
	}

	#[test]
	fn test_small_disk_never_passes() {
		let disks = vec![big_disk(), small_disk()];
		let mut input = Scripted::new(["2", "y"]);
		let err = select_disk(&disks, &mut input).unwrap_err();
		assert!(matches!(
			err.downcast_ref::<InstallError>(),
			Some(InstallError::DiskTooSmall { .. })
		));
	}

	#[test]
	fn test_anything_but_y_declines() {
		for answer in ["n", "", "yes please", "q"] {
			let disks = vec![big_disk()];
			let mut input = Scripted::new(["1", answer]);
			let err = select_disk(&disks, &mut input).unwrap_err();
			assert!(
				matches!(
					err.downcast_ref::<InstallError>(),
					Some(InstallError::UserDeclined)
				),
				"answer {:?}",
				answer
			);
		}
	}

	#[test]
	fn test_confirmation_is_case_insensitive() -> Result<()> {
		let disks = vec![big_disk()];
		let mut input = Scripted::new(["1", "Y"]);
		assert_eq!(select_disk(&disks, &mut input)?.path, "/dev/sda");
		Ok(())
	}

	#[test]
	fn test_lookup_rejects_unknown_device() {
		let disks = vec![big_disk()];
		let mut input = Scripted::new(["y"]);
		assert!(lookup(&disks, "/dev/sdz", &mut input).is_err());
	}
}
