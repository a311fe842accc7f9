use std::{path::Path, process::Command};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::utils::run_checked;

/// Filesystems this installer creates.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemType {
	/// FAT32, for the EFI system partition.
	Fat32,
	/// Linux extended filesystem version 4, for the root.
	Ext4,
	/// Swap space. "Formatting" means mkswap(8).
	Swap,
}

impl FilesystemType {
	/// The fstype string the kernel expects at mount time.
	pub fn get_os_fstype(&self) -> &'static str {
		match self {
			Self::Fat32 => "vfat",
			Self::Ext4 => "ext4",
			Self::Swap => "swap",
		}
	}

	pub fn get_mkfs_cmdline(&self, path: &dyn AsRef<Path>) -> Command {
		let path = path.as_ref();
		let mut command = match self {
			Self::Ext4 => Command::new("mkfs.ext4"),
			Self::Fat32 => {
				let mut c = Command::new("mkfs.vfat");
				c.args(["-F", "32"]);
				c
			}
			Self::Swap => Command::new("mkswap"),
		};
		command.arg("--");
		command.arg(path);
		command
	}

	pub fn format(&self, path: &dyn AsRef<Path>) -> Result<()> {
		run_checked(&mut self.get_mkfs_cmdline(path))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mkfs_cmdlines() {
		let cmd = FilesystemType::Fat32.get_mkfs_cmdline(&"/dev/sda1");
		assert_eq!(cmd.get_program(), "mkfs.vfat");
		let args: Vec<_> = cmd.get_args().collect();
		assert_eq!(args, ["-F", "32", "--", "/dev/sda1"]);

		let cmd = FilesystemType::Swap.get_mkfs_cmdline(&"/dev/sda2");
		assert_eq!(cmd.get_program(), "mkswap");
	}
}
