//! GRUB installation for the EFI/GPT layout.
//!
//! Runs after the configure stage, with the new root still mounted and the
//! EFI system partition on /boot inside it.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{
	pm::{PackageManager, Pacstrap},
	utils::run_with_chroot,
};

pub fn install_grub(rootdir: &dyn AsRef<Path>, packages: &[&str]) -> Result<()> {
	let rootdir = rootdir.as_ref();
	Pacstrap::install(packages, &rootdir)
		.context("Failed to install the bootloader packages")?;
	info!("Installing GRUB to the EFI system partition ...");
	run_with_chroot(
		&rootdir,
		&[
			"grub-install",
			"--target=x86_64-efi",
			"--efi-directory=/boot",
			"--bootloader-id=GRUB",
		],
	)?;
	info!("Generating the GRUB configuration ...");
	run_with_chroot(&rootdir, &["grub-mkconfig", "-o", "/boot/grub/grub.cfg"])?;
	Ok(())
}
