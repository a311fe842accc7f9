use std::{path::Path, process::Command};

use anyhow::Result;

use crate::utils::run_checked;

/// Installs packages into the target root from the live environment.
pub trait PackageManager {
	fn install(packages: &[&str], target: &dyn AsRef<Path>) -> Result<()>;
}

/// pacstrap(8) from arch-install-scripts. Resolves and downloads from the
/// live environment's mirrors, installs into the mounted target tree.
pub enum Pacstrap {}

impl PackageManager for Pacstrap {
	fn install(packages: &[&str], target: &dyn AsRef<Path>) -> Result<()> {
		if packages.is_empty() {
			return Ok(());
		}
		let mut command = Command::new("pacstrap");
		command.arg(target.as_ref());
		command.args(packages);
		run_checked(&mut command)
	}
}
