//! Installer configuration.
//!
//! Every knob that decides what the installed system looks like lives here,
//! so the pipeline can be driven with injected values instead of process-wide
//! constants. Values come from a TOML file when one is given; otherwise the
//! defaults apply.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
	/// Hostname of the installed system.
	pub hostname: String,
	/// Initial root account password, set via chpasswd inside the chroot.
	pub root_password: String,
	/// Timezone, as a path under /usr/share/zoneinfo.
	pub timezone: String,
	/// Locale written to locale.gen and locale.conf.
	pub locale: String,
	/// Swap size offered as the default at the prompt.
	pub swap_size: String,
	/// Packages installed by the base-install stage.
	pub base_packages: Vec<String>,
	/// Packages installed by the bootloader stage.
	pub bootloader_packages: Vec<String>,
	/// Where the new root tree is assembled.
	pub mount_root: PathBuf,
	/// Stage journal destination.
	pub journal_path: PathBuf,
}

impl Default for InstallConfig {
	fn default() -> Self {
		InstallConfig {
			hostname: "myarch".into(),
			root_password: "password".into(),
			timezone: "Europe/Moscow".into(),
			locale: "en_US.UTF-8".into(),
			swap_size: "4GiB".into(),
			base_packages: vec![
				"base".into(),
				"base-devel".into(),
				"linux".into(),
				"linux-firmware".into(),
				"networkmanager".into(),
				"vim".into(),
				"python".into(),
			],
			bootloader_packages: vec!["grub".into(), "efibootmgr".into()],
			mount_root: PathBuf::from("/mnt"),
			journal_path: PathBuf::from("/run/mkarchdisk/state.json"),
		}
	}
}

impl InstallConfig {
	pub fn load(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(p) => Self::from_path(p),
			None => Ok(Self::default()),
		}
	}

	pub fn from_path(file: &Path) -> Result<Self> {
		let content = fs::read_to_string(file)
			.context(format!("Unable to read file '{}'", file.display()))?;
		let config = toml::from_str(&content).context(format!(
			"Unable to treat '{}' as an installer configuration",
			file.display()
		))?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = InstallConfig::default();
		assert_eq!(config.hostname, "myarch");
		assert_eq!(config.mount_root, PathBuf::from("/mnt"));
		assert!(config.base_packages.iter().any(|p| p == "linux"));
	}

	#[test]
	fn test_partial_toml_keeps_defaults() -> Result<()> {
		let config: InstallConfig = toml::from_str(
			r#"
hostname = "testbox"
swap_size = "512MiB"
"#,
		)?;
		assert_eq!(config.hostname, "testbox");
		assert_eq!(config.swap_size, "512MiB");
		// Unset fields fall back to the defaults.
		assert_eq!(config.locale, "en_US.UTF-8");
		assert_eq!(config.bootloader_packages, vec!["grub", "efibootmgr"]);
		Ok(())
	}
}
