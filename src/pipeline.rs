//! The staged installation pipeline.
//!
//! Stages run strictly in order; each one consumes what the previous stages
//! put into [`PipelineState`] and adds its own results. There is no retry
//! and no way back: the first failure aborts the run with a stage-labeled
//! diagnostic, leaving the device as-is. All validation that does not need
//! the disk happens before the first write; nothing after it can be undone.

use std::{
	collections::HashMap,
	fs::{create_dir_all, File},
	io::Write,
	os::unix::fs::PermissionsExt,
	path::PathBuf,
	process::Command,
	thread,
	time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use strum::{Display, VariantArray};
use sys_mount::{unmount, Mount, UnmountFlags};

use crate::{
	bootloader,
	config::InstallConfig,
	disk::{self, Disk},
	input::InputSource,
	journal,
	partition,
	plan::{self, PartitionPlan, PartitionRole},
	pm::{PackageManager, Pacstrap},
	size::ParsedSize,
	utils::{
		draw_progressbar, restore_term, run_captured, run_checked, run_with_chroot,
		setup_scroll_region, sync_filesystem,
	},
};

/// Re-prompt budget for the swap size question. The disk menu re-prompts
/// forever; a persistently malformed swap answer aborts instead.
const SWAP_PROMPT_ATTEMPTS: u32 = 5;

/// The installation stages, in execution order.
#[derive(
	Copy, Clone, Debug, Display, PartialEq, Eq, Serialize, VariantArray,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
	SelectDisk,
	PlanLayout,
	Partition,
	FormatMount,
	InstallBase,
	Configure,
	InstallBootloader,
	Finish,
}

/// Everything the stages have produced so far. Journaled after each stage.
#[derive(Default, Serialize)]
pub struct PipelineState {
	pub completed: Vec<Stage>,
	pub disk: Option<Disk>,
	pub plan: Option<PartitionPlan>,
	pub swap_enabled: bool,
	/// Role to device node, from the executor's positional numbering.
	pub partitions: HashMap<PartitionRole, String>,
	/// Active mountpoints, in mount order. Must be unmounted in reverse
	/// before the run ends.
	pub mounted: Vec<PathBuf>,
}

/// One installation run.
pub struct InstallContext<'a> {
	pub config: &'a InstallConfig,
	pub input: &'a mut dyn InputSource,
	/// Target device preselected on the command line; the menu is skipped
	/// but the size gate and confirmation are not.
	pub device: Option<String>,
	/// Swap request preselected on the command line; invalid values abort
	/// instead of re-prompting.
	pub swap: Option<String>,
}

impl InstallContext<'_> {
	pub fn run(mut self) -> Result<PipelineState> {
		let total = Stage::VARIANTS.len();
		let mut state = PipelineState::default();
		setup_scroll_region();
		for (idx, stage) in Stage::VARIANTS.iter().enumerate() {
			let stage = *stage;
			draw_progressbar(&format!("[{}/{}] {}", idx + 1, total, stage));
			self.run_stage(stage, &mut state)
				.context(format!("Installation failed during stage '{}'", stage))?;
			state.completed.push(stage);
			// The journal is advisory; a failure to write it must not
			// abort an installation that is otherwise going fine.
			if let Err(e) = journal::checkpoint(&self.config.journal_path, &state) {
				warn!("Unable to update the stage journal: {:#}", e);
			}
		}
		restore_term();
		Ok(state)
	}

	fn run_stage(&mut self, stage: Stage, state: &mut PipelineState) -> Result<()> {
		match stage {
			Stage::SelectDisk => self.select_disk(state),
			Stage::PlanLayout => self.plan_layout(state),
			Stage::Partition => self.partition(state),
			Stage::FormatMount => self.format_mount(state),
			Stage::InstallBase => self.install_base(state),
			Stage::Configure => self.configure(state),
			Stage::InstallBootloader => self.install_bootloader(state),
			Stage::Finish => self.finish(state),
		}
	}

	fn select_disk(&mut self, state: &mut PipelineState) -> Result<()> {
		let disks = disk::inventory()?;
		let chosen = match self.device.take() {
			Some(path) => disk::lookup(&disks, &path, self.input)?,
			None => disk::select_disk(&disks, self.input)?,
		};
		info!(
			"[{}] Target disk: {} ({} MiB)",
			Stage::SelectDisk,
			chosen.path,
			chosen.size_mib
		);
		state.disk = Some(chosen);
		Ok(())
	}

	fn plan_layout(&mut self, state: &mut PipelineState) -> Result<()> {
		let disk = state.disk.as_ref().context("No target disk selected")?;
		let swap = self.resolve_swap(disk.size_mib)?;
		let layout = plan::plan_layout(disk.size_mib, swap)?;
		for (idx, part) in layout.partitions.iter().enumerate() {
			info!(
				"[{}] Partition {}: {} ({:?}), {}MiB .. {}",
				Stage::PlanLayout,
				idx + 1,
				part.role,
				part.filesystem,
				part.start_mib,
				part.end
			);
		}
		state.swap_enabled = layout.has_swap();
		state.plan = Some(layout);
		Ok(())
	}

	/// Ask for the swap size, or take the one given up front. Format and
	/// fit failures re-prompt up to the attempt budget.
	pub(crate) fn resolve_swap(&mut self, disk_size_mib: u64) -> Result<ParsedSize> {
		if let Some(request) = self.swap.take() {
			return Ok(plan::validate_swap(&request, disk_size_mib)?);
		}
		let prompt = format!(
			"Swap size [{}] (0 to disable): ",
			self.config.swap_size
		);
		let mut attempt = 0;
		loop {
			attempt += 1;
			let answer = self.input.read_line(&prompt)?;
			let request = if answer.is_empty() {
				self.config.swap_size.as_str()
			} else {
				answer.as_str()
			};
			match plan::validate_swap(request, disk_size_mib) {
				Ok(parsed) => return Ok(parsed),
				Err(e) if attempt < SWAP_PROMPT_ATTEMPTS => println!("{}", e),
				Err(e) => return Err(e.into()),
			}
		}
	}

	fn partition(&mut self, state: &mut PipelineState) -> Result<()> {
		let disk = state.disk.as_ref().context("No target disk selected")?;
		let layout = state.plan.as_ref().context("No partition plan computed")?;
		info!(
			"[{}] Writing a fresh GPT to {}; its previous contents are gone",
			Stage::Partition,
			disk.path
		);
		let by_role = partition::apply(&disk.path, layout)?;
		for (role, path) in &by_role {
			info!("[{}] {} partition: {}", Stage::Partition, role, path);
		}
		state.partitions = by_role;
		Ok(())
	}

	fn format_mount(&mut self, state: &mut PipelineState) -> Result<()> {
		let stage = Stage::FormatMount;
		let layout = state
			.plan
			.as_ref()
			.context("No partition plan computed")?
			.clone();
		for (idx, part) in layout.partitions.iter().enumerate() {
			let path = state
				.partitions
				.get(&part.role)
				.context(format!("No device node recorded for {}", part.role))?;
			info!(
				"[{}] Formatting partition {} ({:?}) ...",
				stage,
				idx + 1,
				part.filesystem
			);
			part.filesystem.format(path)?;
		}

		let root_path = state
			.partitions
			.get(&PartitionRole::Root)
			.context("No root partition recorded")?
			.clone();
		let efi_path = state
			.partitions
			.get(&PartitionRole::Efi)
			.context("No EFI partition recorded")?
			.clone();
		let root_spec = layout
			.get(PartitionRole::Root)
			.context("Plan has no root partition")?;
		let efi_spec = layout
			.get(PartitionRole::Efi)
			.context("Plan has no EFI partition")?;

		let mount_root = self.config.mount_root.clone();
		create_dir_all(&mount_root)?;
		info!("[{}] Mounting {} on {} ...", stage, root_path, mount_root.display());
		Mount::builder()
			.fstype(root_spec.filesystem.get_os_fstype())
			.mount(&root_path, &mount_root)
			.context(format!("Failed to mount {}", root_path))?;
		state.mounted.push(mount_root.clone());

		let boot_dir = mount_root.join("boot");
		create_dir_all(&boot_dir)?;
		info!("[{}] Mounting {} on {} ...", stage, efi_path, boot_dir.display());
		Mount::builder()
			.fstype(efi_spec.filesystem.get_os_fstype())
			.mount(&efi_path, &boot_dir)
			.context(format!("Failed to mount {}", efi_path))?;
		state.mounted.push(boot_dir);

		if state.swap_enabled {
			let swap_path = state
				.partitions
				.get(&PartitionRole::Swap)
				.context("Swap is enabled but no swap partition was recorded")?;
			info!("[{}] Activating swap on {} ...", stage, swap_path);
			run_checked(Command::new("swapon").arg(swap_path))?;
		}
		Ok(())
	}

	fn install_base(&mut self, state: &mut PipelineState) -> Result<()> {
		debug_assert!(state.completed.contains(&Stage::FormatMount));
		let packages: Vec<&str> = self
			.config
			.base_packages
			.iter()
			.map(String::as_str)
			.collect();
		info!(
			"[{}] Installing the base system ({} packages) ...",
			Stage::InstallBase,
			packages.len()
		);
		Pacstrap::install(&packages, &self.config.mount_root)
			.context("Failed to install the base system")
	}

	fn configure(&mut self, _state: &mut PipelineState) -> Result<()> {
		let stage = Stage::Configure;
		let root = &self.config.mount_root;

		info!("[{}] Generating the filesystem table ...", stage);
		let fstab = run_captured(Command::new("genfstab").arg("-U").arg(root))?;
		write_file(&root.join("etc/fstab"), &fstab, 0o644)?;

		info!("[{}] Writing the one-shot configuration script ...", stage);
		let script = self.render_setup_script();
		debug!("Script content:\n{}", script);
		// Executable, and gone with the mount once the tree is torn down.
		write_file(&root.join("root/setup.sh"), script.as_bytes(), 0o755)?;

		info!("[{}] Configuring the new system inside chroot ...", stage);
		run_with_chroot(root, &["/root/setup.sh"])
			.context("The configuration script failed inside the chroot")
	}

	fn render_setup_script(&self) -> String {
		let config = self.config;
		format!(
			r#"#!/bin/bash
set -e
echo '{hostname}' > /etc/hostname
printf '127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\t{hostname}\n' >> /etc/hosts
ln -sf /usr/share/zoneinfo/{timezone} /etc/localtime
hwclock --systohc
echo '{locale} UTF-8' > /etc/locale.gen
locale-gen
echo 'LANG={locale}' > /etc/locale.conf
echo 'root:{password}' | chpasswd
"#,
			hostname = config.hostname,
			timezone = config.timezone,
			locale = config.locale,
			password = config.root_password,
		)
	}

	fn install_bootloader(&mut self, _state: &mut PipelineState) -> Result<()> {
		let packages: Vec<&str> = self
			.config
			.bootloader_packages
			.iter()
			.map(String::as_str)
			.collect();
		info!("[{}] Installing the bootloader ...", Stage::InstallBootloader);
		bootloader::install_grub(&self.config.mount_root, &packages)
	}

	fn finish(&mut self, state: &mut PipelineState) -> Result<()> {
		let stage = Stage::Finish;
		info!("[{}] Unmounting the new root tree ...", stage);
		umount_stack(&mut state.mounted)?;
		if state.swap_enabled {
			if let Some(swap_path) = state.partitions.get(&PartitionRole::Swap) {
				info!("[{}] Deactivating swap on {} ...", stage, swap_path);
				run_checked(Command::new("swapoff").arg(swap_path))?;
			}
		}
		info!(
			"[{}] Installation complete. Reboot into the new system.",
			stage
		);
		Ok(())
	}
}

fn write_file(path: &std::path::Path, content: &[u8], mode: u32) -> Result<()> {
	let mut fd = File::options()
		.create(true)
		.write(true)
		.truncate(true)
		.open(path)
		.context(format!("Unable to open {}", path.display()))?;
	fd.write_all(content)?;
	fd.flush()?;
	fd.sync_all()?;
	let mut perms = fd.metadata()?.permissions();
	perms.set_mode(mode);
	std::fs::set_permissions(path, perms)?;
	Ok(())
}

/// Unmount in reverse mount order, syncing each filesystem first.
fn umount_stack(stack: &mut Vec<PathBuf>) -> Result<()> {
	while let Some(target) = stack.pop() {
		debug!("Syncing filesystem {} ...", target.display());
		sync_filesystem(&target)?;
		debug!("Unmounting {} ...", target.display());
		unmount(&target, UnmountFlags::empty())
			.context(format!("Failed to unmount {}", target.display()))?;
		thread::sleep(Duration::from_millis(100));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_stage_order() {
		let names: Vec<String> =
			Stage::VARIANTS.iter().map(|s| s.to_string()).collect();
		assert_eq!(
			names,
			[
				"select-disk",
				"plan-layout",
				"partition",
				"format-mount",
				"install-base",
				"configure",
				"install-bootloader",
				"finish"
			]
		);
	}

	#[test]
	fn test_setup_script_content() {
		let config = InstallConfig::default();
		let mut input = crate::input::Scripted::new(Vec::<String>::new());
		let context = InstallContext {
			config: &config,
			input: &mut input,
			device: None,
			swap: None,
		};
		let script = context.render_setup_script();
		assert!(script.starts_with("#!/bin/bash"));
		assert!(script.contains("echo 'myarch' > /etc/hostname"));
		assert!(script.contains("zoneinfo/Europe/Moscow"));
		assert!(script.contains("locale-gen"));
		assert!(script.contains("chpasswd"));
	}

	#[test]
	fn test_swap_prompt_bounded() {
		let config = InstallConfig::default();
		let mut input =
			crate::input::Scripted::new(["4X", "4X", "4X", "4X", "4X", "4X", "4X"]);
		let mut context = InstallContext {
			config: &config,
			input: &mut input,
			device: None,
			swap: None,
		};
		let err = context.resolve_swap(20000).unwrap_err();
		assert!(matches!(
			err.downcast_ref::<crate::error::InstallError>(),
			Some(crate::error::InstallError::InvalidSwapFormat(_))
		));
	}

	#[test]
	fn test_swap_prompt_recovers() -> Result<()> {
		let config = InstallConfig::default();
		// An oversized request, then a fitting one.
		let mut input = crate::input::Scripted::new(["4GiB", "512MiB"]);
		let mut context = InstallContext {
			config: &config,
			input: &mut input,
			device: None,
			swap: None,
		};
		let parsed = context.resolve_swap(7000)?;
		assert_eq!(parsed, ParsedSize::Parsed(512));
		Ok(())
	}

	#[test]
	fn test_empty_answer_takes_the_default() -> Result<()> {
		let config = InstallConfig::default();
		let mut input = crate::input::Scripted::new([""]);
		let mut context = InstallContext {
			config: &config,
			input: &mut input,
			device: None,
			swap: None,
		};
		// Default is 4GiB = 4096 MiB.
		assert_eq!(context.resolve_swap(20000)?, ParsedSize::Parsed(4096));
		Ok(())
	}
}
