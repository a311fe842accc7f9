mod bootloader;
mod cli;
mod config;
mod disk;
mod error;
mod filesystem;
mod input;
mod journal;
mod partition;
mod pipeline;
mod plan;
mod pm;
mod size;
mod tests;
mod utils;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Action, Cmdline};
use config::InstallConfig;
use input::Console;
use log::{debug, error, info};
use pipeline::InstallContext;
use size::ParsedSize;
use utils::restore_term;

fn main() -> Result<()> {
	ctrlc::set_handler(move || {
		restore_term();
		eprintln!("\nReceived Ctrl-C, exiting.");
		std::process::exit(1);
	})
	.context("Can not register Ctrl-C (SIGTERM) handler.")?;

	let cmdline = Cmdline::try_parse()?;
	// Everything destructive sits behind the install action.
	if let Action::Install { .. } = &cmdline.action {
		if utils::euid() != 0 {
			bail!("Please run me as root!");
		}
	}
	let mut logger = colog::basic_builder();
	if cmdline.debug {
		logger.filter(None, log::LevelFilter::Debug);
	} else {
		logger.filter(None, log::LevelFilter::Info);
	}
	logger.init();
	if cmdline.debug {
		debug!("Debug output enabled.");
	}
	if let Err(e) = try_main(cmdline) {
		// Recover the terminal before pretty-printing the failure chain.
		restore_term();
		error!("Installation failed!\n{}", e);
		let mut depth = 0;
		let mut chain = String::new();
		for cause in e.chain().skip(1) {
			let pad = "\t".repeat(depth);
			depth += 1;
			chain += &format!("{0}- Caused by:\n{0}  {1}", pad, cause);
		}
		if !chain.is_empty() {
			error!("{}", chain);
		}
		std::process::exit(1);
	}
	Ok(())
}

fn try_main(cmdline: Cmdline) -> Result<()> {
	let config = InstallConfig::load(cmdline.config.as_deref())?;
	match cmdline.action {
		Action::Install { device, swap } => {
			info!("Welcome to mkarchdisk!");
			utils::check_online()?;
			let mut console = Console;
			let context = InstallContext {
				config: &config,
				input: &mut console,
				device,
				swap,
			};
			let state = context.run()?;
			let target = state
				.disk
				.map(|d| d.path)
				.unwrap_or_else(|| "the target disk".to_string());
			info!("Done! {} is ready to boot.", target);
		}
		Action::Plan { disk_size, swap } => {
			let disk_mib = match size::parse_size(&disk_size) {
				ParsedSize::Parsed(n) => n,
				_ => bail!("'{}' is not a valid disk size", disk_size),
			};
			let swap_request = plan::validate_swap(&swap, disk_mib)?;
			let layout = plan::plan_layout(disk_mib, swap_request)?;
			for (idx, part) in layout.partitions.iter().enumerate() {
				println!(
					"{}\t{}\t{}\t{}MiB\t{}",
					idx + 1,
					part.role,
					part.filesystem.get_os_fstype(),
					part.start_mib,
					part.end
				);
			}
		}
		Action::List { format } => {
			let disks = disk::inventory()?;
			disk::list_disks(&disks, format);
		}
	}
	Ok(())
}
