//! Module defining the command line usage.
//!
//! Available subcommands
//! ---------------------
//!
//! ### Provision a disk
//!
//! <div class="warning">
//! Installing requires root privileges, and erases the selected disk.
//! </div>
//!
//! ```shell
//! # mkarchdisk install [--device DEVICE] [--swap SIZE]
//! ```
//!
//! Without options the target disk is chosen from an interactive menu and
//! the swap size is prompted for. `--device` takes a whole-disk node such as
//! `/dev/sda` (the confirmation still applies); `--swap` takes a size such
//! as `4GiB`, or `0` to disable swap.
//!
//! ### Preview the partition layout
//!
//! ```shell
//! $ mkarchdisk plan --disk-size 20GiB --swap 4GiB
//! ```
//!
//! Prints the partition list that `install` would create on a disk of the
//! given size, without touching any device.
//!
//! ### List candidate disks
//!
//! ```shell
//! $ mkarchdisk list --format FORMAT
//! ```
//!
//! While `FORMAT` can be one of the following:
//!
//! - `pretty`: human-readable listing with the reported size.
//! - `simple`: tab-separated columns for scripts.
//!
//! Global options
//! --------------
//!
//! - `-D`, `--debug`: enables the debug output.
//! - `-c`, `--config`: path to the installer configuration file (TOML);
//!   built-in defaults apply when not given.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Clone, ValueEnum)]
pub enum ListFormat {
	Pretty,
	Simple,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cmdline {
	/// Turns on debug output.
	#[arg(short = 'D', long, action = ArgAction::SetTrue)]
	pub debug: bool,
	/// Path to the installer configuration file.
	#[arg(short, long)]
	pub config: Option<PathBuf>,
	/// The action to take.
	#[command(subcommand)]
	pub action: Action,
}

#[derive(Subcommand)]
pub enum Action {
	/// Provision a bootable system onto a disk. Erases the disk.
	Install {
		/// Target device path, skipping the selection menu.
		#[arg(short, long)]
		device: Option<String>,

		/// Swap size (e.g. 4GiB, 512MiB; 0 disables swap), skipping the
		/// prompt.
		#[arg(short, long)]
		swap: Option<String>,
	},
	/// Compute and print the partition layout without touching any device.
	Plan {
		/// Disk size to plan for (e.g. 20GiB).
		#[arg(short, long)]
		disk_size: String,

		/// Swap size request (e.g. 4GiB; 0 disables swap).
		#[arg(short, long, default_value = "0")]
		swap: String,
	},
	/// List the disks eligible as installation targets.
	List {
		#[arg(short, long, value_enum, default_value = "pretty")]
		format: ListFormat,
	},
}
