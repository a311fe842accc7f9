use std::{
	fs::File,
	os::fd::AsRawFd,
	path::Path,
	process::{Command, Stdio},
	time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use termsize::Size;

/// Probed before anything destructive happens; the install stages need
/// working package mirrors and there is no way back once the disk is wiped.
const PROBE_URL: &str = "https://archlinux.org";

/// Effective user ID of the calling process.
pub fn euid() -> u32 {
	unsafe { libc::geteuid() }
}

/// Fail fast when the network is unreachable.
pub fn check_online() -> Result<()> {
	debug!("Probing {} ...", PROBE_URL);
	let client = reqwest::blocking::Client::builder()
		.timeout(Duration::from_secs(10))
		.build()?;
	client
		.head(PROBE_URL)
		.send()
		.context("No internet connection")?;
	Ok(())
}

/// Run an external command, translating a non-zero exit status into an
/// error. Disk mutations are not retriable, so callers treat any failure
/// here as fatal.
pub fn run_checked(command: &mut Command) -> Result<()> {
	let name = command.get_program().to_string_lossy().to_string();
	debug!("Running command {:?}", command);
	let status = command
		.status()
		.context(format!("Failed to run {}", name))?;
	if status.success() {
		Ok(())
	} else if let Some(code) = status.code() {
		Err(anyhow!("{} exited with non-zero status {}", name, code))
	} else {
		Err(anyhow!("{} exited abnormally", name))
	}
}

/// Run an external command and capture its stdout, failing on non-zero exit.
pub fn run_captured(command: &mut Command) -> Result<Vec<u8>> {
	let name = command.get_program().to_string_lossy().to_string();
	debug!("Running command {:?}", command);
	let output = command
		.stderr(Stdio::inherit())
		.output()
		.context(format!("Failed to run {}", name))?;
	if !output.status.success() {
		bail!(
			"{} exited with non-zero status {:?}",
			name,
			output.status.code()
		);
	}
	Ok(output.stdout)
}

/// Execute a command line inside the new root via arch-chroot(8).
pub fn run_with_chroot(rootdir: &dyn AsRef<Path>, argv: &[&str]) -> Result<()> {
	let mut command = Command::new("arch-chroot");
	command.arg(rootdir.as_ref());
	command.args(argv);
	run_checked(&mut command)
}

/// Tell the kernel to reread the partition table after it was rewritten.
pub fn refresh_partition_table<P: AsRef<Path>>(dev: P) -> Result<()> {
	debug!("Refreshing the partition table ...");
	let out = Command::new("partprobe")
		.arg("--summary")
		.arg(dev.as_ref())
		.stdout(Stdio::piped())
		.output()
		.context("Failed to run partprobe(8) to refresh the partition table")?
		.stdout;
	info!("partprobe: {}", String::from_utf8_lossy(&out).trim());
	Ok(())
}

/// Sync the filesystem behind the path.
pub fn sync_filesystem<P: AsRef<Path>>(path: P) -> Result<()> {
	let path = path.as_ref();
	let fd = File::open(path)
		.context(format!("Failed to open path {}", path.display()))?;
	let result = unsafe { libc::syncfs(fd.as_raw_fd()) };
	debug!("syncfs({}) returned {}", fd.as_raw_fd(), result);
	if result != 0 {
		return Err(anyhow!(
			"Failed to sync filesystem {}: {}",
			path.display(),
			errno::errno()
		));
	}
	Ok(())
}

/// Reserve the bottom terminal row for the stage progress line.
pub fn setup_scroll_region() {
	let size = termsize::get().unwrap_or(Size { rows: 25, cols: 80 });
	eprint!("\n\x1b7\x1b[0;{}r\x1b8\x1b[1A", size.rows - 1);
}

/// Draw the stage progress line on the reserved bottom row.
pub fn draw_progressbar(content: &str) {
	let size = termsize::get().unwrap_or(Size { rows: 25, cols: 80 });
	eprint!("\x1b7\x1b[{};0f\x1b[42m\x1b[0K\x1b[2K", size.rows);
	eprint!("\x1b[30m{}", content);
	eprint!("\x1b8\x1b[0m");
}

/// Recover the terminal.
#[inline]
pub fn restore_term() {
	let size = termsize::get().unwrap_or(Size { rows: 25, cols: 80 });
	eprint!(
		"\x1b7\x1b[0;{0}r\x1b[{0};0f\x1b[0K\x1b8",
		size.rows
	);
}
