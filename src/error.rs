use thiserror::Error;

/// Failure conditions with a name of their own.
///
/// The swap-size conditions are recoverable by re-prompting the operator;
/// everything else terminates the run. All other failures travel as plain
/// [`anyhow::Error`]s since nobody needs to match on them.
#[derive(Debug, Error)]
pub enum InstallError {
	#[error("disk {path} is too small ({size_mib} MiB); at least {min_mib} MiB is required")]
	DiskTooSmall {
		path: String,
		size_mib: u64,
		min_mib: u64,
	},
	#[error("invalid swap size '{0}': use an integer with a [KMGT]B or [KMGT]iB unit, or 0 to disable swap")]
	InvalidSwapFormat(String),
	#[error("a {swap_mib} MiB swap leaves only {free_mib} MiB for the root filesystem")]
	SwapTooLarge { swap_mib: u64, free_mib: u64 },
	#[error("failed to create partition {num} ({role}) on {disk}")]
	PartitionCreateFailed {
		num: u32,
		role: String,
		disk: String,
	},
	#[error("aborted: operator declined to erase the target disk")]
	UserDeclined,
}
