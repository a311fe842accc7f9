#![cfg(test)]
use std::collections::HashMap;

use anyhow::Result;
use log::info;

use crate::{
	config::InstallConfig,
	input::Scripted,
	journal,
	pipeline::{PipelineState, Stage},
	plan::{self, PartitionRole},
	size::parse_size,
};

#[test]
fn test_scripted_planning_path() -> Result<()> {
	let _ = env_logger::builder()
		.filter_level(log::LevelFilter::Info)
		.is_test(true)
		.try_init();
	// The whole decision path an operator walks through before the first
	// destructive operation, driven by canned answers.
	let config = InstallConfig::default();
	let mut input = Scripted::new(["8GiB", "4GiB"]);
	let mut context = crate::pipeline::InstallContext {
		config: &config,
		input: &mut input,
		device: None,
		swap: None,
	};
	// On a 12000 MiB disk an 8 GiB swap fails the fit check, so the prompt
	// comes back and the 4 GiB answer goes through.
	let swap = context.resolve_swap(12000)?;
	let layout = plan::plan_layout(12000, swap)?;
	info!("Computed layout: {:?}", layout);
	assert_eq!(layout.partitions.len(), 3);
	assert_eq!(layout.number_of(PartitionRole::Root), Some(3));
	Ok(())
}

#[test]
fn test_journal_round_trip() -> Result<()> {
	let mut partitions = HashMap::new();
	partitions.insert(PartitionRole::Efi, "/dev/sda1".to_string());
	partitions.insert(PartitionRole::Root, "/dev/sda2".to_string());
	let state = PipelineState {
		completed: vec![Stage::SelectDisk, Stage::PlanLayout, Stage::Partition],
		disk: None,
		plan: Some(plan::plan_layout(20000, parse_size("0"))?),
		swap_enabled: false,
		partitions,
		mounted: Vec::new(),
	};
	let path = std::env::temp_dir().join("mkarchdisk-journal-test.json");
	journal::checkpoint(&path, &state)?;
	let written = std::fs::read_to_string(&path)?;
	std::fs::remove_file(&path)?;
	let value: serde_json::Value = serde_json::from_str(&written)?;
	assert_eq!(value["completed"][2], "partition");
	assert_eq!(value["partitions"]["efi"], "/dev/sda1");
	assert!(value["updated_at"].is_string());
	Ok(())
}
