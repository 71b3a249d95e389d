//! Rollup commands, backed by tsup

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use crate::command::{Command, CommandContext};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOutput {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup_file_path: Option<PathBuf>,
}

#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {}

pub struct GenerateCommand;

impl Command for GenerateCommand {
    type Args = GenerateArgs;
    type Output = RollupOutput;
    const ID: &'static str = "rollup generate";

    fn run(&self, cx: &CommandContext<'_>, _args: GenerateArgs) -> Result<RollupOutput> {
        let (enabled, rollup) = cx.with_config(|config| (config.global.rollup, config.api.rollup.clone()));

        if !enabled {
            cx.debug("Rollups are disabled, so we're skipping rollup generation");
            return Ok(RollupOutput {
                message: "Rollups are disabled.".to_string(),
                rollup_file_path: None,
            });
        }

        cx.info("Generating API rollup");

        cx.build(false)?;

        cx.debug("Running tsup");
        cx.pnpm(["exec", "tsup"], None)?;

        Ok(RollupOutput {
            message: "Rollup generated.".to_string(),
            rollup_file_path: Some(PathBuf::from(rollup)),
        })
    }
}
