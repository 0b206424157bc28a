//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `band`: 能带结构分析（带隙、跃迁、有效带隙、剪刀修正）
//! - `gap`: 批量带隙汇总
//! - `resolve`: 能带交叉消解
//! - `dos`: 高斯展宽态密度
//! - `cell`: 晶胞操作（超胞、原胞、标准胞、坐标与单位）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: band, cell, dos, resolve

pub mod band;
pub mod cell;
pub mod dos;
pub mod resolve;

use crate::config::CONFIG_ENV;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Mushroom - 能带结构与晶胞分析工具箱
#[derive(Parser)]
#[command(name = "mushroom")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Band-structure and crystal-cell analysis toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file with analysis thresholds
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Analyze band edges, gaps and transitions of a band-structure document
    Band(band::BandArgs),

    /// Summarize band gaps of many band-structure documents
    Gap(band::GapArgs),

    /// Resolve band crossings along a k-path table
    Resolve(resolve::ResolveArgs),

    /// Compute Gaussian-smeared density of states
    Dos(dos::DosArgs),

    /// Manipulate crystal cells (supercell, primitive, standard, coordinates)
    Cell(cell::CellArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["mushroom", "-vv", "band", "bs.json", "--unit", "ry"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Band(_)));
    }
}
