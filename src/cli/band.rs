//! # band / gap 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/band.rs` 与 `commands/gap.rs`

use crate::band::edges::EdgeMethod;
use crate::band::report::TransitionSpec;
use crate::models::unit::EnergyUnit;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 能带边定位方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum EdgeMethodArg {
    /// Count occupied bands per channel
    Occupation,
    /// Search occupied/unoccupied bands by eigenvalue
    Eigenvalue,
}

impl From<EdgeMethodArg> for EdgeMethod {
    fn from(m: EdgeMethodArg) -> Self {
        match m {
            EdgeMethodArg::Occupation => EdgeMethod::Occupation,
            EdgeMethodArg::Eigenvalue => EdgeMethod::Eigenvalue,
        }
    }
}

/// band 子命令参数
#[derive(Args, Debug)]
pub struct BandArgs {
    /// Band-structure JSON document
    pub input: PathBuf,

    /// Energy unit of the output (ev, ry, au)
    #[arg(long)]
    pub unit: Option<EnergyUnit>,

    /// Band-edge method
    #[arg(long, value_enum)]
    pub edge_method: Option<EdgeMethodArg>,

    /// Transitions "ivk:ick", "ik:ivb:icb" or "ivk:ick:ivb:icb" (repeatable)
    #[arg(short, long = "trans")]
    pub transitions: Vec<TransitionSpec>,

    /// Effective gap between two "atom:projector:band" selections
    #[arg(long, num_args = 2, value_names = ["VB_APB", "CB_APB"])]
    pub apb: Option<Vec<String>>,

    /// Shift conduction bands by this amount before analysis
    #[arg(long, allow_hyphen_values = true)]
    pub scissor: Option<f64>,

    /// Allow the scissor to close the gap
    #[arg(long, default_value_t = false)]
    pub force_metal: bool,

    /// Print values only
    #[arg(short = 'q', long, default_value_t = false)]
    pub value_only: bool,
}

/// gap 子命令参数
#[derive(Args, Debug)]
pub struct GapArgs {
    /// Band-structure JSON document or directory of documents
    pub input: PathBuf,

    /// Glob pattern for input files (comma separated)
    #[arg(long, default_value = "*.json")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Energy unit of the output (ev, ry, au)
    #[arg(long)]
    pub unit: Option<EnergyUnit>,

    /// Band-edge method
    #[arg(long, value_enum)]
    pub edge_method: Option<EdgeMethodArg>,

    /// Save the summary as CSV
    #[arg(long)]
    pub output_csv: Option<PathBuf>,
}
