//! # dos 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/dos.rs`

use crate::models::unit::EnergyUnit;

use clap::Args;
use std::path::PathBuf;

/// dos 子命令参数
#[derive(Args, Debug)]
pub struct DosArgs {
    /// Band-structure JSON document
    pub input: PathBuf,

    /// Gaussian smearing width
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Number of energy grid points
    #[arg(long)]
    pub nedos: Option<usize>,

    /// Lower bound of the energy window
    #[arg(long, allow_hyphen_values = true)]
    pub emin: Option<f64>,

    /// Upper bound of the energy window
    #[arg(long, allow_hyphen_values = true)]
    pub emax: Option<f64>,

    /// Projected DOS columns as "atom:projector" (repeatable)
    #[arg(long)]
    pub ap: Vec<String>,

    /// Energy unit of the output (ev, ry, au)
    #[arg(long)]
    pub unit: Option<EnergyUnit>,

    /// Put the Fermi level at zero
    #[arg(long, default_value_t = false)]
    pub zero_fermi: bool,

    /// Output CSV file
    #[arg(short, long, default_value = "dos.csv")]
    pub output: PathBuf,
}
