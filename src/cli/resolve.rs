//! # resolve 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/resolve.rs`

use clap::Args;
use std::path::PathBuf;

/// resolve 子命令参数
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// CSV table: first column kx, other columns bands
    pub input: PathBuf,

    /// Derivative mismatch threshold for a crossing
    #[arg(short, long)]
    pub deriv_thres: Option<f64>,

    /// Output CSV (default: <input>_resolved.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
