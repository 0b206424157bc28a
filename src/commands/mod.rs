//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`, `parsers/`, `band/`, `models/`, `utils/`
//! - 子模块: band, gap, resolve, dos, cell

pub mod band;
pub mod cell;
pub mod dos;
pub mod gap;
pub mod resolve;

use crate::cli::Commands;
use crate::config::AnalysisConfig;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands, config: &AnalysisConfig) -> Result<()> {
    match cmd {
        Commands::Band(args) => band::execute(args, config),
        Commands::Gap(args) => gap::execute(args, config),
        Commands::Resolve(args) => resolve::execute(args, config),
        Commands::Dos(args) => dos::execute(args, config),
        Commands::Cell(args) => cell::execute(args, config),
    }
}
