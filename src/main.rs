//! # Mushroom 命令行入口
//!
//! ## 子命令
//! - `band` - 能带边、带隙、跃迁能量与有效带隙
//! - `gap` - 批量带隙汇总
//! - `resolve` - 能带交叉消解
//! - `dos` - 高斯展宽态密度
//! - `cell` - 晶胞变换与格式转换 (JSON, POSCAR)
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── config.rs   (配置文件)
//!   ├── commands/   (命令执行逻辑)
//!   └── utils/      (日志与输出)
//! ```

use clap::Parser;
use mushroom::cli::Cli;
use mushroom::config::AnalysisConfig;
use mushroom::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logger::init_logger(cli.verbose);

    let result = AnalysisConfig::load_or_default(cli.config.as_deref())
        .and_then(|config| commands::run(cli.command, &config));

    if let Err(e) = result {
        utils::output::print_error(e);
        std::process::exit(1);
    }
}
