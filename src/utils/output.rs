//! # 终端输出
//!
//! 统一的彩色状态行、标题栏与表格打印。错误写到 stderr，其余写到 stdout。
//!
//! ## 依赖关系
//! - 被 `main.rs` 与所有 `commands/` 模块使用
//! - 使用 `colored` 与 `tabled`

use colored::Colorize;
use std::fmt::Display;
use std::path::Path;
use tabled::{Table, Tabled};

const RULE_WIDTH: usize = 60;

/// 打印错误消息
pub fn print_error(msg: impl Display) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: impl Display) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: impl Display) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: impl Display) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印输出文件位置
pub fn print_saved(what: impl Display, path: &Path) {
    println!(
        "{} {} {} {}",
        "[OK]".green().bold(),
        what,
        "->".cyan(),
        path.display().to_string().dimmed()
    );
}

/// 打印标题栏
pub fn print_header(title: impl Display) {
    let line = "─".repeat(RULE_WIDTH);
    println!("\n{}", line.dimmed());
    println!("  {}", title.to_string().bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}

/// 打印表格，空列表时不输出
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        return;
    }
    println!("{}", Table::new(rows));
}
