//! # resolve 子命令实现
//!
//! 读取能带表格，消解能带交叉后写回。
//!
//! ## 依赖关系
//! - 使用 `cli/resolve.rs` 定义的 ResolveArgs
//! - 使用 `band/crossing.rs` 与 `parsers/table.rs`

use crate::band::crossing::resolve_band_crossing;
use crate::cli::resolve::ResolveArgs;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::parsers::table::{read_band_table, write_band_table};
use crate::utils::output;

use std::path::{Path, PathBuf};
use tabled::Tabled;

#[derive(Debug, Clone, Tabled)]
struct SwapRow {
    #[tabled(rename = "k index")]
    index: usize,
    #[tabled(rename = "kx")]
    kx: String,
    #[tabled(rename = "Band A")]
    band_a: String,
    #[tabled(rename = "Band B")]
    band_b: String,
}

/// 执行交叉消解
pub fn execute(args: ResolveArgs, config: &AnalysisConfig) -> Result<()> {
    output::print_header("Resolving Band Crossings");

    let mut table = read_band_table(&args.input)?;
    let thres = args.deriv_thres.unwrap_or(config.deriv_thres);
    output::print_info(format!(
        "'{}': {} k-points, {} bands, threshold {}",
        args.input.display(),
        table.kx.len(),
        table.bands.ncols(),
        thres
    ));

    let swaps = resolve_band_crossing(&table.kx, &mut table.bands, thres)?;

    if swaps.is_empty() {
        output::print_info("No crossing detected");
    } else {
        let rows: Vec<SwapRow> = swaps
            .iter()
            .map(|s| SwapRow {
                index: s.index,
                kx: format!("{:.6}", table.kx[s.index]),
                band_a: table.headers[s.bands.0].clone(),
                band_b: table.headers[s.bands.1].clone(),
            })
            .collect();
        output::print_table(&rows);
    }

    let out = args
        .output
        .unwrap_or_else(|| default_output(&args.input));
    write_band_table(&out, &table)?;
    output::print_saved(format!("{} swap(s), resolved bands", swaps.len()), &out);
    Ok(())
}

/// `<stem>_resolved.csv`，与输入同目录
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "bands".to_string());
    input.with_file_name(format!("{}_resolved.csv", stem))
}
