//! # gap 子命令实现
//!
//! 批量读取能带结构文档，并行计算带隙并汇总。
//!
//! ## 功能
//! - 扫描目录中匹配模式的文件
//! - 使用 rayon 并行分析
//! - 生成终端表格和 CSV 输出
//!
//! ## 依赖关系
//! - 使用 `cli/band.rs` 定义的 GapArgs
//! - 使用 `batch/` 的收集器与执行器
//! - 使用 `utils/output.rs`

use crate::band::edges::EdgeOptions;
use crate::band::structure::BandStructure;
use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::band::GapArgs;
use crate::config::AnalysisConfig;
use crate::error::{MushroomError, Result};
use crate::models::unit::EnergyUnit;
use crate::parsers;
use crate::utils::output;

use log::{debug, warn};
use ndarray::Array1;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

/// 单个文件的带隙汇总
#[derive(Debug, Clone, Serialize)]
pub struct GapSummary {
    pub file: String,
    pub nspins: usize,
    pub metal: bool,
    pub vbm: f64,
    pub cbm: f64,
    pub fund_gap: f64,
    pub direct_gap: f64,
    pub kavg_gap: f64,
}

#[derive(Debug, Clone, Tabled)]
struct GapRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Spins")]
    nspins: usize,
    #[tabled(rename = "Metal")]
    metal: String,
    #[tabled(rename = "VBM")]
    vbm: String,
    #[tabled(rename = "CBM")]
    cbm: String,
    #[tabled(rename = "Fund. gap")]
    fund_gap: String,
    #[tabled(rename = "Direct gap")]
    direct_gap: String,
    #[tabled(rename = "k-avg gap")]
    kavg_gap: String,
}

impl From<&GapSummary> for GapRow {
    fn from(s: &GapSummary) -> Self {
        Self {
            file: s.file.clone(),
            nspins: s.nspins,
            metal: if s.metal { "yes" } else { "no" }.to_string(),
            vbm: format!("{:.4}", s.vbm),
            cbm: format!("{:.4}", s.cbm),
            fund_gap: format!("{:.4}", s.fund_gap),
            direct_gap: format!("{:.4}", s.direct_gap),
            kavg_gap: format!("{:.4}", s.kavg_gap),
        }
    }
}

/// 执行批量带隙分析
pub fn execute(args: GapArgs, config: &AnalysisConfig) -> Result<()> {
    output::print_header("Batch Band Gap Analysis");

    if !args.input.exists() {
        return Err(MushroomError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect();
    if files.is_empty() {
        return Err(MushroomError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(format!(
        "Found {} file(s), using {} thread(s)",
        files.len(),
        runner.jobs()
    ));

    let mut options = config.edge_options();
    if let Some(m) = args.edge_method {
        options.method = m.into();
    }
    let unit = args.unit.unwrap_or(config.energy_unit);

    let result = runner.run(files, |file| process_file(file, &options, unit))?;

    for (path, err) in &result.failures {
        output::print_error(format!("{}: {}", path, err));
    }

    if !result.outputs.is_empty() {
        let rows: Vec<GapRow> = result.outputs.iter().map(GapRow::from).collect();
        output::print_header(format!("Band gaps ({})", unit));
        output::print_table(&rows);
    }

    if let Some(csv_path) = args.output_csv.as_deref() {
        write_csv(csv_path, &result.outputs)?;
        output::print_saved("Gap summary", csv_path);
    }

    output::print_separator();
    output::print_done(format!(
        "{} analyzed, {} skipped, {} failed (total {})",
        result.success(),
        result.skipped,
        result.failed(),
        result.total()
    ));
    Ok(())
}

/// 处理单个文件，缺少占据数的文档被跳过
fn process_file(
    file: &PathBuf,
    options: &EdgeOptions,
    unit: EnergyUnit,
) -> ProcessResult<GapSummary> {
    let data = match parsers::read_band_file(file, *options) {
        Ok(d) => d,
        Err(e) => return ProcessResult::Failed(file.display().to_string(), e.to_string()),
    };
    if data.bs.occ().is_none() {
        warn!("{}: no occupations, skipped", file.display());
        return ProcessResult::Skipped(file.display().to_string());
    }
    let mut bs = data.bs;
    bs.set_unit(unit);
    ProcessResult::from_result(file, summarize(file, &bs))
}

fn summarize(file: &Path, bs: &BandStructure) -> Result<GapSummary> {
    let min = |a: Array1<f64>| a.fold(f64::INFINITY, |x, &y| x.min(y));
    let summary = GapSummary {
        file: file.display().to_string(),
        nspins: bs.nspins(),
        metal: bs.is_metal()?,
        vbm: bs.vbm()?,
        cbm: bs.cbm()?,
        fund_gap: bs.fund_gap()?,
        direct_gap: bs.direct_gap()?,
        kavg_gap: min(bs.kavg_gap()?),
    };
    debug!("{:?}", summary);
    Ok(summary)
}

fn write_csv(path: &Path, rows: &[GapSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| MushroomError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INSULATOR: &str = r#"{
        "eigen": [[[-1.0, 1.0], [-0.8, 1.2]]],
        "occ": [[[1.0, 0.0], [1.0, 0.0]]]
    }"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mushroom_gap_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_process_file_summary() {
        let dir = temp_dir("summary");
        let path = dir.join("a.json");
        fs::write(&path, INSULATOR).unwrap();
        match process_file(&path, &EdgeOptions::default(), EnergyUnit::Ev) {
            ProcessResult::Success(s) => {
                assert!(!s.metal);
                assert!((s.fund_gap - 1.8).abs() < 1e-10);
                assert!((s.direct_gap - 2.0).abs() < 1e-10);
                assert!((s.kavg_gap - 2.0).abs() < 1e-10);
            }
            other => panic!("unexpected result {:?}", other),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_process_file_without_occupations_is_skipped() {
        let dir = temp_dir("skip");
        let path = dir.join("b.json");
        fs::write(&path, r#"{"eigen": [[[-1.0, 1.0]]]}"#).unwrap();
        assert!(matches!(
            process_file(&path, &EdgeOptions::default(), EnergyUnit::Ev),
            ProcessResult::Skipped(_)
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_csv() {
        let dir = temp_dir("csv");
        let path = dir.join("gaps.csv");
        let rows = vec![GapSummary {
            file: "a.json".to_string(),
            nspins: 1,
            metal: false,
            vbm: -0.8,
            cbm: 1.0,
            fund_gap: 1.8,
            direct_gap: 2.0,
            kavg_gap: 2.0,
        }];
        write_csv(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("file,nspins,metal,vbm,cbm,fund_gap,direct_gap,kavg_gap"));
        assert!(text.contains("a.json,1,false"));
        let _ = fs::remove_dir_all(&dir);
    }
}
