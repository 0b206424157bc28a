//! # band 子命令实现
//!
//! 读取能带结构文档，输出能带边、带隙与跃迁能量。
//!
//! ## 功能
//! - 非自旋极化：带隙分析报告（基本带隙、直接带隙及其 k 点）
//! - 自旋极化：每个自旋通道的能带边与带隙表格
//! - 跃迁能量 (`--trans`)、有效带隙 (`--apb`)、剪刀修正 (`--scissor`)
//!
//! ## 依赖关系
//! - 使用 `cli/band.rs` 定义的 BandArgs
//! - 使用 `band/` 的分析函数与 `parsers/json.rs`

use crate::band::report::{render_transitions, transition_energies, BandAnalysis};
use crate::band::selector::split_apb;
use crate::band::structure::{BandStructure, OrbitalSelector};
use crate::cli::band::BandArgs;
use crate::config::AnalysisConfig;
use crate::error::{MushroomError, Result};
use crate::models::unit::EnergyUnit;
use crate::parsers;
use crate::utils::output;

use log::info;
use tabled::Tabled;

/// 每个自旋通道的带隙
#[derive(Debug, Clone, Tabled)]
struct SpinRow {
    #[tabled(rename = "Spin")]
    spin: usize,
    #[tabled(rename = "VBM")]
    vbm: String,
    #[tabled(rename = "CBM")]
    cbm: String,
    #[tabled(rename = "Fund. gap")]
    fund_gap: String,
    #[tabled(rename = "Min. direct gap")]
    direct_gap: String,
    #[tabled(rename = "k-avg gap")]
    kavg_gap: String,
}

/// 执行能带分析
pub fn execute(args: BandArgs, config: &AnalysisConfig) -> Result<()> {
    let mut options = config.edge_options();
    if let Some(m) = args.edge_method {
        options.method = m.into();
    }
    let data = parsers::read_band_file(&args.input, options)?;
    let unit = args.unit.unwrap_or(config.energy_unit);
    let kpts = data.kpts.as_ref();

    let mut bs = data.bs;
    if let Some(scissor) = args.scissor {
        let delta = unit.convert(scissor, bs.unit());
        info!("applying scissor {} {}", scissor, unit);
        bs = bs.apply_scissor(delta, args.force_metal)?;
    }

    if !args.value_only {
        output::print_header("Band Structure Analysis");
        output::print_info(format!(
            "'{}': nspins = {}, nkpts = {}, nbands = {}",
            args.input.display(),
            bs.nspins(),
            bs.nkpts(),
            bs.nbands()
        ));
        if bs.is_metal()? {
            output::print_warning("Occupied band count varies across channels: metallic system");
        }
        if bs.has_infty_cbm()? {
            output::print_warning("Too few bands to locate the conduction band minimum");
        }
    }

    if bs.nspins() == 1 {
        let analysis = BandAnalysis::analyze(&bs, unit)?;
        println!("{}", analysis.render(kpts, args.value_only));
    } else {
        print_spin_table(&bs, unit)?;
    }

    if !args.transitions.is_empty() {
        let trans = transition_energies(&bs, &args.transitions, unit)?;
        println!("{}", render_transitions(&trans, kpts, unit, args.value_only));
    }

    if let Some(apb) = args.apb.as_deref() {
        if let [vb, cb] = apb {
            let mut converted = bs.clone();
            converted.set_unit(unit);
            let gap = effective_gap(&converted, vb, cb)?;
            if args.value_only {
                println!("{:8.4}", gap);
            } else {
                println!("> Effective gap ({}) {} -> {}: {:8.4}", unit, vb, cb, gap);
            }
        }
    }

    Ok(())
}

/// 解析 "atom:projector:band" 并求有效带隙
fn effective_gap(bs: &BandStructure, vb_apb: &str, cb_apb: &str) -> Result<f64> {
    let (ivb, vb) = parse_apb(bs, vb_apb)?;
    let (icb, cb) = parse_apb(bs, cb_apb)?;
    bs.effective_gap(ivb, icb, &vb, &cb)
}

/// 能带部分须为 `all` 或恰好一个能带
fn parse_apb(bs: &BandStructure, apb: &str) -> Result<(Option<usize>, OrbitalSelector)> {
    let (atm, prj, band) = split_apb(apb)?;
    let ib = if band.is_all() {
        None
    } else {
        match bs.resolve_bands(&band)?.as_slice() {
            [ib] => Some(*ib),
            bands => {
                return Err(MushroomError::InvalidArgument(format!(
                    "expect a single band in '{}', got {}",
                    apb,
                    bands.len()
                )))
            }
        }
    };
    Ok((ib, OrbitalSelector::new(atm, prj)))
}

fn print_spin_table(bs: &BandStructure, unit: EnergyUnit) -> Result<()> {
    let mut bs = bs.clone();
    bs.set_unit(unit);
    let vbm = bs.vbm_sp()?.clone();
    let cbm = bs.cbm_sp()?.clone();
    let fund = bs.fund_gap_sp()?;
    let direct = bs.direct_gap_sp()?;
    let kavg = bs.kavg_gap()?;

    let rows: Vec<SpinRow> = (0..bs.nspins())
        .map(|is| SpinRow {
            spin: is,
            vbm: format!("{:.4}", vbm[is]),
            cbm: format!("{:.4}", cbm[is]),
            fund_gap: format!("{:.4}", fund[is]),
            direct_gap: format!("{:.4}", direct[is]),
            kavg_gap: format!("{:.4}", kavg[is]),
        })
        .collect();

    output::print_header(format!("Spin-resolved band edges ({})", unit));
    output::print_table(&rows);
    println!(
        "> Global: VBM = {:.4}, CBM = {:.4}, fundamental gap = {:.4}",
        bs.vbm()?,
        bs.cbm()?,
        bs.fund_gap()?
    );
    Ok(())
}
