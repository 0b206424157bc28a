//! # dos 子命令实现
//!
//! 由能带结构做高斯展宽生成态密度，写出 CSV。
//!
//! ## 功能
//! - 总态密度，自旋极化时每个通道一列
//! - `--ap` 指定的投影态密度列
//! - 可选以费米能为能量零点
//!
//! ## 依赖关系
//! - 使用 `cli/dos.rs` 定义的 DosArgs
//! - 使用 `band/structure.rs` 的展宽与 `models/dos.rs`
//! - 使用 `parsers/table.rs` 写出

use crate::band::selector::split_ap;
use crate::cli::dos::DosArgs;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::dos::{DensityOfStates, SpinChannel};
use crate::parsers;
use crate::utils::output;

use log::info;
use ndarray::Array1;

const SPIN_SUFFIX: [&str; 2] = ["up", "dn"];

/// 执行态密度计算
pub fn execute(args: DosArgs, config: &AnalysisConfig) -> Result<()> {
    output::print_header("Density of States");

    let data = parsers::read_band_file(&args.input, config.edge_options())?;
    let bs = data.bs;
    let unit = args.unit.unwrap_or(config.energy_unit);

    // 命令行数值按输出单位给出
    let to_bs = |x: f64| unit.convert(x, bs.unit());
    let mut opts = config.dos_options();
    if let Some(sigma) = args.sigma {
        opts.sigma = sigma;
    }
    opts.sigma = to_bs(opts.sigma);
    if let Some(nedos) = args.nedos {
        opts.nedos = nedos;
    }
    opts.emin = args.emin.map(to_bs);
    opts.emax = args.emax.map(to_bs);
    info!("dos options: {:?}", opts);

    let mut dos = bs.get_dos(&opts)?;
    dos.set_unit(unit);

    let egrid = if args.zero_fermi {
        output::print_info(format!("Fermi level {:.4} {} set to zero", dos.efermi(), unit));
        dos.egrid() - dos.efermi()
    } else {
        dos.egrid().clone()
    };

    let columns = dos_columns(&dos, &args.ap)?;
    parsers::write_dos_table(&args.output, &egrid, &columns)?;
    output::print_saved(
        format!("DOS, {} points x {} column(s)", dos.nedos(), columns.len()),
        &args.output,
    );
    Ok(())
}

/// 总态密度列与各 `atom:projector` 的投影态密度列
fn dos_columns(dos: &DensityOfStates, aps: &[String]) -> Result<Vec<(String, Array1<f64>)>> {
    let nspins = dos.nspins();
    let tdos = dos.get_tdos(SpinChannel::All)?;
    let mut columns: Vec<(String, Array1<f64>)> = if nspins == 1 {
        vec![("tdos".to_string(), tdos.row(0).to_owned())]
    } else {
        tdos.rows()
            .into_iter()
            .zip(SPIN_SUFFIX)
            .map(|(row, sfx)| (format!("tdos_{}", sfx), row.to_owned()))
            .collect()
    };

    for ap in aps {
        let (atm, prj) = split_ap(ap)?;
        if nspins == 1 {
            columns.push((ap.clone(), dos.get_pdos(None, &atm, &prj)?));
        } else {
            for (is, sfx) in SPIN_SUFFIX.iter().enumerate() {
                columns.push((format!("{}_{}", ap, sfx), dos.get_pdos(Some(is), &atm, &prj)?));
            }
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::unit::EnergyUnit;
    use ndarray::{array, Array4};

    fn spin_dos() -> DensityOfStates {
        let egrid = array![-1.0, 0.0, 1.0];
        let tdos = array![[1.0, 2.0, 3.0], [0.5, 1.0, 1.5]];
        let mut dos = DensityOfStates::new(egrid, tdos, None, EnergyUnit::Ev).unwrap();
        let pdos = Array4::from_elem((2, 3, 2, 2), 0.25);
        dos.set_pdos(
            pdos,
            Some(vec!["Ga".to_string(), "As".to_string()]),
            Some(vec!["s".to_string(), "p".to_string()]),
        )
        .unwrap();
        dos
    }

    #[test]
    fn test_dos_columns_spin_polarized() {
        let dos = spin_dos();
        let cols = dos_columns(&dos, &["Ga:".to_string(), "As:p".to_string()]).unwrap();
        let names: Vec<&str> = cols.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["tdos_up", "tdos_dn", "Ga:_up", "Ga:_dn", "As:p_up", "As:p_dn"]
        );
        assert!((cols[1].1[2] - 1.5).abs() < 1e-12);
        // Ga 的 s 与 p 之和
        assert!((cols[2].1[0] - 0.5).abs() < 1e-12);
        assert!((cols[4].1[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_dos_columns_unknown_atom() {
        let dos = spin_dos();
        assert!(dos_columns(&dos, &["In:s".to_string()]).is_err());
    }
}
