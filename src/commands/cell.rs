//! # cell 子命令实现
//!
//! 读取晶胞，按参数依次变换后输出摘要，可选写出 JSON 或 POSCAR。
//!
//! ## 处理顺序
//! 右手化 → 超胞 → 原胞 / 标准胞 → 坐标系与单位 → 排序 → 居中
//!
//! ## 依赖关系
//! - 使用 `cli/cell.rs` 定义的 CellArgs
//! - 使用 `models/cell.rs`, `models/symmetry.rs`
//! - 使用 `parsers/` 读写晶胞文件

use crate::cli::cell::CellArgs;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::cell::{Cell, ImageOrder};
use crate::models::symmetry::SymmetryOperations;
use crate::parsers;
use crate::utils::output;

use log::info;
use tabled::Tabled;

#[derive(Debug, Clone, Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl PropertyRow {
    fn new(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct SymopRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Rotation")]
    rotation: String,
    #[tabled(rename = "Translation")]
    translation: String,
}

/// 执行晶胞处理
pub fn execute(args: CellArgs, config: &AnalysisConfig) -> Result<()> {
    output::print_header("Cell");

    let mut cell = parsers::read_cell_file(&args.input)?;
    let symprec = args.symprec.unwrap_or(config.symprec);
    info!("read {} atoms from {}", cell.natm(), args.input.display());

    if args.right_handed && cell.make_right_handed() {
        output::print_info("Lattice vectors a and b swapped to make the lattice right-handed");
    }

    if let Some(n) = args.supercell.as_deref() {
        if let [n1, n2, n3] = *n {
            let order = if args.block {
                ImageOrder::Blocks
            } else {
                ImageOrder::Consecutive
            };
            let (sc, _) = cell.supercell(n1, n2, n3, order, true)?;
            output::print_info(format!("{}x{}x{} supercell, {} atoms", n1, n2, n3, sc.natm()));
            cell = sc;
        }
    }

    if args.primitize {
        cell = cell.primitize(symprec)?;
        output::print_info(format!("Primitive cell, {} atoms", cell.natm()));
    } else if args.standardize {
        cell = cell.standardize(symprec, false)?;
        output::print_info(format!("Standardized cell, {} atoms", cell.natm()));
    }

    if let Some(sys) = args.coord {
        cell.set_coord_sys(sys)?;
    }
    if let Some(unit) = args.unit {
        cell.set_unit(unit);
    }
    if let Some(axis) = args.sort {
        cell.sort_posi(axis, args.reverse)?;
    }
    if let Some(axes) = args.centering.as_deref() {
        cell.centering(axes)?;
    }

    output::print_table(&summary_rows(&cell));

    if args.symops {
        let ops = cell.get_symops(symprec)?;
        print_symops(&ops);
    }

    if let Some(out) = args.output.as_deref() {
        parsers::write_cell_file(&cell, out)?;
        output::print_saved(format!("{} atoms", cell.natm()), out);
    }
    Ok(())
}

fn summary_rows(cell: &Cell) -> Vec<PropertyRow> {
    let [a, b, c, alpha, beta, gamma] = cell.latt_consts();
    let (syms, nats) = cell.get_sym_nat();
    let formula: String = syms
        .iter()
        .zip(nats.iter())
        .map(|(s, n)| format!("{}{}", s, n))
        .collect();
    let mut rows = vec![
        PropertyRow::new("Formula", formula),
        PropertyRow::new("Atoms", cell.natm().to_string()),
        PropertyRow::new("a, b, c", format!("{:.6} {:.6} {:.6} ({})", a, b, c, cell.unit())),
        PropertyRow::new(
            "alpha, beta, gamma",
            format!("{:.4} {:.4} {:.4}", alpha, beta, gamma),
        ),
        PropertyRow::new("Volume", format!("{:.6}", cell.vol())),
        PropertyRow::new("Coordinates", cell.coord_sys().to_string()),
    ];
    if !cell.comment().is_empty() {
        rows.push(PropertyRow::new("Comment", cell.comment().to_string()));
    }
    if cell.use_select_dyn() {
        rows.push(PropertyRow::new("Selective dynamics", "yes".to_string()));
    }
    rows
}

fn print_symops(ops: &SymmetryOperations) {
    match ops.space_group {
        Some(sg) => output::print_info(format!(
            "Space group {}, {} operation(s)",
            sg,
            ops.len()
        )),
        None => output::print_warning("Symmetry not detected, identity only"),
    }
    let rows: Vec<SymopRow> = ops
        .operations
        .iter()
        .enumerate()
        .map(|(i, op)| SymopRow {
            index: i + 1,
            rotation: op
                .rotation
                .iter()
                .map(|r| format!("{:2} {:2} {:2}", r[0], r[1], r[2]))
                .collect::<Vec<_>>()
                .join(" | "),
            translation: format!(
                "{:.4} {:.4} {:.4}",
                op.translation[0], op.translation[1], op.translation[2]
            ),
        })
        .collect();
    output::print_table(&rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cell::CellOptions;

    #[test]
    fn test_summary_rows() {
        let cell = Cell::zincblende("Ga", "As", 5.65, false, CellOptions::default()).unwrap();
        let rows = summary_rows(&cell);
        assert_eq!(rows[0].value, "Ga4As4");
        assert_eq!(rows[1].value, "8");
        assert!(rows[4].value.starts_with("180.36"));
    }
}
