//! # VASP POSCAR 读写
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line
//! 1.0                    # 缩放系数，负数表示体积
//! a1 a2 a3               # 晶格矢量 a
//! b1 b2 b3               # 晶格矢量 b
//! c1 c2 c3               # 晶格矢量 c
//! Element1 Element2 ...  # 元素符号 (VASP 5+)
//! n1 n2 ...              # 各元素原子数
//! Selective dynamics     # 可选
//! Direct/Cartesian       # 坐标类型
//! x1 y1 z1 [T T T]       # 原子坐标及弛豫标记
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/cell.rs`

use crate::error::{MushroomError, Result};
use crate::models::cell::{Cell, CellOptions, CoordSys, SdFlag};
use crate::models::unit::LengthUnit;

use std::collections::BTreeMap;
use std::fmt::Write as _;

fn poscar_error(name: &str, reason: impl Into<String>) -> MushroomError {
    MushroomError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

fn parse_floats(line: &str, n: usize) -> Option<Vec<f64>> {
    let v: Vec<f64> = line
        .split_whitespace()
        .take(n)
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (v.len() == n).then_some(v)
}

fn parse_flag(token: &str) -> Option<bool> {
    match token.chars().next()? {
        'T' | 't' => Some(true),
        'F' | 'f' => Some(false),
        _ => None,
    }
}

/// 从字符串内容解析 POSCAR，`name` 只用于错误信息
pub fn parse_poscar_content(content: &str, name: &str) -> Result<Cell> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 8 {
        return Err(poscar_error(name, "File too short"));
    }

    let comment = lines[0].trim().to_string();
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| poscar_error(name, "Invalid scaling factor at line 2"))?;

    let mut latt = [[0.0; 3]; 3];
    for (i, row) in latt.iter_mut().enumerate() {
        let v = parse_floats(lines[2 + i], 3)
            .ok_or_else(|| poscar_error(name, format!("Invalid lattice vector at line {}", 3 + i)))?;
        *row = [v[0], v[1], v[2]];
    }
    // 负缩放系数给出目标体积
    let scale = if scale < 0.0 {
        let raw = Cell::new(latt, &["X"], &[[0.0; 3]], CellOptions::default())?;
        (scale.abs() / raw.vol()).cbrt()
    } else {
        scale
    };
    let latt = latt.map(|row| row.map(|x| x * scale));

    let line5: Vec<&str> = lines[5].split_whitespace().collect();
    let (elements, counts, mut iline) = if line5.first().is_some_and(|t| t.parse::<usize>().is_ok()) {
        // VASP 4：没有元素行
        let counts: Vec<usize> = line5.iter().filter_map(|s| s.parse().ok()).collect();
        let elements = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect::<Vec<_>>();
        (elements, counts, 6)
    } else {
        let elements: Vec<String> = line5.iter().map(|s| s.to_string()).collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| poscar_error(name, "Invalid atom counts at line 7"))?;
        (elements, counts, 7)
    };
    if elements.len() != counts.len() {
        return Err(poscar_error(
            name,
            format!("{} elements but {} counts", elements.len(), counts.len()),
        ));
    }

    let select_dyn = lines
        .get(iline)
        .is_some_and(|l| l.trim().to_lowercase().starts_with('s'));
    if select_dyn {
        iline += 1;
    }
    let coord_type = lines
        .get(iline)
        .ok_or_else(|| poscar_error(name, "Missing coordinate type line"))?
        .trim()
        .to_lowercase();
    let coord_sys = if coord_type.starts_with('c') || coord_type.starts_with('k') {
        CoordSys::Cartesian
    } else {
        CoordSys::Direct
    };
    iline += 1;

    let natm: usize = counts.iter().sum();
    let mut atms = Vec::with_capacity(natm);
    let mut posi = Vec::with_capacity(natm);
    let mut flags: BTreeMap<usize, SdFlag> = BTreeMap::new();
    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let ia = atms.len();
            let line = lines
                .get(iline + ia)
                .ok_or_else(|| poscar_error(name, format!("Missing position of atom {}", ia + 1)))?;
            let v = parse_floats(line, 3).ok_or_else(|| {
                poscar_error(name, format!("Invalid position at line {}", iline + ia + 1))
            })?;
            let p = match coord_sys {
                CoordSys::Cartesian => [v[0] * scale, v[1] * scale, v[2] * scale],
                CoordSys::Direct => [v[0], v[1], v[2]],
            };
            if select_dyn {
                let f: Vec<bool> = line.split_whitespace().skip(3).take(3).filter_map(parse_flag).collect();
                if f.len() != 3 {
                    return Err(poscar_error(
                        name,
                        format!("Invalid selective dynamics flags at line {}", iline + ia + 1),
                    ));
                }
                flags.insert(ia, [f[0], f[1], f[2]]);
            }
            atms.push(elem.clone());
            posi.push(p);
        }
    }

    let options = CellOptions {
        unit: LengthUnit::Ang,
        coord_sys,
        select_dyn: flags,
        comment: Some(comment),
        ..CellOptions::default()
    };
    Cell::new(latt, &atms, &posi, options)
}

/// 转换为 POSCAR 字符串，长度单位为 Å
pub fn to_poscar_string(cell: &Cell) -> String {
    let mut cell = cell.clone();
    cell.set_unit(LengthUnit::Ang);

    let mut out = String::new();
    let _ = writeln!(out, "{}", cell.comment());
    let _ = writeln!(out, "1.0");
    for row in cell.latt_rows() {
        let _ = writeln!(out, "  {:16.10}  {:16.10}  {:16.10}", row[0], row[1], row[2]);
    }
    let (syms, nats) = cell.get_sym_nat();
    let _ = writeln!(out, "   {}", syms.join("   "));
    let nats: Vec<String> = nats.iter().map(usize::to_string).collect();
    let _ = writeln!(out, "   {}", nats.join("   "));

    let use_sd = cell.use_select_dyn();
    if use_sd {
        let _ = writeln!(out, "Selective dynamics");
    }
    let _ = writeln!(
        out,
        "{}",
        match cell.coord_sys() {
            CoordSys::Direct => "Direct",
            CoordSys::Cartesian => "Cartesian",
        }
    );
    let flags = cell.sd_flags();
    for (p, flag) in cell.posi().iter().zip(flags.iter()) {
        let _ = write!(out, "  {:16.10}  {:16.10}  {:16.10}", p.x, p.y, p.z);
        if use_sd {
            let f: Vec<&str> = flag.iter().map(|&b| if b { "T" } else { "F" }).collect();
            let _ = write!(out, "  {}", f.join(" "));
        }
        out.push('\n');
    }
    out
}
