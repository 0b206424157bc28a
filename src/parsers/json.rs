//! # JSON 输入解析
//!
//! ## 能带结构文档
//! ```text
//! {
//!   "eigen": [[[...]]],          # [nspins, nkpts, nbands]
//!   "occ": [[[...]]],            # 可选，形状同 eigen
//!   "weight": [...],             # 可选，[nkpts]
//!   "efermi": 5.2,               # 可选
//!   "unit": "ev",                # 可选，ev / ry / au
//!   "kpts": [[kx, ky, kz], ...], # 可选
//!   "pwav": [[[[[...]]]]],       # 可选，[nspins, nkpts, nbands, natms, nprjs]
//!   "atms": ["Ga", "As"],        # 可选
//!   "prjs": ["s", "p"]           # 可选
//! }
//! ```
//! 不规则嵌套数组直接报错，不做填充。
//!
//! ## 晶胞文档
//! 字段同 [`CellRecord`]，或以 `factory` 键指定原型结构及其参数：
//! `{"factory": "zincblende", "atom1": "Ga", "atom2": "As", "a": 5.65, "primitive": true}`。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 与 `commands/` 使用
//! - 使用 `serde_json`, `ndarray`

use crate::band::edges::EdgeOptions;
use crate::band::structure::BandStructure;
use crate::error::{MushroomError, Result};
use crate::models::cell::{Cell, CellOptions, CellRecord};
use crate::models::unit::{EnergyUnit, LengthUnit};

use log::debug;
use ndarray::{Array1, Array2, ArrayD, Ix2, Ix3, Ix5, IxDyn};
use serde::Deserialize;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────
// 嵌套数组
// ─────────────────────────────────────────────────────────────

fn walk(
    v: &Value,
    level: usize,
    shape: &mut [Option<usize>],
    flat: &mut Vec<f64>,
) -> std::result::Result<(), String> {
    if level == shape.len() {
        let x = v
            .as_f64()
            .ok_or_else(|| format!("expected number at depth {}, got {}", level, v))?;
        flat.push(x);
        return Ok(());
    }
    let arr = v
        .as_array()
        .ok_or_else(|| format!("expected array at depth {}, got {}", level, v))?;
    match shape[level] {
        None => shape[level] = Some(arr.len()),
        Some(n) if n != arr.len() => {
            return Err(format!(
                "ragged array at depth {}: length {} vs {}",
                level,
                arr.len(),
                n
            ))
        }
        Some(_) => {}
    }
    for item in arr {
        walk(item, level + 1, shape, flat)?;
    }
    Ok(())
}

/// 把规则嵌套的 JSON 数组转为 `ndim` 维数组
pub fn nested_array(value: &Value, ndim: usize, what: &str, path: &str) -> Result<ArrayD<f64>> {
    let err = |reason: String| MushroomError::ParseError {
        format: "json".to_string(),
        path: path.to_string(),
        reason: format!("{}: {}", what, reason),
    };
    let mut shape = vec![None; ndim];
    let mut flat = Vec::new();
    walk(value, 0, &mut shape, &mut flat).map_err(err)?;
    let shape: Vec<usize> = shape.into_iter().map(|s| s.unwrap_or(0)).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|e| err(e.to_string()))
}

// ─────────────────────────────────────────────────────────────
// 能带结构
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BandDocument {
    eigen: Value,
    #[serde(default)]
    occ: Option<Value>,
    #[serde(default)]
    weight: Option<Vec<f64>>,
    #[serde(default)]
    efermi: Option<f64>,
    #[serde(default)]
    unit: EnergyUnit,
    #[serde(default)]
    kpts: Option<Value>,
    #[serde(default)]
    pwav: Option<Value>,
    #[serde(default)]
    atms: Option<Vec<String>>,
    #[serde(default)]
    prjs: Option<Vec<String>>,
}

/// 解析得到的能带数据
#[derive(Debug, Clone)]
pub struct BandData {
    pub bs: BandStructure,
    /// k 点坐标 `[nkpts, 3]`
    pub kpts: Option<Array2<f64>>,
}

fn shape_error(path: &str, reason: impl Into<String>) -> MushroomError {
    MushroomError::ParseError {
        format: "json".to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// 解析能带结构文档，`path` 只用于错误信息
pub fn parse_band_json(content: &str, path: &str, options: EdgeOptions) -> Result<BandData> {
    let doc: BandDocument =
        serde_json::from_str(content).map_err(|e| shape_error(path, e.to_string()))?;

    let eigen = nested_array(&doc.eigen, 3, "eigen", path)?
        .into_dimensionality::<Ix3>()
        .map_err(|e| shape_error(path, e.to_string()))?;
    debug!("eigen shape from {}: {:?}", path, eigen.shape());

    let mut builder = BandStructure::builder(eigen)
        .unit(doc.unit)
        .edge_options(options);
    if let Some(occ) = doc.occ.as_ref() {
        let occ = nested_array(occ, 3, "occ", path)?
            .into_dimensionality::<Ix3>()
            .map_err(|e| shape_error(path, e.to_string()))?;
        builder = builder.occ(occ);
    }
    if let Some(w) = doc.weight {
        builder = builder.weight(Array1::from(w));
    }
    if let Some(ef) = doc.efermi {
        builder = builder.efermi(ef);
    }
    match doc.pwav.as_ref() {
        Some(pwav) => {
            let pwav = nested_array(pwav, 5, "pwav", path)?
                .into_dimensionality::<Ix5>()
                .map_err(|e| shape_error(path, e.to_string()))?;
            builder = builder.projection(pwav, doc.atms, doc.prjs);
        }
        None => {
            if doc.atms.is_some() || doc.prjs.is_some() {
                builder = builder.projection_labels(doc.atms, doc.prjs);
            }
        }
    }
    let bs = builder.build()?;

    let kpts = match doc.kpts.as_ref() {
        Some(k) => {
            let k = nested_array(k, 2, "kpts", path)?
                .into_dimensionality::<Ix2>()
                .map_err(|e| shape_error(path, e.to_string()))?;
            if k.nrows() != bs.nkpts() || k.ncols() != 3 {
                return Err(shape_error(
                    path,
                    format!(
                        "kpts shape {:?} inconsistent with nkpts = {}",
                        k.shape(),
                        bs.nkpts()
                    ),
                ));
            }
            Some(k)
        }
        None => None,
    };

    Ok(BandData { bs, kpts })
}

// ─────────────────────────────────────────────────────────────
// 晶胞
// ─────────────────────────────────────────────────────────────

fn default_diamond_a() -> f64 {
    3.5668
}

/// 原型结构参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "factory")]
pub enum CellFactory {
    #[serde(rename = "bravais_cP")]
    BravaisCp { atom: String, a: f64 },
    #[serde(rename = "bravais_cI")]
    BravaisCi {
        atom: String,
        a: f64,
        #[serde(default)]
        primitive: bool,
    },
    #[serde(rename = "bravais_cF")]
    BravaisCf {
        atom: String,
        a: f64,
        #[serde(default)]
        primitive: bool,
    },
    #[serde(rename = "zincblende")]
    Zincblende {
        atom1: String,
        atom2: String,
        a: f64,
        #[serde(default)]
        primitive: bool,
    },
    #[serde(rename = "diamond")]
    Diamond {
        #[serde(default = "default_diamond_atom")]
        atom: String,
        #[serde(default = "default_diamond_a")]
        a: f64,
        #[serde(default)]
        primitive: bool,
    },
    #[serde(rename = "rocksalt")]
    Rocksalt {
        atom1: String,
        atom2: String,
        a: f64,
        #[serde(default)]
        primitive: bool,
    },
}

fn default_diamond_atom() -> String {
    "C".to_string()
}

impl CellFactory {
    pub fn build(&self, options: CellOptions) -> Result<Cell> {
        match self {
            CellFactory::BravaisCp { atom, a } => Cell::bravais_cp(atom, *a, options),
            CellFactory::BravaisCi { atom, a, primitive } => {
                Cell::bravais_ci(atom, *a, *primitive, options)
            }
            CellFactory::BravaisCf { atom, a, primitive } => {
                Cell::bravais_cf(atom, *a, *primitive, options)
            }
            CellFactory::Zincblende {
                atom1,
                atom2,
                a,
                primitive,
            } => Cell::zincblende(atom1, atom2, *a, *primitive, options),
            CellFactory::Diamond { atom, a, primitive } => {
                Cell::diamond(atom, *a, *primitive, options)
            }
            CellFactory::Rocksalt {
                atom1,
                atom2,
                a,
                primitive,
            } => Cell::rocksalt(atom1, atom2, *a, *primitive, options),
        }
    }
}

/// 原型结构可附带的通用字段
#[derive(Debug, Default, Deserialize)]
struct FactoryExtras {
    #[serde(default)]
    unit: LengthUnit,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

/// 解析晶胞文档
pub fn parse_cell_json(content: &str, path: &str) -> Result<Cell> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| shape_error(path, e.to_string()))?;
    if value.get("factory").is_some() {
        let factory: CellFactory = serde_json::from_value(value.clone())
            .map_err(|e| shape_error(path, format!("bad factory: {}", e)))?;
        let extras: FactoryExtras =
            serde_json::from_value(value).map_err(|e| shape_error(path, e.to_string()))?;
        debug!("building cell from factory {:?}", factory);
        let options = CellOptions {
            unit: extras.unit,
            comment: extras.comment,
            reference: extras.reference,
            ..CellOptions::default()
        };
        return factory.build(options);
    }
    let record: CellRecord =
        serde_json::from_value(value).map_err(|e| shape_error(path, e.to_string()))?;
    Cell::from_record(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::selector::Selector;
    use crate::models::cell::CoordSys;

    const BAND_DOC: &str = r#"{
        "eigen": [[[-1.0, 0.0, 2.0, 3.0], [-0.8, 0.2, 2.1, 3.5]]],
        "occ": [[[1.0, 1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]]],
        "weight": [1, 3],
        "kpts": [[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
        "pwav": [[[[[0.5, 0.5]], [[0.2, 0.8]], [[1.0, 0.0]], [[0.0, 1.0]]],
                  [[[0.5, 0.5]], [[0.2, 0.8]], [[1.0, 0.0]], [[0.0, 1.0]]]]],
        "atms": ["Si"],
        "prjs": ["s", "p"]
    }"#;

    #[test]
    fn test_parse_band_document() {
        let data = parse_band_json(BAND_DOC, "test.json", EdgeOptions::default()).unwrap();
        let bs = &data.bs;
        assert_eq!((bs.nspins(), bs.nkpts(), bs.nbands()), (1, 2, 4));
        assert!((bs.fund_gap().unwrap() - 1.8).abs() < 1e-10);
        assert_eq!(data.kpts.unwrap().shape(), &[2, 3]);
        let p = bs
            .get_pwav(&Selector::from("Si"), &Selector::from("p"), &Selector::from("vbm"))
            .unwrap();
        assert!((p[[0, 0, 0]] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_rejected() {
        let doc = r#"{"eigen": [[[0.0, 1.0], [0.0]]]}"#;
        let err = parse_band_json(doc, "ragged.json", EdgeOptions::default()).unwrap_err();
        assert!(matches!(err, MushroomError::ParseError { .. }));
        assert!(err.to_string().contains("ragged"));
    }

    #[test]
    fn test_bad_kpts_shape() {
        let doc = r#"{"eigen": [[[0.0, 1.0]]], "kpts": [[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]}"#;
        assert!(parse_band_json(doc, "k.json", EdgeOptions::default()).is_err());
    }

    #[test]
    fn test_efermi_occupations() {
        let doc = r#"{"eigen": [[[0.0, 1.0, 2.0]]], "efermi": 1.5, "unit": "ry"}"#;
        let data = parse_band_json(doc, "ef.json", EdgeOptions::default()).unwrap();
        assert_eq!(data.bs.unit(), EnergyUnit::Ry);
        assert_eq!(data.bs.ivbm().unwrap(), (0, 0, 1));
    }

    #[test]
    fn test_mixed_case_units() {
        let doc = r#"{"eigen": [[[0.0, 1.0, 2.0]]], "efermi": 1.5, "unit": "eV"}"#;
        let data = parse_band_json(doc, "ev.json", EdgeOptions::default()).unwrap();
        assert_eq!(data.bs.unit(), EnergyUnit::Ev);
        let doc = r#"{"eigen": [[[0.0, 1.0, 2.0]]], "efermi": 1.5, "unit": "RY"}"#;
        let data = parse_band_json(doc, "ry.json", EdgeOptions::default()).unwrap();
        assert_eq!(data.bs.unit(), EnergyUnit::Ry);

        let doc = r#"{
            "latt": [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
            "atms": ["Si"],
            "posi": [[0.0, 0.0, 0.0]],
            "unit": "Bohr",
            "coord_sys": "Cartesian"
        }"#;
        let cell = parse_cell_json(doc, "bohr.json").unwrap();
        assert_eq!(cell.unit(), LengthUnit::Au);
        assert_eq!(cell.coord_sys(), CoordSys::Cartesian);

        let doc = r#"{"eigen": [[[0.0, 1.0]]], "unit": "kcal"}"#;
        assert!(parse_band_json(doc, "bad.json", EdgeOptions::default()).is_err());
    }

    #[test]
    fn test_parse_cell_record() {
        let doc = r#"{
            "latt": [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
            "atms": ["o", "Ti", "O"],
            "posi": [[0.5, 0.5, 0.0], [0.0, 0.0, 0.0], [0.5, 0.0, 0.5]],
            "select_dyn": {"1": [false, false, true]}
        }"#;
        let cell = parse_cell_json(doc, "cell.json").unwrap();
        assert_eq!(cell.atms(), &["O", "O", "Ti"]);
        assert_eq!(cell.sd_flag(2).unwrap(), [false, false, true]);
    }

    #[test]
    fn test_parse_cell_factory() {
        let doc = r#"{"factory": "zincblende", "atom1": "Ga", "atom2": "As", "a": 5.65, "primitive": true}"#;
        let cell = parse_cell_json(doc, "gaas.json").unwrap();
        assert_eq!(cell.natm(), 2);
        assert!(cell.comment().starts_with("Zincblende"));

        let doc = r#"{"factory": "diamond", "unit": "au"}"#;
        let cell = parse_cell_json(doc, "c.json").unwrap();
        assert_eq!(cell.unit(), LengthUnit::Au);
        assert!((cell.vol() - 3.5668_f64.powi(3) / 4.0).abs() < 1e-8);

        let doc = r#"{"factory": "hcp", "atom": "Mg"}"#;
        assert!(parse_cell_json(doc, "bad.json").is_err());
    }
}
