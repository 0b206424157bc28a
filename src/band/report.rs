//! # 能带分析报告
//!
//! 汇总带隙、能带边所在 k 点与跃迁能量，并格式化为文本。仅支持非自旋极化数据。
//!
//! 跃迁字符串格式：
//! - `ivk:ick`：两个 k 点之间 VBM 能带到 CBM 能带的跃迁
//! - `ik:ivb:icb`：同一 k 点上两条能带之间的跃迁
//! - `ivk:ick:ivb:icb`：k 点可留空，留空时取该能带的极值点
//!
//! ## 依赖关系
//! - 被 `commands/band.rs` 使用
//! - 使用 `band/structure.rs` 的带隙与跃迁查询

use super::selector::BandIdentifier;
use super::structure::{BandStructure, Transition};
use crate::error::{MushroomError, Result};
use crate::models::unit::EnergyUnit;

use ndarray::Array2;
use std::fmt::Write as _;
use std::str::FromStr;

fn require_single_spin(bs: &BandStructure, what: &str) -> Result<()> {
    if bs.nspins() != 1 {
        return Err(MushroomError::NotImplemented(format!(
            "spin-polarized {}",
            what
        )));
    }
    Ok(())
}

fn kpt_string(kpts: Option<&Array2<f64>>, ik: usize) -> Option<String> {
    let kpts = kpts?;
    if ik >= kpts.nrows() || kpts.ncols() < 3 {
        return None;
    }
    Some(format!(
        "{:7.4},{:7.4},{:7.4}",
        kpts[[ik, 0]],
        kpts[[ik, 1]],
        kpts[[ik, 2]]
    ))
}

// ─────────────────────────────────────────────────────────────
// 带隙分析
// ─────────────────────────────────────────────────────────────

/// 单自旋能带结构的带隙分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct BandAnalysis {
    pub unit: EnergyUnit,
    pub ivb: usize,
    pub icb: usize,
    pub fund_gap: f64,
    pub is_direct: bool,
    pub ik_vb: usize,
    pub ik_cb: usize,
    pub direct_gap_vbm: f64,
    pub direct_gap_cbm: f64,
    pub min_direct_gap: f64,
    pub ik_min_direct: usize,
}

impl BandAnalysis {
    /// 以 `unit` 为单位分析，不修改原能带结构
    pub fn analyze(bs: &BandStructure, unit: EnergyUnit) -> Result<Self> {
        require_single_spin(bs, "band analysis")?;
        let mut bs = bs.clone();
        bs.set_unit(unit);

        let gaps = bs.direct_gaps()?;
        let row = gaps.row(0);
        let (ik_min_direct, min_direct_gap) = row
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |acc, (i, g)| if g < acc.1 { (i, g) } else { acc });
        let (_, ik_vb, ivb) = bs.ivbm()?;
        let (_, ik_cb, icb) = bs.icbm()?;

        Ok(Self {
            unit,
            ivb,
            icb,
            fund_gap: bs.fund_gap()?,
            is_direct: bs.is_gap_direct()?,
            ik_vb,
            ik_cb,
            direct_gap_vbm: row[ik_vb],
            direct_gap_cbm: row[ik_cb],
            min_direct_gap,
            ik_min_direct,
        })
    }

    /// 格式化为多行文本
    ///
    /// `value_only` 时只输出数值：直接带隙材料输出一个带隙，否则依次输出
    /// 基本带隙、VBM 处直接带隙、CBM 处直接带隙。
    pub fn render(&self, kpts: Option<&Array2<f64>>, value_only: bool) -> String {
        let unit = self.unit;
        let mut out = String::new();
        if value_only {
            if self.is_direct {
                let _ = write!(out, "{:8.4}", self.min_direct_gap);
                if let Some(k) = kpt_string(kpts, self.ik_min_direct) {
                    let _ = write!(out, " # ({})", k);
                }
            } else {
                let _ = write!(
                    out,
                    "{:8.4} {:8.4} {:8.4}",
                    self.fund_gap, self.direct_gap_vbm, self.direct_gap_cbm
                );
                if let (Some(kv), Some(kc)) =
                    (kpt_string(kpts, self.ik_vb), kpt_string(kpts, self.ik_cb))
                {
                    let _ = write!(out, " # ({}) ({})", kv, kc);
                }
            }
            return out;
        }

        let _ = writeln!(
            out,
            "> band edge between band index {:3} -> {:3}",
            self.ivb, self.icb
        );
        if self.is_direct {
            let _ = writeln!(out, "> fundamental gap = {:8.4} {}", self.min_direct_gap, unit);
            match kpt_string(kpts, self.ik_min_direct) {
                Some(k) => {
                    let _ = write!(out, ">>   ik={:<3} ({})", self.ik_min_direct, k);
                }
                None => {
                    let _ = write!(out, ">>   ik={:<3}", self.ik_min_direct);
                }
            }
        } else {
            let _ = writeln!(out, "> fundamental gap = {:8.4} {}", self.fund_gap, unit);
            match (kpt_string(kpts, self.ik_vb), kpt_string(kpts, self.ik_cb)) {
                (Some(kv), Some(kc)) => {
                    let _ = writeln!(
                        out,
                        ">> ikvb={:<3} ({}) -> ikcb={:<3} ({})",
                        self.ik_vb, kv, self.ik_cb, kc
                    );
                }
                _ => {
                    let _ = writeln!(out, ">> ikvb={:<3} -> ikcb={:<3}", self.ik_vb, self.ik_cb);
                }
            }
            let _ = writeln!(out, ">> VBM direct gap = {:8.4} {}", self.direct_gap_vbm, unit);
            let _ = writeln!(out, ">> CBM direct gap = {:8.4} {}", self.direct_gap_cbm, unit);
            let _ = write!(
                out,
                "> min. direct gap = {:8.4} {} at ik={:<3}",
                self.min_direct_gap, unit, self.ik_min_direct
            );
            if let Some(k) = kpt_string(kpts, self.ik_min_direct) {
                let _ = write!(out, " ({})", k);
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────
// 跃迁
// ─────────────────────────────────────────────────────────────

/// 从跃迁字符串解析出的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionSpec {
    pub ivk: Option<usize>,
    pub ick: Option<usize>,
    pub ivb: Option<BandIdentifier>,
    pub icb: Option<BandIdentifier>,
}

fn parse_kpt(token: &str, allow_empty: bool) -> Result<Option<usize>> {
    if allow_empty && token.is_empty() {
        return Ok(None);
    }
    token
        .parse::<usize>()
        .map(Some)
        .map_err(|_| MushroomError::invalid_identifier("kpoint", token))
}

impl FromStr for TransitionSpec {
    type Err = MushroomError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split(':').map(str::trim).collect();
        match tokens.as_slice() {
            [vk, ck] => Ok(Self {
                ivk: parse_kpt(vk, false)?,
                ick: parse_kpt(ck, false)?,
                ivb: None,
                icb: None,
            }),
            [k, vb, cb] => {
                let ik = parse_kpt(k, false)?;
                Ok(Self {
                    ivk: ik,
                    ick: ik,
                    ivb: Some(vb.parse()?),
                    icb: Some(cb.parse()?),
                })
            }
            [vk, ck, vb, cb] => Ok(Self {
                ivk: parse_kpt(vk, true)?,
                ick: parse_kpt(ck, true)?,
                ivb: Some(vb.parse()?),
                icb: Some(cb.parse()?),
            }),
            _ => Err(MushroomError::invalid_identifier("transition", s)),
        }
    }
}

/// 按请求计算跃迁能量，单位为 `unit`
pub fn transition_energies(
    bs: &BandStructure,
    specs: &[TransitionSpec],
    unit: EnergyUnit,
) -> Result<Vec<Transition>> {
    require_single_spin(bs, "transition analysis")?;
    let mut bs = bs.clone();
    bs.set_unit(unit);
    specs
        .iter()
        .map(|t| bs.get_transition(t.ivk, t.ick, t.ivb, t.icb, 0))
        .collect()
}

/// 格式化跃迁能量
pub fn render_transitions(
    transitions: &[Transition],
    kpts: Option<&Array2<f64>>,
    unit: EnergyUnit,
    value_only: bool,
) -> String {
    let mut lines = Vec::with_capacity(transitions.len() + 2);
    if !value_only {
        lines.push(format!("> Transition energies ({}):", unit));
        lines.push(format!(">> {:8} {:29}    {:29}", "E", "kpt_v", "kpt_c"));
    }
    for t in transitions {
        let ks = (kpt_string(kpts, t.ivk), kpt_string(kpts, t.ick));
        let line = match (value_only, ks) {
            (false, (Some(kv), Some(kc))) => format!(
                ">> {:8.4} {:<3} ({}) -> {:<3} ({})",
                t.energy, t.ivk, kv, t.ick, kc
            ),
            (false, _) => format!(">> {:8.4} {:<29} -> {:<29}", t.energy, t.ivk, t.ick),
            (true, (Some(kv), Some(kc))) => format!("{:8.4} # ({}) ({})", t.energy, kv, kc),
            (true, _) => format!("{:8.4}", t.energy),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn indirect() -> BandStructure {
        let eigen = array![[[-1.0, 0.0, 2.0], [-1.2, -0.3, 1.5], [-1.5, -0.6, 1.0]]];
        let occ = Array3::from_shape_fn((1, 3, 3), |(_, _, ib)| if ib < 2 { 1.0 } else { 0.0 });
        BandStructure::builder(eigen).occ(occ).build().unwrap()
    }

    #[test]
    fn test_parse_transition_spec() {
        let t: TransitionSpec = "0:2".parse().unwrap();
        assert_eq!((t.ivk, t.ick, t.ivb, t.icb), (Some(0), Some(2), None, None));

        let t: TransitionSpec = "1:vbm-1:cbm".parse().unwrap();
        assert_eq!(t.ivk, Some(1));
        assert_eq!(t.ick, Some(1));
        assert_eq!(t.ivb, Some(BandIdentifier::Vbm(-1)));
        assert_eq!(t.icb, Some(BandIdentifier::Cbm(0)));

        let t: TransitionSpec = "::1:2".parse().unwrap();
        assert_eq!(t.ivk, None);
        assert_eq!(t.ivb, Some(BandIdentifier::Index(1)));

        assert!("3".parse::<TransitionSpec>().is_err());
        assert!("a:b".parse::<TransitionSpec>().is_err());
        assert!("0:vbx:cbm".parse::<TransitionSpec>().is_err());
    }

    #[test]
    fn test_band_analysis() {
        let bs = indirect();
        let a = BandAnalysis::analyze(&bs, EnergyUnit::Ev).unwrap();
        assert!(!a.is_direct);
        assert_eq!((a.ivb, a.icb, a.ik_vb, a.ik_cb), (1, 2, 0, 2));
        assert!((a.fund_gap - 1.0).abs() < 1e-12);
        assert!((a.min_direct_gap - 1.6).abs() < 1e-12);
        assert_eq!(a.ik_min_direct, 2);

        let text = a.render(None, false);
        assert!(text.contains("fundamental gap =   1.0000 ev"));
        assert!(text.contains("ikvb=0"));
        assert_eq!(a.render(None, true), "  1.0000   2.0000   1.6000");

        let kpts = array![[0.0, 0.0, 0.0], [0.25, 0.0, 0.0], [0.5, 0.0, 0.0]];
        assert!(a.render(Some(&kpts), true).contains('#'));
    }

    #[test]
    fn test_transitions() {
        let bs = indirect();
        let specs: Vec<TransitionSpec> = ["0:2", "1:vbm:cbm"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let ts = transition_energies(&bs, &specs, EnergyUnit::Ev).unwrap();
        assert!((ts[0].energy - 1.0).abs() < 1e-12);
        assert!((ts[1].energy - 1.8).abs() < 1e-12);
        let text = render_transitions(&ts, None, EnergyUnit::Ev, true);
        assert_eq!(text, "  1.0000\n  1.8000");
    }

    #[test]
    fn test_spin_polarized_not_implemented() {
        let eigen = Array3::<f64>::zeros((2, 1, 2));
        let occ = Array3::from_shape_fn((2, 1, 2), |(_, _, ib)| if ib == 0 { 1.0 } else { 0.0 });
        let bs = BandStructure::builder(eigen).occ(occ).build().unwrap();
        assert!(matches!(
            BandAnalysis::analyze(&bs, EnergyUnit::Ev),
            Err(MushroomError::NotImplemented(_))
        ));
        assert!(transition_energies(&bs, &[], EnergyUnit::Ev).is_err());
    }
}
