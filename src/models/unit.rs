//! # 单位换算
//!
//! 能量单位 (eV / Ry / Hartree) 与长度单位 (Å / Bohr) 的枚举与换算系数。
//! 所有换算都经由 eV 或 Å 复合，不需要成对维护系数表。
//!
//! ## 依赖关系
//! - 被 `band/`, `models/cell.rs`, `models/dos.rs` 使用
//! - 使用 `serde` 以小写字符串序列化

use crate::error::{MushroomError, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hartree -> eV
pub const HA2EV: f64 = 27.211386245988;
/// eV -> Hartree
pub const EV2HA: f64 = 1.0 / HA2EV;
/// Rydberg -> eV
pub const RY2EV: f64 = HA2EV / 2.0;
/// eV -> Rydberg
pub const EV2RY: f64 = 2.0 / HA2EV;
/// Bohr 半径 (Å)
pub const AU2ANG: f64 = 0.529177210903;
/// Å -> Bohr
pub const ANG2AU: f64 = 1.0 / AU2ANG;

// ─────────────────────────────────────────────────────────────
// 能量单位
// ─────────────────────────────────────────────────────────────

/// 能量单位，反序列化与 `FromStr` 一致，不区分大小写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum EnergyUnit {
    #[default]
    Ev,
    Ry,
    /// Hartree
    Au,
}

impl EnergyUnit {
    /// 1 个该单位等于多少 eV
    fn in_ev(self) -> f64 {
        match self {
            EnergyUnit::Ev => 1.0,
            EnergyUnit::Ry => RY2EV,
            EnergyUnit::Au => HA2EV,
        }
    }

    /// 从 `from` 换算到 `to` 的乘法系数
    pub fn factor(from: EnergyUnit, to: EnergyUnit) -> f64 {
        if from == to {
            return 1.0;
        }
        from.in_ev() / to.in_ev()
    }

    /// 把以 `self` 表示的数值换算到 `to`
    pub fn convert(self, value: f64, to: EnergyUnit) -> f64 {
        value * Self::factor(self, to)
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyUnit::Ev => write!(f, "ev"),
            EnergyUnit::Ry => write!(f, "ry"),
            EnergyUnit::Au => write!(f, "au"),
        }
    }
}

impl FromStr for EnergyUnit {
    type Err = MushroomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ev" => Ok(EnergyUnit::Ev),
            "ry" => Ok(EnergyUnit::Ry),
            "au" | "ha" | "hartree" => Ok(EnergyUnit::Au),
            _ => Err(MushroomError::Unit(format!("unknown energy unit '{}'", s))),
        }
    }
}

impl TryFrom<String> for EnergyUnit {
    type Error = MushroomError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

// ─────────────────────────────────────────────────────────────
// 长度单位
// ─────────────────────────────────────────────────────────────

/// 长度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LengthUnit {
    #[default]
    Ang,
    /// Bohr
    Au,
}

impl LengthUnit {
    fn in_ang(self) -> f64 {
        match self {
            LengthUnit::Ang => 1.0,
            LengthUnit::Au => AU2ANG,
        }
    }

    /// 从 `from` 换算到 `to` 的乘法系数
    pub fn factor(from: LengthUnit, to: LengthUnit) -> f64 {
        if from == to {
            return 1.0;
        }
        from.in_ang() / to.in_ang()
    }

    pub fn convert(self, value: f64, to: LengthUnit) -> f64 {
        value * Self::factor(self, to)
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthUnit::Ang => write!(f, "ang"),
            LengthUnit::Au => write!(f, "au"),
        }
    }
}

impl FromStr for LengthUnit {
    type Err = MushroomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ang" | "angstrom" => Ok(LengthUnit::Ang),
            "au" | "bohr" => Ok(LengthUnit::Au),
            _ => Err(MushroomError::Unit(format!("unknown length unit '{}'", s))),
        }
    }
}

impl TryFrom<String> for LengthUnit {
    type Error = MushroomError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_factor() {
        assert!((EnergyUnit::factor(EnergyUnit::Au, EnergyUnit::Ev) - HA2EV).abs() < 1e-10);
        assert!((EnergyUnit::factor(EnergyUnit::Ev, EnergyUnit::Ry) - EV2RY).abs() < 1e-12);
        assert!((EnergyUnit::factor(EnergyUnit::Ry, EnergyUnit::Au) - 0.5).abs() < 1e-12);
        assert!((EnergyUnit::factor(EnergyUnit::Au, EnergyUnit::Ry) - 2.0).abs() < 1e-12);
        assert!((EV2HA * HA2EV - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_energy_round_trip() {
        let v = -3.217;
        let ry = EnergyUnit::Ev.convert(v, EnergyUnit::Ry);
        let back = EnergyUnit::Ry.convert(ry, EnergyUnit::Ev);
        assert!((back - v).abs() < 1e-12);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("eV".parse::<EnergyUnit>().unwrap(), EnergyUnit::Ev);
        assert_eq!("RY".parse::<EnergyUnit>().unwrap(), EnergyUnit::Ry);
        assert_eq!("Bohr".parse::<LengthUnit>().unwrap(), LengthUnit::Au);
        assert_eq!("ANG".parse::<LengthUnit>().unwrap(), LengthUnit::Ang);
        assert!("kcal".parse::<EnergyUnit>().is_err());
        assert_eq!(EnergyUnit::Au.to_string(), "au");
    }

    #[test]
    fn test_serde_case_insensitive() {
        let e: EnergyUnit = serde_json::from_str(r#""eV""#).unwrap();
        assert_eq!(e, EnergyUnit::Ev);
        let e: EnergyUnit = serde_json::from_str(r#""Hartree""#).unwrap();
        assert_eq!(e, EnergyUnit::Au);
        let l: LengthUnit = serde_json::from_str(r#""Bohr""#).unwrap();
        assert_eq!(l, LengthUnit::Au);
        assert!(serde_json::from_str::<EnergyUnit>(r#""kcal""#).is_err());
        assert_eq!(serde_json::to_string(&EnergyUnit::Ry).unwrap(), r#""ry""#);
        assert_eq!(serde_json::to_string(&LengthUnit::Ang).unwrap(), r#""ang""#);
    }

    #[test]
    fn test_length_factor() {
        assert!((LengthUnit::factor(LengthUnit::Ang, LengthUnit::Au) - ANG2AU).abs() < 1e-12);
        assert!((LengthUnit::Au.convert(1.0, LengthUnit::Ang) - AU2ANG).abs() < 1e-12);
    }
}
