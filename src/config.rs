//! # 分析配置
//!
//! 数值阈值与默认单位的集中配置，从 JSON 文件读取，缺省字段取默认值。
//! 配置文件路径来自全局 `--config` 参数或 `MUSHROOM_CONFIG` 环境变量，
//! 文件不存在时直接使用默认配置。命令行参数优先于配置文件。
//!
//! ## 依赖关系
//! - 被 `main.rs` 与 `commands/` 使用
//! - 使用 `serde_json` 读取

use crate::band::crossing::DEFAULT_DERIV_THRES;
use crate::band::edges::{EdgeMethod, EdgeOptions, THRES_DEGENERATE, THRES_OCC};
use crate::band::structure::DosOptions;
use crate::error::{MushroomError, Result};
use crate::models::unit::EnergyUnit;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 配置文件环境变量
pub const CONFIG_ENV: &str = "MUSHROOM_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 对称性搜索精度
    pub symprec: f64,
    /// 能带交叉判据
    pub deriv_thres: f64,
    /// 占据判据 ε：occ > 1 - ε 视为占据
    pub occ_threshold: f64,
    /// 简并判据 (eV)
    pub degenerate_threshold: f64,
    /// 态密度展宽 σ
    pub dos_sigma: f64,
    /// 态密度网格点数
    pub dos_nedos: usize,
    /// 输出能量单位
    pub energy_unit: EnergyUnit,
    /// 能带边定位方式
    pub edge_method: EdgeMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symprec: 1.0e-5,
            deriv_thres: DEFAULT_DERIV_THRES,
            occ_threshold: THRES_OCC,
            degenerate_threshold: THRES_DEGENERATE,
            dos_sigma: 0.05,
            dos_nedos: 3000,
            energy_unit: EnergyUnit::Ev,
            edge_method: EdgeMethod::Eigenvalue,
        }
    }
}

impl AnalysisConfig {
    /// 读取配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MushroomError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: AnalysisConfig =
            serde_json::from_str(&content).map_err(|e| MushroomError::ParseError {
                format: "config".to_string(),
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// 文件存在时读取，否则返回默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                debug!("config file {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("symprec", self.symprec),
            ("deriv_thres", self.deriv_thres),
            ("occ_threshold", self.occ_threshold),
            ("dos_sigma", self.dos_sigma),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(MushroomError::InvalidArgument(format!(
                    "config '{}' must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.degenerate_threshold < 0.0 {
            return Err(MushroomError::InvalidArgument(format!(
                "config 'degenerate_threshold' must be non-negative, got {}",
                self.degenerate_threshold
            )));
        }
        if self.dos_nedos < 2 {
            return Err(MushroomError::InvalidArgument(format!(
                "config 'dos_nedos' must be at least 2, got {}",
                self.dos_nedos
            )));
        }
        Ok(())
    }

    /// 能带边计算参数
    pub fn edge_options(&self) -> EdgeOptions {
        EdgeOptions {
            method: self.edge_method,
            occ_threshold: self.occ_threshold,
            degenerate_threshold: self.degenerate_threshold,
        }
    }

    /// 态密度参数，能量范围由调用方给定
    pub fn dos_options(&self) -> DosOptions {
        DosOptions {
            nedos: self.dos_nedos,
            sigma: self.dos_sigma,
            ..DosOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"deriv_thres": 3.0, "energy_unit": "ry"}"#).unwrap();
        assert_eq!(config.deriv_thres, 3.0);
        assert_eq!(config.energy_unit, EnergyUnit::Ry);
        assert_eq!(config.dos_nedos, 3000);
        assert_eq!(config.edge_method, EdgeMethod::Eigenvalue);
    }

    #[test]
    fn test_validate() {
        assert!(AnalysisConfig::default().validate().is_ok());
        let bad = AnalysisConfig {
            dos_sigma: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let path = Path::new("definitely/not/here/mushroom.json");
        assert_eq!(
            AnalysisConfig::load_or_default(Some(path)).unwrap(),
            AnalysisConfig::default()
        );
    }

    #[test]
    fn test_edge_options() {
        let config = AnalysisConfig {
            edge_method: EdgeMethod::Occupation,
            ..AnalysisConfig::default()
        };
        let opts = config.edge_options();
        assert_eq!(opts.method, EdgeMethod::Occupation);
        assert_eq!(opts.occ_threshold, THRES_OCC);
    }
}
