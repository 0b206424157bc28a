//! # 日志初始化
//!
//! 日志级别取自 `MUSHROOM_LOG` 环境变量，未设置时由 `-v` 次数决定：
//! 0 次为 warn，1 次 info，2 次 debug，更多为 trace。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `env_logger`

use env_logger::Env;

/// 日志级别环境变量
pub const LOG_ENV: &str = "MUSHROOM_LOG";

/// `-v` 次数对应的默认级别
pub fn level_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// 初始化全局日志器，重复调用无副作用
pub fn init_logger(verbose: u8) {
    let env = Env::new().filter_or(LOG_ENV, level_from_verbosity(verbose));
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(level_from_verbosity(0), "warn");
        assert_eq!(level_from_verbosity(2), "debug");
        assert_eq!(level_from_verbosity(9), "trace");
    }
}
