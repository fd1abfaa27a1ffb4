pub mod api;
pub mod core;

use tracing_subscriber::EnvFilter;

/// 安装日志后端，库里的 `log` 记录转发到 fmt subscriber；`RUST_LOG` 覆盖默认的 `info`
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 已经装过 subscriber 时 try_init 会失败（测试、嵌入宿主）
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
