use anyhow::{bail, Result};
use std::path::PathBuf;

use survey_editor_sync::utils::logging;
use survey_editor_sync::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(survey_id) = args.next() else {
        bail!("用法: survey_editor_sync <问卷ID> [配置文件.toml]");
    };
    let config_path = args.next().map(PathBuf::from);

    // 加载配置
    let config = Config::load(config_path.as_deref())?;

    // 初始化日志
    logging::init(&config);

    // 初始化并运行应用
    App::initialize(config)?.run(&survey_id).await?;

    Ok(())
}
