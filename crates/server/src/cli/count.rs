use crate::cli::{CountArgs, GlobalArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: CountArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;

    let count = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
        let ctx = super::open_context(&global, &args.model, &cfg)?;
        let count = ctx.count_tokens(&args.text);
        ctx.close();
        Ok(count?)
    })
    .await??;

    println!("{count}");
    Ok(())
}
