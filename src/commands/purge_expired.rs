use tracing::info;

use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let count = app.pastes.purge_expired().await?;
    info!("removed {count} expired pastes");
    Ok(())
}
