use std::path::PathBuf;

use kiln_core::BuildState;
use tracing::info;

use crate::session::Session;

pub async fn run(path: PathBuf, clean: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    if clean {
        session.builder.clean_workspace().await?;
    }

    info!("Building workspace at {}", session.root.display());
    let state = session.build_all().await?;
    println!("{}", session.builder.build_log());

    let ledger = session.workspace.ledger();
    println!(
        "{} error(s), {} warning(s)",
        ledger.error_count(),
        ledger.warning_count()
    );
    match state {
        BuildState::Finished { success: true } => Ok(()),
        BuildState::Failed(reason) => Err(reason.into()),
        _ => Err("build failed".into()),
    }
}

pub async fn clean(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    session.builder.clean_workspace().await?;
    println!("{}", session.builder.build_log());
    Ok(())
}
