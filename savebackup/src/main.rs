use savebackup::config::{self, Settings};
use savebackup::run::BackupRuntime;
use savebackup::storage::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Logout,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--logout" => mode = CliMode::Logout,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    match parse_cli_mode(std::env::args())? {
        CliMode::Logout => {
            let store = TokenStore::new()?;
            store.delete()?;
            eprintln!("[savebackup] saved token removed");
            return Ok(());
        }
        CliMode::Help => {
            println!("Usage: savebackup [--logout]");
            println!("  --logout   Remove the saved Drive token and exit");
            return Ok(());
        }
        CliMode::Run => {}
    }

    let config_path = config::default_config_path()?;
    let mut settings = Settings::load_or_default(&config_path)?;
    settings.apply_env_overrides();
    // Written back once per run so a hand-edited or missing file heals.
    settings.save(&config_path)?;

    let runtime = BackupRuntime::bootstrap(settings).await?;
    let summary = runtime.run_backup().await?;
    eprintln!("[savebackup] backup complete: {summary}");
    Ok(())
}
