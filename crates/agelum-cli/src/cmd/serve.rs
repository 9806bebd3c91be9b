use agelum_core::settings::SettingsStore;
use std::path::Path;

/// Run the API server until interrupted. `root` becomes the project used by
/// requests that name no repository.
pub fn run(root: &Path, host: &str, port: u16, no_open: bool) -> anyhow::Result<()> {
    let settings = SettingsStore::from_env()?;
    let default_root = Some(root.to_path_buf());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        let actual = listener.local_addr()?.port();
        println!("Agelum API on http://{host}:{actual}");
        agelum_server::serve_on(settings, default_root, listener, !no_open).await
    })
}
