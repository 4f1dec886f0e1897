pub mod agent;
pub mod cli;
pub mod config;
pub mod console;
pub mod llm;
pub mod models;
pub mod state;

use agent::ChatAgent;
use cli::Args;
use config::prompt::ModeRegistry;
use config::settings::ProviderSettings;
use llm::chat::new_client;
use log::info;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = ProviderSettings::resolve(Some(Path::new(&args.secrets_path)))?;
    let default_model = args.model.clone().unwrap_or_else(|| settings.model.clone());
    let registry = Arc::new(ModeRegistry::load(&args.prompts_dir).with_default_model(default_model));

    info!("--- Core Configuration ---");
    info!("Prompts Dir: {}", args.prompts_dir);
    info!("Secrets Path: {}", args.secrets_path);
    for mode in registry.modes() {
        info!("Mode '{}': {} chars of system prompt", mode.name, mode.system_prompt.chars().count());
    }
    info!("Default Model: {}", registry.default_model);
    info!("Credentials Set: {}", settings.credentials.is_some());
    info!("Scope: {}", settings.scope.as_deref().unwrap_or("<not set>"));
    info!("Auth URL: {}", settings.auth_url);
    info!(
        "CA Bundle: {}",
        settings.ca_bundle_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<system roots>".to_string())
    );
    info!("-------------------------");

    let chat_client = new_client(settings);
    info!("Chat client configured: BaseURL={:?}", chat_client.get_base_url());
    let agent = ChatAgent::new(registry, chat_client);

    let mut session = agent.new_session();
    if let Some(mode) = &args.mode {
        session.select_mode(agent.registry(), mode);
    }

    console::run_console(&agent, session).await
}
