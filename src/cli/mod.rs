use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory with per-mode system prompt files (Assistent.txt, Coder.txt, Analyst.txt).
    #[arg(long, env = "PROMPTS_DIR", default_value = "Prompts")]
    pub prompts_dir: String,

    /// TOML secrets file with a [gigachat] table. Its values override GIGACHAT_* environment variables.
    #[arg(long, env = "SECRETS_PATH", default_value = "secrets.toml")]
    pub secrets_path: String,

    /// Model new sessions start with (GigaChat-2, GigaChat-2-Pro, GigaChat-2-Max).
    /// Defaults to the provider settings' model.
    #[arg(long)]
    pub model: Option<String>,

    /// Mode new sessions start with. Unknown names fall back to the first mode.
    #[arg(long, env = "DEFAULT_MODE")]
    pub mode: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
