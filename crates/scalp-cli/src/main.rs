//! Command-line interface for scalp-trader
//!
//! ```bash
//! scalp analyze --image chart.png --provider anthropic --timeframe 5m --notes "NY open"
//! scalp review --image trade.png --outcome loss --notes "Entered early" --save-rule "Wait for the close"
//! scalp learn "Do not trade the first minute of the session"
//! scalp lessons
//! ```
//!
//! API keys come from `--api-key` or the provider's environment variable;
//! a `.env` file in the working directory (or `--env-file`) is loaded first.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use scalp_analyst::{
    AnalysisContext, AnalysisMode, AnalystConfig, ChartAnalyst, ChartImage, KnowledgeBase,
    Provider, ReviewRequest, RiskParams, Timeframe, TradeOutcome,
};
use scalp_utils::{
    env_opt, init_tracing_json, init_tracing_with, load_dotenv, load_dotenv_from, report_dotenv,
};
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "warn,scalp_analyst=info";

#[derive(Parser, Debug)]
#[command(name = "scalp")]
#[command(about = "AI chart analysis for scalp traders", long_about = None)]
#[command(version)]
struct Cli {
    /// Lessons file (default: knowledge.txt or SCALP_KNOWLEDGE_PATH)
    #[arg(long, global = true)]
    knowledge: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Env file to load instead of `.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a chart screenshot and print a trade plan
    Analyze(AnalyzeArgs),
    /// Review a closed trade and suggest a new rule
    Review(ReviewArgs),
    /// Append a lesson to the knowledge base
    Learn {
        /// Lesson text
        text: String,
    },
    /// Print the saved lessons, oldest first
    Lessons,
}

#[derive(Args, Debug)]
struct ProviderArgs {
    /// openai, anthropic or gemini
    #[arg(long)]
    provider: Option<Provider>,

    /// API key (default: the provider's environment variable)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Chart image (PNG, JPEG, ...)
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,

    /// smc or general
    #[arg(long)]
    mode: Option<AnalysisMode>,

    /// 1m, 5m, 15m, 1h, 4h or Daily
    #[arg(long, default_value = "1m")]
    timeframe: Timeframe,

    /// Your standing trading rules
    #[arg(long, default_value = "")]
    rules: String,

    /// Percent of the account risked per trade (0.1 to 5.0)
    #[arg(long, default_value_t = 1.0)]
    risk_pct: f64,

    /// Account size in account currency (at least 10)
    #[arg(long, default_value_t = 100)]
    account_size: u64,

    /// Anything else the model should know about this chart
    #[arg(long, default_value = "")]
    notes: String,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Chart showing the trade from entry to exit
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,

    /// win or loss
    #[arg(long)]
    outcome: TradeOutcome,

    /// What you think happened
    #[arg(long, default_value = "")]
    notes: String,

    /// Save this rule to the knowledge base once the review succeeds
    #[arg(long)]
    save_rule: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Before tracing so RUST_LOG may come from the env file
    let dotenv = match &cli.env_file {
        Some(path) => load_dotenv_from(path),
        None => load_dotenv(),
    };
    if cli.json_logs {
        init_tracing_json(DEFAULT_LOG_FILTER);
    } else {
        init_tracing_with(DEFAULT_LOG_FILTER);
    }
    report_dotenv(&dotenv);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("An error occurred: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AnalystConfig::default().with_env_overrides();
    if let Some(path) = cli.knowledge {
        config.knowledge_path = path;
    }

    match cli.command {
        Commands::Analyze(args) => {
            if let Some(mode) = args.mode {
                config.mode = mode;
            }
            let (provider, api_key) = resolve_provider(&args.provider, &config);
            let analyst = ChartAnalyst::new(config)?;

            let image = ChartImage::open(&args.image)
                .with_context(|| format!("cannot load {}", args.image.display()))?;
            let context = AnalysisContext::builder()
                .timeframe(args.timeframe)
                .risk(RiskParams::new(args.account_size, args.risk_pct)?)
                .rules(args.rules)
                .notes(args.notes);

            info!(%provider, mode = %analyst.config().mode, "Analyzing {}", args.image.display());
            let markdown = analyst
                .analyze_with_context(provider, &api_key, image, context)
                .await?;
            println!("{markdown}");
        }
        Commands::Review(args) => {
            let (provider, api_key) = resolve_provider(&args.provider, &config);
            let analyst = ChartAnalyst::new(config)?;

            let image = ChartImage::open(&args.image)
                .with_context(|| format!("cannot load {}", args.image.display()))?;
            let markdown = analyst
                .review_outcome(ReviewRequest::new(
                    provider,
                    api_key,
                    image,
                    args.outcome,
                    args.notes,
                ))
                .await?;
            println!("{markdown}");

            if let Some(rule) = args.save_rule {
                analyst.record_lesson(&rule)?;
                println!("\nRule saved to {}", analyst.knowledge().path().display());
            }
        }
        Commands::Learn { text } => {
            let analyst = ChartAnalyst::new(config)?;
            analyst.record_lesson(&text)?;
            println!("Lesson saved to {}", analyst.knowledge().path().display());
        }
        Commands::Lessons => {
            let knowledge = KnowledgeBase::new(config.knowledge_path);
            let lessons = knowledge.lessons()?;
            if lessons.is_empty() {
                println!("No lessons saved in {}", knowledge.path().display());
            }
            for lesson in lessons {
                println!("- {lesson}");
            }
        }
    }

    Ok(())
}

/// Pick the vendor and its key; a missing key is left blank for the
/// analyst to reject
fn resolve_provider(args: &ProviderArgs, config: &AnalystConfig) -> (Provider, String) {
    let provider = args.provider.unwrap_or(config.provider);
    let api_key = args
        .api_key
        .clone()
        .or_else(|| env_opt(provider.api_key_env()))
        .unwrap_or_default();

    if api_key.trim().is_empty() {
        warn!(
            "No {} API key: pass --api-key or set {} (get one at {})",
            provider,
            provider.api_key_env(),
            provider.key_url()
        );
    }
    (provider, api_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_args() {
        let cli = Cli::try_parse_from([
            "scalp",
            "analyze",
            "--image",
            "chart.png",
            "--provider",
            "claude",
            "--mode",
            "general",
            "--timeframe",
            "15m",
            "--risk-pct",
            "0.5",
            "--account-size",
            "2500",
            "--knowledge",
            "lessons.txt",
        ])
        .unwrap();

        assert_eq!(cli.knowledge, Some(PathBuf::from("lessons.txt")));
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.image, PathBuf::from("chart.png"));
        assert_eq!(args.provider.provider, Some(Provider::Anthropic));
        assert_eq!(args.mode, Some(AnalysisMode::GeneralTa));
        assert_eq!(args.timeframe, Timeframe::M15);
        assert!((args.risk_pct - 0.5).abs() < f64::EPSILON);
        assert_eq!(args.account_size, 2500);
        assert_eq!(args.rules, "");
    }

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::try_parse_from(["scalp", "analyze", "--image", "c.png"]).unwrap();
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.provider.provider, None);
        assert_eq!(args.mode, None);
        assert_eq!(args.timeframe, Timeframe::M1);
        assert!((args.risk_pct - 1.0).abs() < f64::EPSILON);
        assert_eq!(args.account_size, 100);
    }

    #[test]
    fn test_review_args() {
        let cli = Cli::try_parse_from([
            "scalp",
            "review",
            "--image",
            "trade.png",
            "--outcome",
            "LOSS",
            "--save-rule",
            "Wait for retest",
        ])
        .unwrap();
        let Commands::Review(args) = cli.command else {
            panic!("expected review");
        };
        assert_eq!(args.outcome, TradeOutcome::Loss);
        assert_eq!(args.save_rule.as_deref(), Some("Wait for retest"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["scalp", "analyze", "--image", "c.png", "--provider", "mistral"]).is_err());
        assert!(Cli::try_parse_from(["scalp", "analyze", "--image", "c.png", "--timeframe", "3m"]).is_err());
        assert!(Cli::try_parse_from(["scalp", "review", "--image", "c.png", "--outcome", "draw"]).is_err());
        assert!(Cli::try_parse_from(["scalp", "analyze"]).is_err());
    }

    #[test]
    fn test_learn_args() {
        let cli = Cli::try_parse_from(["scalp", "learn", "Wait for retest"]).unwrap();
        assert!(matches!(cli.command, Commands::Learn { ref text } if text == "Wait for retest"));
    }

    #[test]
    fn test_lessons_and_env_file_args() {
        let cli = Cli::try_parse_from(["scalp", "lessons", "--env-file", "prod.env"]).unwrap();
        assert!(matches!(cli.command, Commands::Lessons));
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
    }

    #[test]
    fn test_explicit_key_wins() {
        let args = ProviderArgs {
            provider: Some(Provider::Gemini),
            api_key: Some("from-flag".to_string()),
        };
        let (provider, key) = resolve_provider(&args, &AnalystConfig::default());
        assert_eq!(provider, Provider::Gemini);
        assert_eq!(key, "from-flag");
    }
}
