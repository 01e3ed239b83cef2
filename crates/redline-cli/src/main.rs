mod display;
mod paragraphs;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use redline_ai::{
    AnalysisMode, AnthropicEscalator, EmbeddingProvider, HashingEmbedder, LazyProvider,
    ProviderFactory, Review, Reviewer, hashing::DEFAULT_DIMENSIONS,
};
use redline_core::{Thresholds, load_rulebook_file};
use redline_notify::{ReviewNotice, SlackNotifier};
use redline_store::{NewReview, ReviewAction, ReviewStore};
use serde_json::json;
use tracing::{info, warn};

/// Review data processing agreements against a playbook and a rulebook.
#[derive(Parser)]
#[command(name = "redline", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Review history database (DuckDB file)
    #[arg(long, global = true, env = "REDLINE_DB", value_name = "FILE")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a contract and write its flags
    Review {
        /// Contract to review (plain text or Markdown)
        input: PathBuf,

        /// Playbook (reference) contract
        #[arg(long, value_name = "FILE")]
        playbook: PathBuf,

        /// Rulebook JSON export
        #[arg(long, value_name = "FILE")]
        rulebook: PathBuf,

        /// heuristic, llm, or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: AnalysisMode,

        /// Sentence-embedding model directory (model.onnx + tokenizer.json)
        #[arg(
            long,
            env = "REDLINE_MODEL_DIR",
            default_value = "models/all-MiniLM-L6-v2"
        )]
        model_dir: PathBuf,

        /// Where to write the flags JSON
        #[arg(long, short, default_value = "flags.json")]
        output: PathBuf,

        /// Reviewer name recorded with the saved review
        #[arg(long, default_value = "system")]
        reviewer: String,

        /// Post a Slack message when the saved review completes
        #[arg(long)]
        notify: bool,

        /// Threshold overrides (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "REDLINE_LLM_MODEL")]
        llm_model: Option<String>,

        #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
        slack_webhook: Option<String>,

        #[arg(
            long,
            env = "REDLINE_DASHBOARD_URL",
            default_value = "http://localhost:8501"
        )]
        dashboard_url: String,
    },

    /// List saved reviews, newest first
    Reviews,

    /// Show a saved review and its flag decisions
    Show {
        id: i64,
    },

    /// Record a reviewer decision on one or more flags
    Act {
        id: i64,
        /// Flag id, or several separated by commas
        flag_id: String,
        /// accept, reject, modify, or pending
        action: ReviewAction,
        #[arg(long, default_value = "")]
        note: String,
        #[arg(long, default_value = "reviewer")]
        reviewer: String,
    },

    /// Portfolio statistics across saved reviews
    Stats,

    /// Rule effectiveness from reviewer feedback
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Review {
            input,
            playbook,
            rulebook,
            mode,
            model_dir,
            output,
            reviewer,
            notify,
            config,
            api_key,
            llm_model,
            slack_webhook,
            dashboard_url,
        } => {
            let thresholds = match &config {
                Some(path) => Thresholds::from_json_file(path)
                    .with_context(|| format!("loading thresholds from {}", path.display()))?,
                None => Thresholds::default(),
            };

            let input_paras = paragraphs::read_paragraphs(&input)?;
            let reference_paras = paragraphs::read_paragraphs(&playbook)?;
            let rules = load_rulebook_file(&rulebook)
                .with_context(|| format!("loading rulebook {}", rulebook.display()))?;
            eprintln!(
                "  Read {} input paragraphs, {} playbook paragraphs, {} rules",
                input_paras.len(),
                reference_paras.len(),
                rules.len()
            );

            let mut reviewer_engine =
                Reviewer::new(embedding_provider(model_dir)).with_thresholds(thresholds);
            if mode != AnalysisMode::Heuristic {
                match api_key.filter(|k| !k.trim().is_empty()) {
                    Some(key) => {
                        let escalator = AnthropicEscalator::new(key, llm_model);
                        reviewer_engine = reviewer_engine.with_escalation(mode, Box::new(escalator));
                    }
                    None => warn!(%mode, "ANTHROPIC_API_KEY not set, running heuristic analysis"),
                }
            }

            let review = reviewer_engine
                .review(&input_paras, &reference_paras, &rules)
                .await
                .context("reviewing contract")?;

            let contract_name = file_name(&input);
            let metadata = json!({
                "contract_name": contract_name,
                "playbook": file_name(&playbook),
                "rulebook": file_name(&rulebook),
                "reviewer": reviewer,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "thresholds": thresholds,
                "stats": review.stats,
            });
            write_flags(&output, &metadata, &review)?;
            print!("{}", display::render_review(&contract_name, &review));
            eprintln!("  Wrote {} flags to {}", review.flags.len(), output.display());

            let Some(db) = &cli.db else {
                if notify {
                    warn!("--notify needs a saved review; pass --db or set REDLINE_DB");
                }
                return Ok(());
            };
            let mut store = open_store(db)?;
            let review_id = store.save_review(&NewReview {
                contract_name: &contract_name,
                reviewer: &reviewer,
                analysis_mode: review.stats.analysis_mode.as_str(),
                summary: &review.summary,
                metadata,
                flags: &review.flags,
            })?;
            println!("Saved review #{review_id} to {}", db.display());

            if notify {
                let notifier = SlackNotifier::new(slack_webhook);
                let notice = ReviewNotice {
                    contract_name: &contract_name,
                    review_id,
                    summary: &review.summary,
                    dashboard_url: &dashboard_url,
                };
                match notifier.notify_review(&notice).await {
                    Ok(true) => info!(review_id, "notification sent"),
                    Ok(false) => warn!("SLACK_WEBHOOK_URL not set, skipping notification"),
                    Err(e) => warn!(error = %e, "notification failed"),
                }
            }
        }

        Commands::Reviews => {
            let store = open_store(require_db(&cli.db)?)?;
            print!("{}", display::render_listing(&store.list_reviews()?));
        }

        Commands::Show { id } => {
            let store = open_store(require_db(&cli.db)?)?;
            let record = store.get_review(id)?;
            let l = &record.listing;
            println!("=== #{} {} ===", l.id, l.contract_name);
            println!("{} by {} ({}, {})", l.date, l.reviewer, l.analysis_mode, l.status);
            println!();
            println!("Flags");
            print!("{}", display::render_flag_actions(&store.get_review_flags(id)?));
        }

        Commands::Act {
            id,
            flag_id,
            action,
            note,
            reviewer,
        } => {
            let mut store = open_store(require_db(&cli.db)?)?;
            let ids: Vec<&str> = flag_id
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            match ids.as_slice() {
                [] => bail!("no flag id given"),
                [one] => {
                    if !store.update_flag_action(id, one, action, &note, &reviewer)? {
                        bail!("review #{id} has no flag {one}");
                    }
                    println!("{one}: {action}");
                }
                many => {
                    if !note.is_empty() {
                        warn!("--note is ignored when updating several flags");
                    }
                    let n = store.bulk_update_flags(id, many, action, &reviewer)?;
                    println!("Updated {n} of {} flags: {action}", many.len());
                }
            }
        }

        Commands::Stats => {
            let store = open_store(require_db(&cli.db)?)?;
            print!("{}", display::render_stats(&store.review_stats()?));
        }

        Commands::Rules => {
            let store = open_store(require_db(&cli.db)?)?;
            print!(
                "{}",
                display::render_rule_effectiveness(&store.rule_effectiveness()?)
            );
        }
    }

    Ok(())
}

/// The ONNX model when built with it, falling back to the hashing embedder.
fn embedding_provider(model_dir: PathBuf) -> LazyProvider {
    let fallback: ProviderFactory = Box::new(|| {
        Ok(Box::new(HashingEmbedder::new(DEFAULT_DIMENSIONS)) as Box<dyn EmbeddingProvider>)
    });
    match onnx_factory(model_dir) {
        Some(primary) => LazyProvider::new(primary).with_fallback(fallback),
        None => LazyProvider::new(fallback),
    }
}

#[cfg(feature = "onnx")]
fn onnx_factory(model_dir: PathBuf) -> Option<ProviderFactory> {
    Some(Box::new(move || {
        let model = redline_ai::OnnxEmbedder::load(&model_dir)?;
        Ok(Box::new(model) as Box<dyn EmbeddingProvider>)
    }))
}

#[cfg(not(feature = "onnx"))]
fn onnx_factory(model_dir: PathBuf) -> Option<ProviderFactory> {
    info!(model_dir = %model_dir.display(), "built without onnx, using hashing embedder");
    None
}

fn write_flags(path: &Path, metadata: &serde_json::Value, review: &Review) -> anyhow::Result<()> {
    let body = json!({
        "metadata": metadata,
        "summary": review.summary,
        "flags": review.flags,
    });
    std::fs::write(path, serde_json::to_string_pretty(&body)?)
        .with_context(|| format!("writing {}", path.display()))
}

fn open_store(path: &Path) -> anyhow::Result<ReviewStore> {
    ReviewStore::open_persistent(path)
        .with_context(|| format!("opening review database {}", path.display()))
}

fn require_db(db: &Option<PathBuf>) -> anyhow::Result<&Path> {
    db.as_deref()
        .context("no review database: pass --db or set REDLINE_DB")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
