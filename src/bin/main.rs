use company_research_agent::{config::AppConfig, models::TurnStatus};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run one chat turn from the command line and print what the UI would see.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let auto_approve = args.first().map(String::as_str) == Some("--approve");
    let rest = if auto_approve { &args[1..] } else { &args[..] };
    let message = if rest.is_empty() {
        "Show me information about Apple".to_string()
    } else {
        rest.join(" ")
    };

    let orchestrator = AppConfig::from_env()?.build_orchestrator()?;
    let thread_id = uuid::Uuid::new_v4().to_string();

    info!(thread_id = %thread_id, message = %message, "Running turn");

    let mut result = orchestrator.run_turn(&thread_id, &message).await?;
    while result.status == TurnStatus::AwaitingApproval {
        println!("{}", result.reply);
        if !auto_approve {
            println!("\n(re-run with --approve to approve pending calls)");
            return Ok(());
        }
        result = orchestrator.resolve_approval(&thread_id, true).await?;
    }

    println!("\n=== STATE UPDATES ===");
    for (i, update) in result.events.iter().enumerate() {
        println!("  {}: {} {}", i + 1, update.action_name(), update.action_args());
    }

    println!("\nReasoning Trace:");
    for (i, trace) in result.reasoning_trace.iter().enumerate() {
        println!("  {}: {}", i + 1, trace);
    }

    println!("\n=== REPLY ({:?}) ===\n{}", result.status, result.reply);

    Ok(())
}
