use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "studyroom-cli", version, about = "Studyroom CLI")]
struct Cli {
    /// User id the command acts for
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a done/miss confirmation for a task
    Confirm(commands::confirm::ConfirmArgs),
    /// Study session tracking
    Study {
        #[command(subcommand)]
        action: commands::study::StudyAction,
    },
    /// Manual study reports
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Flashcard management
    Card {
        #[command(subcommand)]
        action: commands::card::CardAction,
    },
    /// Grade a card (0-5) and reschedule it
    Review(commands::card::ReviewArgs),
    /// Focus/break timer control
    Pomodoro {
        #[command(subcommand)]
        action: commands::pomodoro::PomodoroAction,
    },
    /// Day and week statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Points and streak ranking across users
    Leaderboard,
    /// Study plan progression
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Display profile management
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Confirm(args) => commands::confirm::run(args, &cli.user),
        Commands::Study { action } => commands::study::run(action, &cli.user),
        Commands::Report { action } => commands::report::run(action, &cli.user),
        Commands::Card { action } => commands::card::run(action, &cli.user),
        Commands::Review(args) => commands::card::run_review(args, &cli.user),
        Commands::Pomodoro { action } => commands::pomodoro::run(action, &cli.user),
        Commands::Stats { action } => commands::stats::run(action, &cli.user),
        Commands::Leaderboard => commands::leaderboard::run(),
        Commands::Plan { action } => commands::plan::run(action, &cli.user),
        Commands::Profile { action } => commands::profile::run(action, &cli.user),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
