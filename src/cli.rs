use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "smash-ladder tier ranking engine")]
pub struct Cli {
    /// Storage backend: json, sqlite or memory (overrides LADDER_BACKEND)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Data directory for json, database file for sqlite (overrides LADDER_DATA_PATH)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Character catalog JSON file (overrides LADDER_CHARACTERS)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Register a player on the lowest tier
    AddPlayer {
        name: String,
        /// External account reference
        account: String,
    },
    /// Remove a player by external account reference
    RemovePlayer { account: String },
    /// Record a match between two players
    AddGame {
        /// Player 1 (id, name or account)
        #[arg(long)]
        player1: String,
        /// Player 2 (id, name or account)
        #[arg(long)]
        player2: String,
        #[arg(long)]
        character1: String,
        #[arg(long)]
        character2: String,
        /// Ranked games may swap tiers and need adjacent tiers
        #[arg(long)]
        ranked: bool,
        /// Winner (id, name or account)
        #[arg(long)]
        winner: String,
        /// Stocks the winner had left
        #[arg(long, allow_negative_numbers = true)]
        stocks: i64,
        /// Percentage the winner ended on
        #[arg(long, allow_negative_numbers = true)]
        percentage: f64,
    },
    /// Remove a recorded game
    RemoveGame { id: u32 },
    /// Attach an external post reference to a recorded game
    AttachPost { id: u32, post_ref: String },
    /// Show players grouped by tier
    TierList,
    /// Show a player's stats
    Stats {
        /// Player (id, name or account)
        player: String,
        /// Restrict to one character
        #[arg(long, conflicts_with = "characters")]
        character: Option<String>,
        /// Show the player's best characters instead
        #[arg(long)]
        characters: bool,
        /// How many characters to list with --characters
        #[arg(long, requires = "characters")]
        limit: Option<usize>,
    },
    /// Set a player's tier manually
    SetTier {
        /// Player (id, name or account)
        player: String,
        /// One of S, A+, A-, B+, B-, C+, C-, D+, D-, F
        tier: String,
    },
    /// List the character catalog
    Characters,
    /// Print shell completions
    Completions { shell: Shell },
}
