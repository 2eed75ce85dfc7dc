//! Replaces every campground with randomly generated ones.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "camp-seed", about = "Reset the campground list with random sample data")]
struct Args {
    /// Existing user who will author the generated campgrounds.
    username: String,

    /// How many campgrounds to create.
    #[arg(default_value_t = 50)]
    count: usize,

    /// SQLite database file.
    #[arg(long, env = "CAMP_DB_PATH", default_value = "camp.db")]
    db_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "camp_db=info,camp_seed=info".into()),
        )
        .init();

    let args = Args::parse();
    let db = camp_db::Database::open(&args.db_path)
        .with_context(|| format!("opening {}", args.db_path.display()))?;

    let Some(author) = db.get_user_by_username(&args.username)? else {
        bail!("No user named '{}'; register one first", args.username);
    };

    let created = db.seed_campgrounds(&author.id, args.count)?;
    info!("Seeded {} campgrounds authored by {}", created, author.username);

    db.close()
}
