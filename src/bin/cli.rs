use clap::{Parser, Subcommand};
use pricematch_engine::{
    percentage_difference, providers::marketplace::MarketplaceClient, quality_rating,
    similarity::scorer_by_name, ComparisonEngine, FetchConfig, MatchEngineError, TargetListing,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pricematch-cli")]
#[command(about = "Pricematch Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Search site base URL (defaults to $EBAY_BASE_URL, then eBay)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a listing against competitor results
    Compare {
        /// Listing title
        #[arg(short, long, required_unless_present = "url")]
        title: Option<String>,

        /// Listing price
        #[arg(short, long, required_unless_present = "url")]
        price: Option<f64>,

        /// Marketplace listing URL, instead of title and price
        #[arg(short, long, conflicts_with_all = ["title", "price", "days"])]
        url: Option<String>,

        /// Days the listing has been up
        #[arg(short, long, default_value = "0")]
        days: i64,

        /// Similarity scorer (gestalt, indel)
        #[arg(short, long, default_value = "gestalt")]
        scorer: String,
    },

    /// Rate a price against a reference price
    Rating {
        #[arg(long)]
        initial: f64,

        #[arg(long = "final")]
        final_price: f64,

        #[arg(short, long, default_value = "0")]
        days: i64,
    },

    /// Percentage difference between a listing price and a best price
    Diff {
        #[arg(long)]
        list: f64,

        #[arg(long)]
        best: f64,
    },

    /// Title similarity of two strings
    Similarity {
        a: String,
        b: String,

        #[arg(short, long, default_value = "gestalt")]
        scorer: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            title,
            price,
            url,
            days,
            scorer,
        } => {
            let scorer = scorer_by_name(&scorer)
                .ok_or_else(|| anyhow::anyhow!("unknown scorer '{}'", scorer))?;
            let mut config = FetchConfig::default();
            if let Some(base_url) = cli.base_url.or_else(|| std::env::var("EBAY_BASE_URL").ok()) {
                config.base_url = base_url;
            }
            let timeout = Duration::from_secs(config.timeout_secs);
            let engine = ComparisonEngine::with_ebay(config)?.with_scorer(Arc::from(scorer));

            let result = match (url, title, price) {
                (Some(url), _, _) => {
                    println!("🔍 Comparing listing: {}", url);
                    engine.compare_url(&MarketplaceClient::new(timeout)?, &url).await
                }
                (None, Some(title), Some(price)) => {
                    println!("🔍 Comparing: {} at {:.2}", title, price);
                    engine.compare(&TargetListing::new(title, price, days)).await
                }
                _ => anyhow::bail!("either --url or both --title and --price are required"),
            };

            let report = match result {
                Err(MatchEngineError::ListingMissing(title)) => {
                    println!("\n🚫 Listing no longer available: {}", title);
                    return Ok(());
                }
                other => other?,
            };

            println!("\n✅ Best match: {}", report.best.title);
            println!("   Score: {:.2}% ({:?})", report.best_score, report.match_quality);
            println!(
                "   Price: {:.2} + {:.2} shipping",
                report.best.price, report.best.shipping
            );
            println!(
                "   Difference: {}% {}",
                report.price_difference.amount,
                report.price_difference.kind.as_str()
            );
            println!("   Rating: {:.1}/5", report.price_rating);
            println!("   Candidates: {}", report.total_items);
            println!("   Latency: {:.2}ms", report.latency_ms);

            if !report.country_counts.is_empty() {
                println!("\n🌍 Countries:");
                for (country, count) in &report.country_counts {
                    let label = if country.is_empty() { "unknown" } else { country };
                    println!("   {}: {}", label, count);
                }
            }
        }

        Commands::Rating {
            initial,
            final_price,
            days,
        } => {
            let rating = quality_rating(initial, final_price, days)?;
            println!("⭐ Rating: {:.1}/5", rating);
        }

        Commands::Diff { list, best } => {
            let diff = percentage_difference(list, best)?;
            println!("📊 {}% {}", diff.amount, diff.kind.as_str());
        }

        Commands::Similarity { a, b, scorer } => {
            let scorer = scorer_by_name(&scorer)
                .ok_or_else(|| anyhow::anyhow!("unknown scorer '{}'", scorer))?;
            println!("🔗 {:.4} ({})", scorer.score(&a, &b), scorer.name());
        }
    }

    Ok(())
}
