//! Code Verification Utility
//!
//! Runs product codes through the scan validation rules without a camera
//! or session. Handy for deciding whether a rejected read failed the
//! format gate or its check digit, and for preparing camera scripts.
//!
//! **Usage:**
//! ```bash
//! verify-code 4006381333931 73513537 [--json]
//! ```

use clap::Parser;

use scanfirm_engine::scan::{validate, Verdict};

/// Code verification utility
#[derive(Parser, Debug)]
#[clap(name = "verify-code")]
#[clap(about = "Check product codes against the scan validation rules")]
struct Args {
    /// Codes to check
    #[clap(required = true)]
    codes: Vec<String>,

    /// Emit one JSON object per code instead of text
    #[clap(long)]
    json: bool,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut rejected = 0;
    for code in &args.codes {
        let outcome = validate(code);
        if !outcome.is_valid() {
            rejected += 1;
        }

        if args.json {
            let line = match outcome.verdict {
                Verdict::Accepted(verification) => serde_json::json!({
                    "value": outcome.value,
                    "accepted": true,
                    "verification": verification,
                }),
                Verdict::Rejected(reason) => serde_json::json!({
                    "value": outcome.value,
                    "accepted": false,
                    "reason": reason,
                }),
            };
            println!("{}", line);
        } else {
            match outcome.verdict {
                Verdict::Accepted(verification) => {
                    println!("[✓] {} ({})", outcome.value, verification);
                }
                Verdict::Rejected(reason) => {
                    println!("[✗] {} ({})", outcome.value, reason);
                }
            }
        }
    }

    if rejected > 0 {
        std::process::exit(1);
    }
}
