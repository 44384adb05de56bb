//! `pisp`: operator CLI for the PISP bridge.
//!
//! Loads a bridge configuration, then checks token grants, initiates payments,
//! polls payment status or lists ASPSPs. Results are printed to stdout as JSON,
//! logs go to stderr.
//!
//! ```text
//! pisp --config bridge.toml token --family eur
//! pisp initiate --amount 49.90 --currency EUR --end-to-end-id order-1042 \
//!     --remittance "Order 1042" --redirect-url https://shop.example/return
//! pisp -v status pay-42
//! pisp aspsps FR
//! ```

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from josekit and reqwest"
)]

mod observability;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pisp_bridge::{
    BridgeConfig, PispClient, auth::ApiFamily, partner::PaymentInitiation,
    security::redact_authorization,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::observability::{LogFormat, init_observability};

/// Operator CLI for the PISP bridge.
#[derive(Debug, Parser)]
#[command(name = "pisp", version, about)]
struct Cli {
    /// Bridge configuration file.
    #[arg(long, short, env = "PISP_CONFIG", default_value = "bridge.toml")]
    config: PathBuf,

    /// More log output on stderr (`-v` bridge debug, `-vv` trace). `RUST_LOG` wins.
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Performs a token grant and prints the token metadata.
    Token {
        /// API family to authorise against.
        #[arg(long, value_enum, default_value_t = Family::Pis)]
        family: Family,
    },
    /// Initiates a payment and prints the outcome.
    Initiate {
        /// Amount in major units, e.g. 49.90.
        #[arg(long)]
        amount: Decimal,
        /// ISO 4217 currency code.
        #[arg(long, default_value = "EUR")]
        currency: String,
        /// End-to-end identifier.
        #[arg(long)]
        end_to_end_id: String,
        /// Remittance text.
        #[arg(long)]
        remittance: String,
        /// PSU return URL.
        #[arg(long)]
        redirect_url: String,
        /// Preselected ASPSP id.
        #[arg(long)]
        aspsp: Option<String>,
    },
    /// Polls a payment's status and prints the outcome.
    Status {
        /// Partner payment id.
        payment_id: String,
    },
    /// Lists the ASPSPs available in a country.
    Aspsps {
        /// ISO 3166 alpha-2 country code.
        country: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Family {
    /// Payment initiation (`PIS`).
    Pis,
    /// End-user registration (`EUR`).
    Eur,
}

impl From<Family> for ApiFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Pis => Self::PaymentInitiation,
            Family::Eur => Self::UserRegistration,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_observability(LogFormat::from_env(), cli.verbose);

    let config = BridgeConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let client = PispClient::new(&config).context("building the partner client")?;

    let output = match cli.command {
        Command::Token { family } => {
            let family = ApiFamily::from(family);
            let token = client.token(family).await.context("token grant")?;
            json!({
                "family": family.to_string(),
                "authorization": redact_authorization(&token.authorization_value()),
                "token_type": token.token_type(),
                "expires_at": token.expires_at().to_rfc3339(),
            })
        }
        Command::Initiate {
            amount,
            currency,
            end_to_end_id,
            remittance,
            redirect_url,
            aspsp,
        } => {
            let payment = PaymentInitiation {
                amount,
                currency,
                end_to_end_id,
                remittance_information: remittance,
                redirect_url,
                aspsp_id: aspsp,
            };
            let outcome = client.initiate_payment(&payment).await.context("payment initiation")?;
            serde_json::to_value(outcome)?
        }
        Command::Status { payment_id } => {
            let outcome = client.payment_status(&payment_id).await.context("payment status")?;
            serde_json::to_value(outcome)?
        }
        Command::Aspsps { country } => {
            let aspsps = client.list_aspsps(&country).await.context("ASPSP directory")?;
            serde_json::to_value(aspsps)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_initiate() {
        let cli = Cli::try_parse_from([
            "pisp",
            "--config",
            "/etc/pisp/bridge.toml",
            "initiate",
            "--amount",
            "49.90",
            "--end-to-end-id",
            "order-1042",
            "--remittance",
            "Order 1042",
            "--redirect-url",
            "https://shop.example/return",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/pisp/bridge.toml"));
        let Command::Initiate { amount, currency, aspsp, .. } = cli.command else {
            panic!("expected initiate");
        };
        assert_eq!(amount, Decimal::new(4990, 2));
        assert_eq!(currency, "EUR");
        assert_eq!(aspsp, None);
    }

    #[test]
    fn test_parse_token_family() {
        let cli = Cli::try_parse_from(["pisp", "token", "--family", "eur"]).unwrap();
        let Command::Token { family } = cli.command else {
            panic!("expected token");
        };
        assert_eq!(ApiFamily::from(family), ApiFamily::UserRegistration);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_verbose_counts_anywhere() {
        let cli = Cli::try_parse_from(["pisp", "-v", "status", "pay-42", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_rejects_malformed_amount() {
        let result = Cli::try_parse_from([
            "pisp",
            "initiate",
            "--amount",
            "lots",
            "--end-to-end-id",
            "x",
            "--remittance",
            "x",
            "--redirect-url",
            "https://shop.example",
        ]);
        assert!(result.is_err());
    }
}
